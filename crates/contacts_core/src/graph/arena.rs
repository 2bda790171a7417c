//! Slot arena with typed keys and the shared relink primitive.
//!
//! # Invariants
//! - Keys are slot indexes and are never reused after removal.
//! - `relink` is the only place that changes a parent/children pair.

use super::{GraphError, GraphResult};
use crate::model::contact::EntityKind;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use uuid::Uuid;

/// Typed index into one arena.
pub trait ArenaKey: Copy + Eq + Hash + Debug {
    const KIND: EntityKind;

    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

/// Record stored in an arena slot that may carry a store identifier.
pub trait Record {
    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);
}

#[derive(Debug, Clone)]
pub(crate) struct Node<T, P, C> {
    pub(crate) value: T,
    pub(crate) parent: Option<P>,
    pub(crate) children: Vec<C>,
}

/// Slot storage for one entity kind.
///
/// `P` is the parent key type and `C` the child key type. Kinds without a
/// parent or children use `Infallible` so the slot stays empty by type.
#[derive(Debug, Clone)]
pub(crate) struct Arena<K, T, P, C> {
    slots: Vec<Option<Node<T, P, C>>>,
    index: HashMap<Uuid, K>,
    live: usize,
}

impl<K, T, P, C> Default for Arena<K, T, P, C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            live: 0,
        }
    }
}

impl<K: ArenaKey, T: Record, P, C> Arena<K, T, P, C> {
    /// Inserts a detached record. Fails when its id is already present.
    pub(crate) fn insert(&mut self, value: T) -> GraphResult<K> {
        let id = value.id();
        if let Some(id) = id {
            if self.index.contains_key(&id) {
                return Err(GraphError::IdentifierConflict { kind: K::KIND, id });
            }
        }

        let key = K::from_index(self.slots.len());
        self.slots.push(Some(Node {
            value,
            parent: None,
            children: Vec::new(),
        }));
        self.live += 1;
        if let Some(id) = id {
            self.index.insert(id, key);
        }
        Ok(key)
    }

    pub(crate) fn get(&self, key: K) -> Option<&Node<T, P, C>> {
        self.slots.get(key.index()).and_then(Option::as_ref)
    }

    pub(crate) fn node(&self, key: K) -> GraphResult<&Node<T, P, C>> {
        self.get(key).ok_or_else(|| GraphError::stale(key))
    }

    pub(crate) fn node_mut(&mut self, key: K) -> GraphResult<&mut Node<T, P, C>> {
        self.slots
            .get_mut(key.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| GraphError::stale(key))
    }

    /// Stamps a store identifier onto a transient record.
    pub(crate) fn assign_id(&mut self, key: K, id: Uuid) -> GraphResult<()> {
        if self.index.contains_key(&id) {
            return Err(GraphError::IdentifierConflict { kind: K::KIND, id });
        }
        let node = self.node_mut(key)?;
        if let Some(existing) = node.value.id() {
            return Err(GraphError::IdentifierConflict {
                kind: K::KIND,
                id: existing,
            });
        }
        node.value.set_id(id);
        self.index.insert(id, key);
        Ok(())
    }

    /// Frees the slot. Callers must have unlinked the node first.
    pub(crate) fn remove(&mut self, key: K) -> GraphResult<Node<T, P, C>> {
        let node = self
            .slots
            .get_mut(key.index())
            .and_then(Option::take)
            .ok_or_else(|| GraphError::stale(key))?;
        if let Some(id) = node.value.id() {
            self.index.remove(&id);
        }
        self.live -= 1;
        Ok(node)
    }

    pub(crate) fn find(&self, id: Uuid) -> Option<K> {
        self.index.get(&id).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &Node<T, P, C>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|node| (K::from_index(index), node)))
    }
}

/// Moves `child` under `parent` (or under nothing), updating the previous
/// owner's collection, the new owner's collection and the back-reference.
///
/// Returns `Ok(false)` without touching anything when `child` already belongs
/// to `parent`. Both keys are checked before any mutation.
pub(crate) fn relink<PK, CK, PT, PP, CT, CC>(
    parents: &mut Arena<PK, PT, PP, CK>,
    children: &mut Arena<CK, CT, PK, CC>,
    child: CK,
    parent: Option<PK>,
) -> GraphResult<bool>
where
    PK: ArenaKey,
    CK: ArenaKey,
    PT: Record,
    CT: Record,
{
    let current = children.node(child)?.parent;
    if let Some(parent) = parent {
        parents.node(parent)?;
    }
    if current == parent {
        return Ok(false);
    }

    if let Some(previous) = current {
        let previous = parents.node_mut(previous)?;
        previous.children.retain(|candidate| *candidate != child);
    }
    if let Some(parent) = parent {
        parents.node_mut(parent)?.children.push(child);
    }
    children.node_mut(child)?.parent = parent;
    Ok(true)
}

/// Checks that every forward entry has a matching back-reference and the
/// reverse, and that no child is listed twice.
pub(crate) fn verify_pair<PK, CK, PT, PP, CT, CC>(
    parents: &Arena<PK, PT, PP, CK>,
    children: &Arena<CK, CT, PK, CC>,
) -> GraphResult<()>
where
    PK: ArenaKey,
    CK: ArenaKey,
    PT: Record,
    CT: Record,
{
    for (parent_key, parent) in parents.iter() {
        let mut seen = HashSet::new();
        for child_key in &parent.children {
            if !seen.insert(*child_key) {
                return Err(GraphError::Inconsistent(format!(
                    "{} {child_key:?} listed twice under {} {parent_key:?}",
                    CK::KIND,
                    PK::KIND
                )));
            }
            let back_reference = children.get(*child_key).map(|child| child.parent);
            if back_reference != Some(Some(parent_key)) {
                return Err(GraphError::Inconsistent(format!(
                    "{} {child_key:?} listed under {} {parent_key:?} but points elsewhere",
                    CK::KIND,
                    PK::KIND
                )));
            }
        }
    }

    for (child_key, child) in children.iter() {
        let Some(parent_key) = child.parent else {
            continue;
        };
        let listed = parents
            .get(parent_key)
            .is_some_and(|parent| parent.children.contains(&child_key));
        if !listed {
            return Err(GraphError::Inconsistent(format!(
                "{} {child_key:?} points to {} {parent_key:?} which does not list it",
                CK::KIND,
                PK::KIND
            )));
        }
    }
    Ok(())
}
