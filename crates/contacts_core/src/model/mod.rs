//! Contact domain model.
//!
//! # Responsibility
//! - Define the three entity records (organization, unit, person).
//! - Define read models returned by persistence and drafts accepted by it.
//!
//! # Invariants
//! - A record without `id` is transient; the store assigns the identifier.
//! - Records never hold association references; the graph owns those.
//!
//! # See also
//! - `crate::graph` for association maintenance.

pub mod contact;
