//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the contact persistence contract.
//! - Keep SQL details away from service orchestration.
//!
//! # Invariants
//! - Every backend routes writes through the same graph steps, so
//!   association rules and cascades behave identically across backends.
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to storage errors.

mod apply;
pub mod contact_repo;
pub mod memory_repo;
pub mod sqlite_repo;
