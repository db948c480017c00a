//! Access-scoped password search.
//!
//! # Responsibility
//! - Validate search input before storage is touched.
//! - Filter records by active flag, tag conjunction, free text and policy.
//!
//! # Invariants
//! - Results carry metadata only.
//! - Every emitted record passed the `List` policy check.

pub mod index;
pub mod query;
