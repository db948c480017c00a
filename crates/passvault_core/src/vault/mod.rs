//! Secret disclosure and its audit trail.
//!
//! # Responsibility
//! - Gate every secret read and metadata lookup on the access policy.
//! - Emit one disclosure event per successful reveal.
//!
//! # Invariants
//! - Missing and denied records produce the same `Withheld` outcome family;
//!   only logs see which one it was.
//! - A secret is never returned when its audit event could not be recorded.

pub mod audit;
pub mod secret_vault;
