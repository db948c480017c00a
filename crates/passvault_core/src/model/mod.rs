//! Vault domain model.
//!
//! # Responsibility
//! - Define the records, identities and permissions shared by every layer.
//! - Keep validation rules next to the types they protect.
//!
//! # Invariants
//! - Metadata types never carry secret values.
//! - A grant that allows `Reveal` always allows `List`.

pub mod grant;
pub mod password;
pub mod principal;
pub mod tag;
