//! UI-facing boundary crate for the password vault.

pub mod api;
