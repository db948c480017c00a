//! Core use-case services.
//!
//! # Responsibility
//! - Compose tag store, index, policy and vault into request-level APIs.
//! - Map internal outcomes onto the boundary error taxonomy.

pub mod search_service;
