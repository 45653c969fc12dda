//! Gatehouse - permission resolution for the operations console
//!
//! This library resolves the signed-in operator's role privileges from the
//! backend, answers module/action access checks, and guards console routes.
//! It exposes all modules for testing purposes.

pub mod authz;
pub mod backend;
pub mod errors;
pub mod identity;
pub mod settings;
pub mod web;
