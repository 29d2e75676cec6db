//! Core infrastructure for pyexpose.
//!
//! This crate provides the language-neutral foundation:
//! - Introspection records and the linked declaration graph
//! - Canonical type identity and unwrap helpers
//! - Error types and error codes
//! - Build configuration and the warning channel

pub mod decl;
pub mod diagnostics;
pub mod error;
