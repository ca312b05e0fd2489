//! Shopping Admin Core - Shared catalog types.
//!
//! This crate provides the types shared by every shopping admin component:
//! - `shopping-admin` - Backend gateway, credentials and notification fan-out
//! - `shopping-admin-cli` - Command-line tools for catalog management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no backend access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Catalog records, recipient tokens and progress events

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
