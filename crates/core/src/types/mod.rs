//! Core types for the shopping admin client.
//!
//! This module provides the catalog records stored in the document store
//! and the progress events every backend operation reports through.

pub mod category;
pub mod product;
pub mod progress;
pub mod recipient;

pub use category::CategoryRecord;
pub use product::ProductRecord;
pub use progress::ProgressEvent;
pub use recipient::RecipientToken;
