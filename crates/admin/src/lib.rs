//! Shopping Admin library.
//!
//! Catalog management against a document store and a blob store, plus
//! new-product push notifications.
//!
//! - [`use_cases::CatalogUseCases`] - create categories and products, upload
//!   their images, list categories. Every operation is a
//!   [`stream::ProgressStream`] of `Loading` then one terminal event.
//! - [`notifications::NotificationDispatcher`] - fan a notification out to
//!   every registered device token over FCM.
//! - [`state::AdminState`] - wires both against Firebase from
//!   [`config::AdminConfig`].
//!
//! # Security
//!
//! The service-account key grants write access to the whole catalog and can
//! message every registered device. Keep it out of version control.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod credentials;
pub mod gateway;
pub mod notifications;
pub mod state;
pub mod stream;
pub mod use_cases;
