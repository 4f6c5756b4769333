//! Core types and trait definitions for the Huddle training coordinator.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; the time gates and authorization rules live
//! here as pure functions so they can be tested without any I/O.

pub mod audit;
pub mod clock;
pub mod error;
pub mod event;
pub mod guard;
pub mod notification;
pub mod registration;
pub mod store;
pub mod timegate;
pub mod user;

pub use error::{Error, ErrorKind, Result};
