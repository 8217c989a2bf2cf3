//! # evopanel-core
//!
//! Core types, traits, configuration, and error handling for the panel.

pub mod config;
pub mod error;
pub mod instance;
pub mod message;
pub mod phone;
pub mod traits;

pub use config::shellexpand;
