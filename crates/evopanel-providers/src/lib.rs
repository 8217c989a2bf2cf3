//! # evopanel-providers
//!
//! Messaging provider implementations for the panel.

pub mod evolution;

pub use evolution::EvolutionClient;
