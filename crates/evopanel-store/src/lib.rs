//! # evopanel-store
//!
//! SQLite-backed persistence for users, instances, groups, and contacts.

pub mod store;

pub use store::{Contact, ContactFilter, ContactInput, Group, Instance, Store, User};
