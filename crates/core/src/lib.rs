//! Core domain model for the maitred booking assistant.
//!
//! This crate defines the typed contracts the rest of the system is built
//! on:
//!
//! - `domain` - users, booking records, chat history, customer details
//! - `operations` - validated request/response pairs for the five booking
//!   actions; the only way to construct a request is through its validating
//!   constructor, so invalid input never reaches the network
//! - `config` - application configuration (TOML file + env overrides)
//! - `errors` - the field-level validation error shared by every contract
//!
//! # Safety Principle
//!
//! The language model is strictly a translator. It never decides whether a
//! booking exists, who owns it, or whether a request is valid. Those are
//! deterministic decisions made here and in the layers built on this crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod operations;

pub use chrono;
