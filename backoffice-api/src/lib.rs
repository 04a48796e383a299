//! # Backoffice API Server Library
//!
//! Router, configuration and handlers for the back office API. The binary in
//! `main.rs` wires these to a database pool and a listener; tests build the
//! router directly.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
