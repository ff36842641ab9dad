//! # hausbusd
//!
//! Composition root that wires the engine, the hardware and the HTTP adapter
//! together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize logging
//! - Drive the engine clock and run due schedules on a worker pool
//! - Attach the configured boards and wire the installation onto them
//! - Build the axum router, injecting the registry, scheduler and event bus
//! - Bind to a TCP port and serve, with graceful shutdown on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no engine logic belongs here.

pub mod config;
pub mod home;
