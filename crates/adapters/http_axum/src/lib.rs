//! # hausbus-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** over the component registry and the scheduler
//!   (`/api/components`, `/api/schedules`, `/api/areas`, …)
//! - Map command requests onto [`Commandable::execute`] calls, run off the
//!   async runtime since they may touch the bus
//! - Stream domain events to clients as Server-Sent Events
//!
//! ## Dependency rule
//! Depends on `hausbus-app` (registry, scheduler, event bus) and
//! `hausbus-domain` (types used in request/response mapping). Never leaks
//! axum types into the domain.
//!
//! [`Commandable::execute`]: hausbus_app::component::Commandable::execute

pub mod api;
pub mod error;
pub mod router;
pub mod state;
