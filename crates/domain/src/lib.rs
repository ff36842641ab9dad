//! # hausbus-domain
//!
//! Pure domain model for the hausbus home automation controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Hardware vocabulary: I2C addresses, board kinds, binary levels and the
//!   fixed-width [`RegisterState`](register::RegisterState) bitset with its diff
//! - Component vocabulary: power/movement/button/motion states, state ids,
//!   status snapshots and the [`Command`](command::Command)s components accept
//! - Condition outcomes and relations, schedule snapshots, settings, events
//!   and areas
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod address;
pub mod area;
pub mod binary;
pub mod board;
pub mod command;
pub mod condition;
pub mod event;
pub mod register;
pub mod schedule;
pub mod settings;
pub mod state;
