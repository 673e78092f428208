//! relaydeck server library.
//!
//! Exposes the building blocks (config, state, broker, routes, server
//! assembly) so integration tests and the binary entrypoint can both use
//! them.

pub mod browser;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;
