//! `relaydeck-agent` library crate.
//!
//! The scripting-host side of the relay variant. Re-exports internal
//! modules for integration testing; the binary entrypoint lives in
//! `main.rs`.

pub mod config;
pub mod session;
