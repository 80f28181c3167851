//! GSPI master bus abstraction.
//!
//! `traits` defines the driver surface the self-test consumes, `config`
//! holds the TOML-deserializable clock and control settings, and `sim`
//! provides a loop-back bus for hosts without the peripheral.

pub mod config;
pub mod sim;
pub mod traits;
