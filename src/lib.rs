//! PMD401 protocol engine.
//!
//! Wires the workspace crates together behind one configuration:
//!
//! - [`pmd401_proto`]: wire codec
//! - [`pmd401_emu`]: multi-channel controller emulator
//! - [`pmd401_client`]: lazy-connecting client
//! - [`config`]: figment-layered settings for all of the above
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod logging;

pub use pmd401_client as client;
pub use pmd401_emu as emu;
pub use pmd401_proto as proto;

pub use config::{AppConfig, ConfigError};
