//! PMD401 Controller Emulator
//!
//! Simulates a multi-channel PMD401 piezo motor controller behind its ASCII
//! TCP protocol, for exercising drivers without hardware.
//!
//! - [`controller`]: per-channel encoder/target store
//! - [`simulator`]: background task moving encoders toward targets
//! - [`dispatch`]: request → effect → reply
//! - [`server`]: TCP accept loop, one session task per connection
//! - [`emulator`]: the three wired together
//!
//! # Usage
//!
//! ```rust,no_run
//! use pmd401_emu::{Emulator, EmulatorConfig};
//!
//! # async fn run() -> Result<(), pmd401_emu::EmuError> {
//! let emulator = Emulator::start(&EmulatorConfig::default()).await?;
//! println!("listening on {}", emulator.local_addr());
//! emulator.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod dispatch;
pub mod emulator;
pub mod error;
pub mod server;
pub mod simulator;

pub use controller::{Channel, ChannelState, Controller};
pub use dispatch::{dispatch, handle_line};
pub use emulator::{Emulator, EmulatorConfig};
pub use error::{ControllerError, EmuError, EmuResult};
pub use server::EmulatorServer;
pub use simulator::{MotorSimulator, SimulatorHandle, DEFAULT_TICK_INTERVAL};
