//! Emulator composition: controller + motor simulator + TCP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pmd401_proto::{DEFAULT_HOST, DEFAULT_PORT, ENUMERATE_CHANNEL};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::controller::Controller;
use crate::error::{EmuError, EmuResult};
use crate::server::EmulatorServer;
use crate::simulator::{MotorSimulator, SimulatorHandle};

/// Configuration for the emulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Listen address (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port (default: 4001, 0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of simulated channels (default: 4)
    #[serde(default = "default_channels")]
    pub channels: u32,
    /// Motor simulator tick in milliseconds (default: 1000)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_channels() -> u32 {
    4
}

fn default_tick_ms() -> u64 {
    1000
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            channels: default_channels(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl EmulatorConfig {
    /// Reject values that parse but cannot run.
    pub fn validate(&self) -> EmuResult<()> {
        if self.channels == 0 {
            return Err(EmuError::Configuration(
                "emulator needs at least one channel".into(),
            ));
        }
        if self.channels > ENUMERATE_CHANNEL {
            return Err(EmuError::Configuration(format!(
                "at most {ENUMERATE_CHANNEL} channels, got {}; channel {ENUMERATE_CHANNEL} is the enumeration marker",
                self.channels
            )));
        }
        if self.tick_ms == 0 {
            return Err(EmuError::Configuration("tick_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// A running emulator.
pub struct Emulator {
    local_addr: SocketAddr,
    controller: Arc<Controller>,
    simulator: SimulatorHandle,
    server_shutdown: Option<oneshot::Sender<()>>,
    server_task: JoinHandle<EmuResult<()>>,
}

impl Emulator {
    /// Build the controller, start the simulator and bind the server.
    pub async fn start(config: &EmulatorConfig) -> EmuResult<Self> {
        config.validate()?;

        let controller = Arc::new(Controller::new(config.channels));
        let server =
            EmulatorServer::bind((config.host.as_str(), config.port), controller.clone()).await?;
        let local_addr = server.local_addr()?;

        let simulator =
            MotorSimulator::new(controller.clone(), config.tick_interval()).spawn();

        let (server_shutdown, shutdown_rx) = oneshot::channel();
        let server_task = tokio::spawn(server.serve_until(async {
            let _ = shutdown_rx.await;
        }));

        tracing::info!(
            %local_addr,
            channels = config.channels,
            tick_ms = config.tick_ms,
            "emulator started"
        );

        Ok(Self {
            local_addr,
            controller,
            simulator,
            server_shutdown: Some(server_shutdown),
            server_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// Stop accepting connections and stop the simulator.
    pub async fn shutdown(mut self) -> EmuResult<()> {
        if let Some(tx) = self.server_shutdown.take() {
            let _ = tx.send(());
        }
        let served = (&mut self.server_task).await;
        self.simulator.shutdown().await;
        tracing::info!(local_addr = %self.local_addr, "emulator stopped");
        served?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_controller() {
        let config = EmulatorConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4001);
        assert_eq!(config.channels, 4);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation() {
        let zero = EmulatorConfig {
            channels: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(EmuError::Configuration(_))));

        let collides = EmulatorConfig {
            channels: 128,
            ..Default::default()
        };
        assert!(collides.validate().is_err());

        let no_tick = EmulatorConfig {
            tick_ms: 0,
            ..Default::default()
        };
        assert!(no_tick.validate().is_err());
    }

    #[tokio::test]
    async fn start_and_shutdown() {
        let config = EmulatorConfig {
            port: 0,
            tick_ms: 10,
            ..Default::default()
        };
        let emulator = Emulator::start(&config).await.unwrap();
        assert_ne!(emulator.local_addr().port(), 0);
        assert_eq!(emulator.controller().channel_count(), 4);
        emulator.shutdown().await.unwrap();
    }
}
