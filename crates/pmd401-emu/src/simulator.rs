//! Motor simulator.
//!
//! A periodic task that walks every channel's encoder one count per tick
//! toward its target. A channel `n` counts away from its target arrives in
//! exactly `n` ticks and never overshoots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::controller::Controller;

/// Default time between simulator ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct MotorSimulator {
    controller: Arc<Controller>,
    tick_interval: Duration,
}

impl MotorSimulator {
    pub fn new(controller: Arc<Controller>, tick_interval: Duration) -> Self {
        Self {
            controller,
            tick_interval,
        }
    }

    /// Advance every channel by one step. Returns how many channels moved.
    pub fn tick(&self) -> usize {
        let moved = self
            .controller
            .channels()
            .filter(|channel| channel.step_toward_target())
            .count();
        tracing::trace!(moved, "simulator tick");
        moved
    }

    /// Run the simulator on the current runtime until the handle is shut down.
    ///
    /// The first tick happens one interval after spawning.
    pub fn spawn(self) -> SimulatorHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let start = Instant::now() + self.tick_interval;
            let mut ticker = interval_at(start, self.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(
                channels = self.controller.channel_count(),
                interval_ms = self.tick_interval.as_millis() as u64,
                "motor simulator started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            tracing::debug!("motor simulator stopped");
        });

        SimulatorHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owner of a running simulator task.
///
/// Dropping the handle without calling [`SimulatorHandle::shutdown`] aborts the task.
pub struct SimulatorHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SimulatorHandle {
    /// Signal the task to stop and wait for it.
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(channels: u32) -> (Arc<Controller>, MotorSimulator) {
        let controller = Arc::new(Controller::new(channels));
        let simulator = MotorSimulator::new(controller.clone(), DEFAULT_TICK_INTERVAL);
        (controller, simulator)
    }

    #[test]
    fn idle_channels_do_not_move() {
        let (controller, simulator) = simulator(3);
        assert_eq!(simulator.tick(), 0);
        assert!(controller.channels().all(|c| c.get_encoder() == 0));
    }

    #[test]
    fn converges_in_exactly_distance_ticks() {
        let (controller, simulator) = simulator(2);
        controller.set_target(0, 5).unwrap();
        controller.set_target(1, -3).unwrap();

        let mut previous = [0_i64, 0];
        for tick in 1..=5_i64 {
            simulator.tick();
            let encoders = [
                controller.get_encoder(0).unwrap(),
                controller.get_encoder(1).unwrap(),
            ];
            assert_eq!(encoders[0], tick);
            assert_eq!(encoders[1], (-tick).max(-3));
            assert!((encoders[0] - previous[0]).abs() <= 1);
            assert!((encoders[1] - previous[1]).abs() <= 1);
            previous = encoders;
        }

        assert_eq!(simulator.tick(), 0);
        assert_eq!(controller.get_encoder(0), Ok(5));
        assert_eq!(controller.get_encoder(1), Ok(-3));
    }

    #[test]
    fn retargeting_mid_move_reverses() {
        let (controller, simulator) = simulator(1);
        controller.set_target(0, 10).unwrap();
        for _ in 0..4 {
            simulator.tick();
        }
        controller.set_target(0, 2).unwrap();
        for _ in 0..2 {
            simulator.tick();
        }
        assert_eq!(controller.get_encoder(0), Ok(2));
        assert_eq!(simulator.tick(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_simulator_ticks_on_interval() {
        let (controller, simulator) = simulator(1);
        controller.set_target(0, 10).unwrap();

        let handle = simulator.spawn();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(controller.get_encoder(0), Ok(3));

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.get_encoder(0), Ok(3));
    }
}
