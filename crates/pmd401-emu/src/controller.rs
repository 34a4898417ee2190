//! Channel store.
//!
//! The [`Controller`] owns a fixed set of [`Channel`]s, each an encoder and a
//! target position behind its own lock. Command handlers and the motor
//! simulator share the controller through an `Arc`; neither ever holds more
//! than one channel lock at a time, and no lock is held across an `.await`.

use std::cmp::Ordering;

use parking_lot::Mutex;

use crate::error::ControllerError;

/// Snapshot of one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    /// Current measured position
    pub encoder_position: i64,
    /// Commanded destination
    pub target_position: i64,
}

impl ChannelState {
    /// Move the encoder one count toward the target.
    ///
    /// Returns `true` if the encoder moved.
    fn step(&mut self) -> bool {
        let delta = match self.target_position.cmp(&self.encoder_position) {
            Ordering::Greater => 1,
            Ordering::Less => -1,
            Ordering::Equal => return false,
        };
        self.encoder_position += delta;
        true
    }
}

/// One simulated motor axis.
#[derive(Debug)]
pub struct Channel {
    index: u32,
    state: Mutex<ChannelState>,
}

impl Channel {
    fn new(index: u32) -> Self {
        Self {
            index,
            state: Mutex::new(ChannelState::default()),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn get_encoder(&self) -> i64 {
        self.state.lock().encoder_position
    }

    pub fn get_target(&self) -> i64 {
        self.state.lock().target_position
    }

    /// Swap in a new target and return the previous one.
    pub fn set_target(&self, target: i64) -> i64 {
        let mut state = self.state.lock();
        std::mem::replace(&mut state.target_position, target)
    }

    /// One simulator step for this channel.
    pub fn step_toward_target(&self) -> bool {
        self.state.lock().step()
    }

    pub fn snapshot(&self) -> ChannelState {
        *self.state.lock()
    }
}

/// Ordered, fixed-size collection of channels `0..N`.
#[derive(Debug)]
pub struct Controller {
    channels: Vec<Channel>,
}

impl Controller {
    /// Create a controller with `count` channels, all at encoder = target = 0.
    pub fn new(count: u32) -> Self {
        Self {
            channels: (0..count).map(Channel::new).collect(),
        }
    }

    pub fn channel_count(&self) -> u32 {
        // constructed from a u32 range
        self.channels.len() as u32
    }

    /// Look up a channel, rejecting indices outside `0..N`.
    pub fn channel(&self, index: u32) -> Result<&Channel, ControllerError> {
        self.channels
            .get(index as usize)
            .ok_or(ControllerError::ChannelOutOfRange {
                index,
                count: self.channel_count(),
            })
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn get_encoder(&self, index: u32) -> Result<i64, ControllerError> {
        Ok(self.channel(index)?.get_encoder())
    }

    pub fn get_target(&self, index: u32) -> Result<i64, ControllerError> {
        Ok(self.channel(index)?.get_target())
    }

    /// Set a new target, returning the previous one.
    pub fn set_target(&self, index: u32, target: i64) -> Result<i64, ControllerError> {
        Ok(self.channel(index)?.set_target(target))
    }
}
