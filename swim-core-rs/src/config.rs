//! Configuration for the membership registry

use serde::{Deserialize, Serialize};

/// Default capacity of both event channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Capacity of the public membership event channel
    pub event_capacity: usize,

    /// Capacity of the internal state change channel
    pub state_change_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
            state_change_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set capacity of the public event channel
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set capacity of the internal state change channel
    pub fn with_state_change_capacity(mut self, capacity: usize) -> Self {
        self.state_change_capacity = capacity;
        self
    }

    /// Set capacity of both channels
    pub fn with_capacity(self, capacity: usize) -> Self {
        self.with_event_capacity(capacity)
            .with_state_change_capacity(capacity)
    }
}
