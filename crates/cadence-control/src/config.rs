// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration for the resource governor.

use std::time::Duration;

/// Configuration for the [`ResourceGovernor`](crate::ResourceGovernor).
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// CPU usage ceiling as a percentage (0.0 to 100.0). Readings at or
    /// above this value engage throttling.
    pub max_usage_percent: f32,
    /// Cadence of the background sampling loop. The probe's own integration
    /// window counts toward each tick.
    pub sample_interval: Duration,
    /// Fixed pause appended after every throttled execution, so back-to-back
    /// CPU-heavy calls cannot spike usage between samples.
    pub guard_pause: Duration,
    /// Maximum number of governor events to buffer.
    /// If the buffer is full, new events are dropped.
    pub event_buffer: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_usage_percent: 80.0,
            sample_interval: Duration::from_secs(1),
            guard_pause: Duration::from_millis(100),
            event_buffer: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernorConfig::default();
        assert_eq!(config.max_usage_percent, 80.0);
        assert_eq!(config.sample_interval, Duration::from_secs(1));
        assert_eq!(config.guard_pause, Duration::from_millis(100));
        assert_eq!(config.event_buffer, 64);
    }
}
