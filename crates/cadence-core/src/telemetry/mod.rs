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

//! Event and snapshot types for governor-wide telemetry.

use serde::Serialize;

/// An operational event published by the governor's sampling thread.
///
/// Events are best-effort: the governor never blocks on its event channel,
/// and events are dropped when the buffer is full or the receiver is gone.
#[derive(Debug, Clone)]
pub enum GovernorEvent {
    /// CPU usage crossed the configured ceiling; admission is now gated.
    ThrottleEngaged {
        /// The usage reading that triggered the transition.
        usage_percent: f32,
    },
    /// CPU usage dropped back below the ceiling; admission is open again.
    ThrottleReleased {
        /// The usage reading that cleared the throttle.
        usage_percent: f32,
    },
    /// The platform probe failed; the last-known reading was retained.
    ProbeFailed {
        /// Human-readable description of the failure.
        detail: String,
    },
}

/// A point-in-time snapshot of the governor's state plus static host info.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GovernorStats {
    /// Last-sampled system CPU usage (0.0 to 100.0).
    pub current_usage_percent: f32,
    /// Configured usage ceiling.
    pub max_usage_percent: f32,
    /// Whether admission is currently gated.
    pub throttle_active: bool,
    /// Number of logical CPU cores on the host.
    pub core_count: usize,
    /// Clock speed of the first core in MHz, if the platform reports one.
    pub frequency_mhz: Option<u64>,
}
