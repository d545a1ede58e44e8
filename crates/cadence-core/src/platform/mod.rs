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

//! Provides abstractions over platform-specific functionalities.
//!
//! This module defines the contract between the governor's pacing logic and
//! the host operating system. Keeping the OS behind a trait means the
//! governor itself never touches platform APIs and can be driven by scripted
//! probes in tests.

use std::fmt;

/// Trait for observing the CPU state of the host platform.
///
/// A probe is a stateful object, typically living in the `cadence-infra`
/// crate, that knows how to query the operating system. The governor's
/// sampling thread holds one probe and calls [`usage_percent`](Self::usage_percent)
/// once per tick.
pub trait CpuProbe: Send + Sync {
    /// Measures system-wide CPU usage as a percentage (0.0 to 100.0).
    ///
    /// An accurate reading requires integrating over a time window, so this
    /// call is expected to block for roughly one integration window.
    fn usage_percent(&self) -> Result<f32, ProbeError>;

    /// Returns the number of logical CPU cores.
    fn core_count(&self) -> usize;

    /// Returns the current clock speed of the first core in MHz, if the
    /// platform reports one.
    fn frequency_mhz(&self) -> Option<u64>;
}

/// An error raised while querying the platform CPU facilities.
///
/// Probe errors are operational signals: the governor logs them and keeps
/// the last-known reading rather than propagating them to callers.
#[derive(Debug)]
pub enum ProbeError {
    /// The platform did not report usable CPU data.
    Unavailable {
        /// Human-readable description of what was missing.
        reason: String,
    },
    /// The probe's internal state was corrupted (e.g. a poisoned lock in a
    /// threaded probe).
    Poisoned,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Unavailable { reason } => {
                write!(f, "CPU data unavailable: {reason}")
            }
            ProbeError::Poisoned => {
                write!(f, "CPU probe state poisoned")
            }
        }
    }
}

impl std::error::Error for ProbeError {}
