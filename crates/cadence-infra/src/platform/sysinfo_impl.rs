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

//! sysinfo-based implementation of the CpuProbe trait.

use cadence_core::platform::{CpuProbe, ProbeError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use sysinfo::System;

/// A CPU probe that uses the `sysinfo` crate.
///
/// Usage readings integrate over a configurable window: the probe refreshes
/// CPU data, sleeps the window, refreshes again and reads the delta. The
/// window is clamped to `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`, below which
/// the crate reports garbage.
pub struct SysinfoProbe {
    system: Mutex<System>,
    window: Duration,
}

impl SysinfoProbe {
    /// Creates a probe with a one-second integration window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    /// Creates a probe with a custom integration window.
    pub fn with_window(window: Duration) -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        log::debug!("sysinfo probe ready: {} logical cores", system.cpus().len());
        Self {
            system: Mutex::new(system),
            window: window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }
}

impl CpuProbe for SysinfoProbe {
    fn usage_percent(&self) -> Result<f32, ProbeError> {
        {
            let mut system = self.system.lock().map_err(|_| ProbeError::Poisoned)?;
            system.refresh_cpu_usage();
        }
        // Lock released during the window so concurrent stats reads
        // (core count, frequency) are not held up by the measurement.
        thread::sleep(self.window);
        let mut system = self.system.lock().map_err(|_| ProbeError::Poisoned)?;
        system.refresh_cpu_usage();
        if system.cpus().is_empty() {
            return Err(ProbeError::Unavailable {
                reason: "platform reported no CPUs".to_string(),
            });
        }
        Ok(system.global_cpu_usage())
    }

    fn core_count(&self) -> usize {
        self.system.lock().map(|s| s.cpus().len()).unwrap_or(0)
    }

    fn frequency_mhz(&self) -> Option<u64> {
        let system = self.system.lock().ok()?;
        let frequency = system.cpus().first().map(|cpu| cpu.frequency())?;
        // Some platforms report 0 when the frequency is unknown.
        (frequency > 0).then_some(frequency)
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reports_cores() {
        let probe = SysinfoProbe::with_window(Duration::from_millis(0));
        assert!(probe.core_count() >= 1);
    }

    #[test]
    fn test_usage_in_percent_range() {
        let probe = SysinfoProbe::with_window(Duration::from_millis(0));
        let usage = probe.usage_percent().unwrap();
        assert!((0.0..=100.0).contains(&usage), "usage was {usage}");
    }
}
