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

//! Pacing policy functions.
//!
//! Pure mappings from observed load to delay, kept separate from the
//! governor so the policy steps stay directly testable.

use std::time::Duration;

/// Delay for one iteration of the wait-until-safe loop, chosen from how far
/// usage sits above the ceiling.
///
/// A badly overloaded host backs off harder and converges faster once load
/// drops, instead of busy-polling at a fixed rate.
///
/// | Excess over ceiling | Delay |
/// |---|---|
/// | > 20 % | 2.0 s |
/// | > 10 % | 1.0 s |
/// | otherwise | 0.5 s |
pub fn backoff_delay(excess_percent: f32) -> Duration {
    if excess_percent > 20.0 {
        Duration::from_secs(2)
    } else if excess_percent > 10.0 {
        Duration::from_secs(1)
    } else {
        Duration::from_millis(500)
    }
}

/// Multiplier applied to a caller-supplied base sleep, scaled with current
/// usage. Used by callers doing many small operations in a loop as a
/// self-throttling courtesy between iterations.
///
/// | Usage | Multiplier |
/// |---|---|
/// | > 90 % | 3.0 |
/// | > 80 % | 2.0 |
/// | > 70 % | 1.5 |
/// | otherwise | 1.0 |
pub fn adaptive_scale(usage_percent: f32) -> f32 {
    if usage_percent > 90.0 {
        3.0
    } else if usage_percent > 80.0 {
        2.0
    } else if usage_percent > 70.0 {
        1.5
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_steps() {
        assert_eq!(backoff_delay(25.0), Duration::from_secs(2));
        assert_eq!(backoff_delay(15.0), Duration::from_secs(1));
        assert_eq!(backoff_delay(5.0), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_boundaries() {
        // Thresholds are strict: exactly 20 and 10 fall into the next band down.
        assert_eq!(backoff_delay(20.0), Duration::from_secs(1));
        assert_eq!(backoff_delay(10.0), Duration::from_millis(500));
        assert_eq!(backoff_delay(0.0), Duration::from_millis(500));
        assert_eq!(backoff_delay(-5.0), Duration::from_millis(500));
    }

    #[test]
    fn test_adaptive_scale_bands() {
        assert_eq!(adaptive_scale(95.0), 3.0);
        assert_eq!(adaptive_scale(85.0), 2.0);
        assert_eq!(adaptive_scale(75.0), 1.5);
        assert_eq!(adaptive_scale(50.0), 1.0);
    }

    #[test]
    fn test_adaptive_scale_boundaries() {
        assert_eq!(adaptive_scale(90.0), 2.0);
        assert_eq!(adaptive_scale(80.0), 1.5);
        assert_eq!(adaptive_scale(70.0), 1.0);
    }
}
