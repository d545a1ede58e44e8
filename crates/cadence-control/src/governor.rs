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

//! The process-wide CPU governor service.

use crate::config::GovernorConfig;
use crate::pacing;
use cadence_core::platform::CpuProbe;
use cadence_core::telemetry::{GovernorEvent, GovernorStats};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// State shared between the sampling thread and callers.
///
/// The sampling thread is the sole writer of `usage_bits` and `throttle`;
/// callers read them without locks. Staleness up to one sample interval is
/// acceptable — this is an advisory admission signal, not a lock.
struct SharedState {
    /// Last-sampled usage percentage, stored as `f32` bits.
    usage_bits: AtomicU32,
    /// True while the last reading sat at or above the ceiling.
    throttle: AtomicBool,
    /// Lifecycle flag for the sampling loop.
    running: AtomicBool,
}

/// The CPU-aware execution governor.
///
/// Owns one background sampling thread that periodically measures system
/// CPU usage through a [`CpuProbe`] and publishes it for callers to gate on.
/// Construct with [`new`](Self::new), then call [`start`](Self::start)
/// before relying on fresh readings; an un-started governor reports zero
/// usage and no throttling.
pub struct ResourceGovernor {
    config: GovernorConfig,
    probe: Arc<dyn CpuProbe>,
    shared: Arc<SharedState>,
    event_tx: Sender<GovernorEvent>,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ResourceGovernor {
    /// Creates a new governor around the given probe.
    ///
    /// Returns the governor together with the receiving end of its event
    /// channel. Events are best-effort; if nobody drains the receiver the
    /// buffer fills up and further events are dropped.
    pub fn new(
        config: GovernorConfig,
        probe: Arc<dyn CpuProbe>,
    ) -> (Self, Receiver<GovernorEvent>) {
        let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_buffer);
        let governor = Self {
            config,
            probe,
            shared: Arc::new(SharedState {
                usage_bits: AtomicU32::new(0.0f32.to_bits()),
                throttle: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
            event_tx,
            stop_tx: None,
            handle: None,
        };
        (governor, event_rx)
    }

    /// Starts the background sampling thread. Idempotent.
    pub fn start(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let probe = Arc::clone(&self.probe);
        let config = self.config.clone();
        let events = self.event_tx.clone();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        self.stop_tx = Some(stop_tx);

        let handle = thread::spawn(move || {
            log::info!(
                "CPU monitoring started (ceiling: {:.1}%)",
                config.max_usage_percent
            );
            while shared.running.load(Ordering::Relaxed) {
                let tick_start = Instant::now();

                // The probe integrates over its own window, so this call
                // blocks for roughly one window.
                match probe.usage_percent() {
                    Ok(usage) => {
                        shared.usage_bits.store(usage.to_bits(), Ordering::Release);
                        let over = usage >= config.max_usage_percent;
                        let was_over = shared.throttle.swap(over, Ordering::AcqRel);
                        if over && !was_over {
                            log::warn!("CPU usage high: {usage:.1}% - throttling engaged");
                            let _ = events.try_send(GovernorEvent::ThrottleEngaged {
                                usage_percent: usage,
                            });
                        } else if !over && was_over {
                            log::info!("CPU usage normal: {usage:.1}% - throttling released");
                            let _ = events.try_send(GovernorEvent::ThrottleReleased {
                                usage_percent: usage,
                            });
                        }
                    }
                    Err(err) => {
                        // Fail open: keep the last-known reading so a
                        // transient probe hiccup cannot stall all work.
                        log::warn!("CPU probe failed: {err} - keeping last reading");
                        let _ = events.try_send(GovernorEvent::ProbeFailed {
                            detail: err.to_string(),
                        });
                    }
                }

                // Sleep out the rest of the tick, waking early on stop().
                let elapsed = tick_start.elapsed();
                if elapsed < config.sample_interval {
                    match stop_rx.recv_timeout(config.sample_interval - elapsed) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
            }
            log::info!("CPU monitoring stopped");
        });
        self.handle = Some(handle);
    }

    /// Stops the background sampling thread and waits for it to exit.
    ///
    /// The inter-sample sleep is interruptible, so the loop exits within one
    /// probe window. No-op if the governor was never started.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the sampling thread is currently running.
    pub fn is_monitoring(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Last-sampled system CPU usage (0.0 to 100.0). Zero until the first
    /// sample lands.
    pub fn current_usage_percent(&self) -> f32 {
        f32::from_bits(self.shared.usage_bits.load(Ordering::Acquire))
    }

    /// Whether the last reading sat at or above the configured ceiling.
    pub fn throttle_active(&self) -> bool {
        self.shared.throttle.load(Ordering::Acquire)
    }

    /// Blocks the calling thread while throttling is active.
    ///
    /// Each iteration sleeps a progressive backoff chosen from how far the
    /// last-known usage sits above the ceiling (see
    /// [`pacing::backoff_delay`]); the loop deliberately reads the published
    /// value rather than forcing a fresh probe measurement, so it reacts at
    /// the sampling cadence.
    ///
    /// Returns `true` once throttling has cleared, or `false` if `timeout`
    /// elapsed first. `None` waits indefinitely.
    pub fn wait_until_safe(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        while self.throttle_active() {
            let now = Instant::now();
            if let Some(deadline) = deadline {
                if now >= deadline {
                    return false;
                }
            }

            let usage = self.current_usage_percent();
            let excess = usage - self.config.max_usage_percent;
            let mut delay = pacing::backoff_delay(excess);
            if let Some(deadline) = deadline {
                // Never sleep past the deadline.
                delay = delay.min(deadline.saturating_duration_since(now));
            }

            log::debug!(
                "waiting for CPU to drop below {:.1}% (current: {usage:.1}%)",
                self.config.max_usage_percent
            );
            thread::sleep(delay);
        }
        true
    }

    /// Runs `work` once the host is below the ceiling, then pauses for the
    /// configured guard interval before returning the result.
    ///
    /// The guard pause keeps back-to-back heavy calls from spiking usage
    /// between samples. Panics and errors from `work` propagate untouched.
    pub fn run_throttled<T>(&self, work: impl FnOnce() -> T) -> T {
        self.wait_until_safe(None);
        let result = work();
        thread::sleep(self.config.guard_pause);
        result
    }

    /// Sleeps for `base` scaled by the current load (see
    /// [`pacing::adaptive_scale`]).
    pub fn adaptive_sleep(&self, base: Duration) {
        let scale = pacing::adaptive_scale(self.current_usage_percent());
        thread::sleep(base.mul_f32(scale));
    }

    /// Returns a snapshot of the governor state plus static host info.
    pub fn stats(&self) -> GovernorStats {
        GovernorStats {
            current_usage_percent: self.current_usage_percent(),
            max_usage_percent: self.config.max_usage_percent,
            throttle_active: self.throttle_active(),
            core_count: self.probe.core_count(),
            frequency_mhz: self.probe.frequency_mhz(),
        }
    }
}

impl Drop for ResourceGovernor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::platform::ProbeError;
    use std::sync::atomic::AtomicUsize;

    /// Probe that replays a fixed sequence of readings, repeating the last
    /// one forever. Readings return instantly.
    struct SequenceProbe {
        readings: Vec<f32>,
        next: AtomicUsize,
    }

    impl SequenceProbe {
        fn new(readings: Vec<f32>) -> Self {
            Self {
                readings,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl CpuProbe for SequenceProbe {
        fn usage_percent(&self) -> Result<f32, ProbeError> {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            Ok(self.readings[i.min(self.readings.len() - 1)])
        }

        fn core_count(&self) -> usize {
            4
        }

        fn frequency_mhz(&self) -> Option<u64> {
            Some(2400)
        }
    }

    /// Probe that succeeds once and then fails forever.
    struct FlakyProbe {
        first: f32,
        calls: AtomicUsize,
    }

    impl CpuProbe for FlakyProbe {
        fn usage_percent(&self) -> Result<f32, ProbeError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(self.first)
            } else {
                Err(ProbeError::Unavailable {
                    reason: "simulated outage".to_string(),
                })
            }
        }

        fn core_count(&self) -> usize {
            2
        }

        fn frequency_mhz(&self) -> Option<u64> {
            None
        }
    }

    fn fast_config() -> GovernorConfig {
        GovernorConfig {
            sample_interval: Duration::from_millis(20),
            guard_pause: Duration::from_millis(5),
            ..Default::default()
        }
    }

    /// Polls until `predicate` holds or the timeout elapses.
    fn wait_for(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn test_unstarted_governor_reports_defaults() {
        let probe = Arc::new(SequenceProbe::new(vec![95.0]));
        let (governor, _events) = ResourceGovernor::new(fast_config(), probe);

        assert_eq!(governor.current_usage_percent(), 0.0);
        assert!(!governor.throttle_active());
        assert!(!governor.is_monitoring());
        // With no throttle there is nothing to wait for.
        assert!(governor.wait_until_safe(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_lifecycle_start_stop_idempotent() {
        let probe = Arc::new(SequenceProbe::new(vec![30.0]));
        let (mut governor, _events) = ResourceGovernor::new(fast_config(), probe);

        governor.start();
        governor.start(); // second call is a no-op
        assert!(governor.is_monitoring());

        assert!(wait_for(Duration::from_secs(1), || {
            governor.current_usage_percent() == 30.0
        }));

        governor.stop();
        assert!(!governor.is_monitoring());
        governor.stop(); // stopping twice is fine
    }

    #[test]
    fn test_throttle_engages_and_releases() {
        let probe = Arc::new(SequenceProbe::new(vec![90.0, 90.0, 50.0]));
        let (mut governor, events) = ResourceGovernor::new(fast_config(), probe);
        governor.start();

        assert!(wait_for(Duration::from_secs(1), || governor.throttle_active()));
        assert!(wait_for(Duration::from_secs(1), || !governor.throttle_active()));
        governor.stop();

        let engaged = events.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(
            engaged,
            GovernorEvent::ThrottleEngaged { usage_percent } if usage_percent == 90.0
        ));
        let released = events.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(
            released,
            GovernorEvent::ThrottleReleased { usage_percent } if usage_percent == 50.0
        ));
    }

    #[test]
    fn test_probe_failure_retains_last_reading() {
        let probe = Arc::new(FlakyProbe {
            first: 85.0,
            calls: AtomicUsize::new(0),
        });
        let (mut governor, events) = ResourceGovernor::new(fast_config(), probe);
        governor.start();

        assert!(wait_for(Duration::from_secs(1), || {
            governor.current_usage_percent() == 85.0
        }));
        // Let a few failed samples go by; the reading and throttle hold.
        thread::sleep(Duration::from_millis(100));
        assert_eq!(governor.current_usage_percent(), 85.0);
        assert!(governor.throttle_active());
        governor.stop();

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, GovernorEvent::ProbeFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure, "expected at least one ProbeFailed event");
    }

    #[test]
    fn test_run_throttled_passes_result_through() {
        let probe = Arc::new(SequenceProbe::new(vec![10.0]));
        let (governor, _events) = ResourceGovernor::new(fast_config(), probe);

        let result = governor.run_throttled(|| 21 * 2);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_stats_snapshot() {
        let probe = Arc::new(SequenceProbe::new(vec![10.0]));
        let (governor, _events) = ResourceGovernor::new(fast_config(), probe);

        let stats = governor.stats();
        assert_eq!(stats.current_usage_percent, 0.0);
        assert_eq!(stats.max_usage_percent, 80.0);
        assert!(!stats.throttle_active);
        assert_eq!(stats.core_count, 4);
        assert_eq!(stats.frequency_mhz, Some(2400));
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let probe = Arc::new(SequenceProbe::new(vec![10.0]));
        let (governor, _events) = ResourceGovernor::new(fast_config(), probe);

        let json = serde_json::to_value(governor.stats()).unwrap();
        assert_eq!(json["max_usage_percent"], 80.0);
        assert_eq!(json["throttle_active"], false);
        assert_eq!(json["core_count"], 4);
    }
}
