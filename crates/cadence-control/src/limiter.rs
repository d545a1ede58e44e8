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

//! Admission control bounded by core count and the governor's throttle signal.

use crate::governor::ResourceGovernor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Base pause applied after each task inside a batch, scaled by load.
const TASK_PAUSE: Duration = Duration::from_millis(200);
/// Base pause applied between batches, scaled by load.
const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Bounds how many logical units of work may be in flight at once.
///
/// Combines a static budget of half the core count with the governor's live
/// throttle signal. The counter is advisory: callers bracket their work with
/// [`begin`](Self::begin)/[`end`](Self::end), and unmatched `end` calls clamp
/// at zero rather than erroring.
pub struct ConcurrencyLimiter {
    governor: Arc<ResourceGovernor>,
    active: AtomicUsize,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter around the given governor.
    ///
    /// The concurrency budget is half the logical core count, with a floor
    /// of one, computed once here.
    pub fn new(governor: Arc<ResourceGovernor>) -> Self {
        let core_count = governor.stats().core_count;
        Self {
            governor,
            active: AtomicUsize::new(0),
            max_concurrent: (core_count / 2).max(1),
        }
    }

    /// The static concurrency budget.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of units of work currently registered as in flight.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Whether a new unit of work may be admitted right now.
    ///
    /// Pure predicate: true only while the active count sits below the
    /// budget and the governor is not throttling.
    pub fn can_start(&self) -> bool {
        self.active() < self.max_concurrent && !self.governor.throttle_active()
    }

    /// Registers the start of a unit of work, blocking first until the
    /// governor reports the host safe. Pair with [`end`](Self::end).
    pub fn begin(&self) {
        self.governor.wait_until_safe(None);
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    /// Registers the end of a unit of work. Clamped at zero, so an unmatched
    /// call cannot drive the count negative.
    pub fn end(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Runs `tasks` in paced batches, returning results in input order.
    ///
    /// Tasks are partitioned into chunks of `batch_size` (default: the
    /// concurrency budget). Before each chunk the limiter waits until the
    /// host is safe; within a chunk tasks run sequentially with a short
    /// adaptive pause after each, and a longer adaptive pause separates
    /// chunks. Batching here is a pacing mechanism, not parallelism — the
    /// goal is not overwhelming the CPU.
    ///
    /// The first task error is propagated immediately; results produced so
    /// far are discarded.
    pub fn run_batch<T, E, F>(&self, tasks: Vec<F>, batch_size: Option<usize>) -> Result<Vec<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let chunk_size = batch_size.unwrap_or(self.max_concurrent).max(1);
        let mut results = Vec::with_capacity(tasks.len());
        let mut tasks = tasks.into_iter().peekable();

        while tasks.peek().is_some() {
            self.governor.wait_until_safe(None);
            for task in tasks.by_ref().take(chunk_size) {
                results.push(task()?);
                self.governor.adaptive_sleep(TASK_PAUSE);
            }
            if tasks.peek().is_some() {
                self.governor.adaptive_sleep(BATCH_PAUSE);
            }
        }
        Ok(results)
    }
}
