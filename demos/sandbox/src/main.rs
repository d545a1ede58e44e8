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

//! Drives the governor against the real host: samples CPU usage for a few
//! ticks, runs a paced batch through the limiter, and prints stats.
//!
//! Set `CADENCE_MAX_CPU` to override the 80% ceiling, and `RUST_LOG=debug`
//! to watch the wait loop.

use cadence_control::{ConcurrencyLimiter, GovernorConfig, ResourceGovernor};
use cadence_infra::SysinfoProbe;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let max_usage_percent = std::env::var("CADENCE_MAX_CPU")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(80.0);

    let config = GovernorConfig {
        max_usage_percent,
        ..Default::default()
    };
    let probe = Arc::new(SysinfoProbe::new());
    let (mut governor, events) = ResourceGovernor::new(config, probe);
    governor.start();

    println!("initial stats: {}", serde_json::to_string(&governor.stats())?);

    for tick in 1..=5 {
        governor.wait_until_safe(None);
        println!(
            "tick {tick}: CPU at {:.1}%",
            governor.current_usage_percent()
        );
        thread::sleep(Duration::from_secs(2));
    }

    let governor = Arc::new(governor);
    let limiter = ConcurrencyLimiter::new(Arc::clone(&governor));
    log::info!(
        "running demo batch (budget: {} concurrent)",
        limiter.max_concurrent()
    );
    let tasks: Vec<_> = (1..=4)
        .map(|i| {
            move || {
                // Stand-in for a CPU-heavy pipeline step.
                let spun: u64 = (0..2_000_000).sum();
                Ok::<_, anyhow::Error>(format!("job {i} done ({spun})"))
            }
        })
        .collect();
    for line in limiter.run_batch(tasks, None)? {
        println!("{line}");
    }

    println!("final stats: {}", serde_json::to_string(&governor.stats())?);

    while let Ok(event) = events.try_recv() {
        println!("event: {event:?}");
    }

    Ok(())
}
