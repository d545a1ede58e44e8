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

//! # Cadence Control
//!
//! The CPU-aware execution governor and the concurrency limiter built on it.
//!
//! The governor owns a background sampling thread that publishes the host's
//! CPU usage; callers gate their work through its wait/throttle primitives.
//! The limiter combines the governor's live throttle signal with a static
//! core-derived budget to bound in-flight work.

#![warn(missing_docs)]

pub mod config;
pub mod governor;
pub mod limiter;
pub mod pacing;

pub use config::GovernorConfig;
pub use governor::ResourceGovernor;
pub use limiter::ConcurrencyLimiter;
