// Copyright 2025 Chris Custine
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

//! Renderer initialization state machine.
//!
//! The renderer signals "ready" asynchronously. If that does not happen
//! within the timeout the setup is restarted, up to a fixed number of
//! attempts, after which initialization has failed.

use std::time::{Duration, Instant};

use log::{error, info, warn};

/// Default time to wait for the renderer before restarting setup.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing { attempt: u32, started: Instant },
    Ready,
    Failed,
}

/// What the caller should do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitAction {
    /// Nothing to do.
    None,
    /// Restart renderer setup (attempt number given).
    Restart(u32),
    /// Run the one-time ready routine.
    RunReady,
    /// Give up and report the failure.
    GiveUp,
}

/// Drives [`InitState`] with a bounded retry policy.
#[derive(Debug, Clone)]
pub struct Initializer {
    state: InitState,
    timeout: Duration,
    max_attempts: u32,
}

impl Initializer {
    #[must_use]
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self {
            state: InitState::Uninitialized,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> InitState {
        self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == InitState::Ready
    }

    /// Start the first attempt.
    pub fn begin(&mut self, now: Instant) -> InitAction {
        match self.state {
            InitState::Uninitialized => {
                info!("Initializing renderer (attempt 1)");
                self.state = InitState::Initializing {
                    attempt: 1,
                    started: now,
                };
                InitAction::Restart(1)
            }
            other => {
                warn!("begin called in state {other:?}");
                InitAction::None
            }
        }
    }

    /// The renderer reported that it is ready. Only the first report while
    /// initializing triggers the ready routine.
    pub fn ready(&mut self) -> InitAction {
        match self.state {
            InitState::Initializing { attempt, .. } => {
                info!("Renderer ready after {attempt} attempt(s)");
                self.state = InitState::Ready;
                InitAction::RunReady
            }
            InitState::Ready => InitAction::None,
            other => {
                warn!("ready reported in state {other:?}");
                InitAction::None
            }
        }
    }

    /// Check for a timeout.
    pub fn tick(&mut self, now: Instant) -> InitAction {
        let InitState::Initializing { attempt, started } = self.state else {
            return InitAction::None;
        };

        if now.saturating_duration_since(started) < self.timeout {
            return InitAction::None;
        }

        if attempt >= self.max_attempts {
            error!("Renderer failed to initialize after {attempt} attempts");
            self.state = InitState::Failed;
            return InitAction::GiveUp;
        }

        let next = attempt + 1;
        warn!("There was a problem initializing the renderer, restarting (attempt {next})");
        self.state = InitState::Initializing {
            attempt: next,
            started: now,
        };
        InitAction::Restart(next)
    }
}

impl Default for Initializer {
    fn default() -> Self {
        Self::new(DEFAULT_INIT_TIMEOUT, 3)
    }
}
