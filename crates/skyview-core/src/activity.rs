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

//! Reference-counted busy indicator.

use log::{error, trace};

/// Counts overlapping in-flight operations. The indicator is visible while
/// at least one is outstanding.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusyCounter {
    count: u32,
}

impl BusyCounter {
    /// Register the start of an operation. Returns `true` if this made the
    /// indicator visible.
    pub fn start(&mut self) -> bool {
        self.count += 1;
        trace!("Busy count increased to {}", self.count);
        self.count == 1
    }

    /// Register the end of an operation. Returns `true` if this hid the
    /// indicator.
    pub fn stop(&mut self) -> bool {
        if self.count == 0 {
            error!("internal error: busy counter stopped at zero");
            return false;
        }
        self.count -= 1;
        trace!("Busy count decreased to {}", self.count);
        self.count == 0
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.count > 0
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}
