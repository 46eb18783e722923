use serde::{Deserialize, Serialize};

use super::{Task, TaskContext};
use crate::error::Result;
use crate::object::GameObject;

/// Idle for a fixed number of ticks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitTask {
    ticks: u32,
    elapsed: u32,
}

impl WaitTask {
    /// Wait `ticks` ticks; zero finishes on the first tick.
    #[must_use]
    pub const fn new(ticks: u32) -> Self {
        Self { ticks, elapsed: 0 }
    }

    /// Total ticks to wait.
    #[must_use]
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }
}

impl Task for WaitTask {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn on_tick(&mut self, _me: &mut GameObject, ctx: &mut TaskContext<'_>) -> Result<bool> {
        if ctx.is_cancelling() {
            return Ok(true);
        }
        self.elapsed += 1;
        Ok(self.elapsed >= self.ticks)
    }

    fn duplicate(&self) -> Self {
        Self::new(self.ticks)
    }
}
