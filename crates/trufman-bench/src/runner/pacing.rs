use std::thread;
use std::time::{Duration, Instant};
use trufman_bot::CancelFlag;

use crate::config::PacingConfig;

const SLICE: Duration = Duration::from_millis(10);

/// Waits between table actions. Every wait returns early once `stop` is raised.
#[derive(Debug, Clone)]
pub struct Pacer {
    reveal: Duration,
    think: Duration,
    stop: CancelFlag,
}

impl Pacer {
    pub fn new(config: &PacingConfig, stop: CancelFlag) -> Self {
        Self {
            reveal: config.reveal_delay(),
            think: config.think_delay(),
            stop,
        }
    }

    /// Pause between the fourth card of a trick and its resolution.
    pub fn reveal(&self) -> bool {
        self.wait(self.reveal)
    }

    /// Pause before an agent's play is committed.
    pub fn think(&self) -> bool {
        self.wait(self.think)
    }

    /// Returns `false` when the wait was cut short.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.stop.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLICE.min(deadline - now));
        }
    }
}
