//! The polling loop: probe every target each cycle, then redraw the
//! console report.

mod target;

pub use target::*;

use std::time::Duration;

use futures::future::join_all;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::PollMode;
use crate::console;
use crate::probe::Probe;

/// Drives polling cycles at a fixed cadence.
pub struct Monitor<P: Probe> {
    targets: Vec<Target<P>>,
    refresh: Duration,
    timeout: Duration,
    mode: PollMode,
}

impl<P: Probe> Monitor<P> {
    pub fn new(
        targets: Vec<Target<P>>,
        refresh: Duration,
        timeout: Duration,
        mode: PollMode,
    ) -> Self {
        Self {
            targets,
            refresh,
            timeout,
            mode,
        }
    }

    /// Run cycles forever.
    pub async fn run(mut self) {
        let mut ticker = interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.cycle().await;
        }
    }

    /// Probe every target once, then redraw the whole report in
    /// configuration order.
    async fn cycle(&mut self) {
        match self.mode {
            PollMode::Sequential => {
                for target in &mut self.targets {
                    target.poll(self.timeout).await;
                }
            }
            PollMode::Concurrent => {
                let timeout = self.timeout;
                join_all(self.targets.iter_mut().map(|t| t.poll(timeout))).await;
            }
        }

        console::clear();
        for target in &self.targets {
            console::write_report(&target.report());
        }
    }
}
