// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call throttler enforcing a minimum interval between executions.
//!
//! The leading call fires immediately. Calls arriving inside the minimum
//! interval are not dropped: the newest one replaces any pending deferred
//! call and fires exactly once when the interval elapses. Used to rate-limit
//! expensive refresh operations like full session-state rebroadcasts.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::warn;

/// Handle to a running throttle task.
///
/// Executions are delivered on the receiver returned by [`spawn`]; the
/// consumer performs the actual refresh work.
#[derive(Clone)]
pub struct Throttle<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Throttle<T> {
    /// Spawn the throttle task with the given minimum interval.
    pub fn spawn(min_interval: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, out_tx, min_interval));
        (Self { tx }, out_rx)
    }

    /// Request an execution with this value.
    ///
    /// Fires immediately when the interval has elapsed since the last
    /// execution; otherwise replaces the pending deferred value.
    pub fn call(&self, value: T) {
        if self.tx.send(value).is_err() {
            warn!("throttle task gone, dropping call");
        }
    }
}

async fn run<T: Send + 'static>(
    mut rx: mpsc::UnboundedReceiver<T>,
    out: mpsc::UnboundedSender<T>,
    min_interval: Duration,
) {
    let mut last_fired: Option<Instant> = None;
    let mut deferred: Option<T> = None;

    loop {
        let deadline = match (&deferred, last_fired) {
            (Some(_), Some(at)) => Some(at + min_interval),
            _ => None,
        };

        tokio::select! {
            value = rx.recv() => {
                match value {
                    Some(value) => {
                        let due = last_fired
                            .is_none_or(|at| at.elapsed() >= min_interval);
                        if due {
                            last_fired = Some(Instant::now());
                            let _ = out.send(value);
                        } else {
                            // Newest call replaces the pending one.
                            deferred = Some(value);
                        }
                    }
                    None => return,
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(value) = deferred.take() {
                    last_fired = Some(Instant::now());
                    let _ = out.send(value);
                }
            }
        }
    }
}
