//! Channel-Backed UI Dispatcher
//!
//! Desktop hosts without a toolkit event loop (CLIs, tests, headless runs)
//! pick one thread as the UI thread and drain a [`UiEventLoop`] on it. Worker
//! threads hold cloned [`ChannelDispatcher`]s and post closures.

use bridge_traits::{
    background::{UiDispatcher, UiTask},
    error::{BridgeError, Result},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Create a connected dispatcher / event loop pair.
pub fn ui_channel() -> (ChannelDispatcher, UiEventLoop) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelDispatcher { sender }, UiEventLoop { receiver })
}

/// Sending half, cloned into every worker.
#[derive(Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<UiTask>,
}

impl UiDispatcher for ChannelDispatcher {
    fn dispatch(&self, task: UiTask) -> Result<()> {
        self.sender
            .send(task)
            .map_err(|_| BridgeError::NotAvailable("UI event loop has shut down".to_string()))
    }
}

/// Receiving half, owned by the UI thread.
///
/// Tasks run in the order they were dispatched. Dropping the loop makes every
/// later `dispatch` fail with `NotAvailable`.
pub struct UiEventLoop {
    receiver: mpsc::UnboundedReceiver<UiTask>,
}

impl UiEventLoop {
    /// Run every task that is already queued without waiting.
    /// Returns the number of tasks run.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "Drained UI tasks");
        }
        ran
    }

    /// Wait for the next task and run it. Returns `false` once every
    /// dispatcher has been dropped and the queue is empty.
    pub async fn run_next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Like [`run_next`](Self::run_next) but gives up after `timeout`.
    pub async fn run_next_timeout(&mut self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, self.run_next()).await,
            Ok(true)
        )
    }

    /// Block the current thread, running tasks until every dispatcher is
    /// dropped. Must not be called from inside an async runtime.
    pub fn run_blocking(&mut self) {
        while let Some(task) = self.receiver.blocking_recv() {
            task();
        }
    }
}
