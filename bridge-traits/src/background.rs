//! UI-Affine Task Dispatch
//!
//! Background workers never touch UI state directly. They post closures to a
//! [`UiDispatcher`], and the host runs those closures, one at a time and in
//! posting order, on its single UI thread.

use crate::error::Result;

/// A unit of work to run on the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Dispatcher trait
///
/// Platform mapping:
/// - **Qt / GTK / winit**: post to the main event loop
/// - **Headless and tests**: a channel drained by whichever thread plays the
///   UI role
#[cfg_attr(test, mockall::automock)]
pub trait UiDispatcher: Send + Sync {
    /// Queue `task` for execution on the UI thread.
    ///
    /// Returns [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
    /// once the UI loop has shut down; the task is dropped unexecuted.
    fn dispatch(&self, task: UiTask) -> Result<()>;
}
