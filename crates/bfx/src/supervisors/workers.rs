//! 🧵 Workers: the ones who actually do the work while the Supervisor takes
//! all the credit in the sprint retro.
//!
//! 🚀 This module is like a factory floor, except instead of hard hats
//! we wear `#[derive(Debug)]` and instead of OSHA violations
//! we have borrow checker violations. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod dispatch_worker;
pub(crate) use dispatch_worker::{DispatchContext, DispatchWorker};

/// 🏗️ A background worker, that does work. duh.
///
/// `start` consumes the worker and hands back the task handle. The supervisor
/// keeps every handle and joins them all before reading the final numbers.
pub(crate) trait Worker {
    fn start(self) -> JoinHandle<Result<()>>;
}
