//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where objects never got their PUT events..."
//! 🎬 "One supervisor dared to replay them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: part middle manager, part helicopter parent.
//!
//! The run is a little state machine:
//!
//! ```text
//! Listing ──(0 objects)──────────────────────────────► Done (NothingToDo)
//!    │ └──(Ctrl-C)───────────────────────────────────► Done (Cancelled)
//!    │
//!    ▼
//! Confirming ──(declined)────────────────────────────► Done (Cancelled)
//!    │
//!    ▼
//! Dispatching ──► Finalizing ──► Done (Completed | Aborted)
//! ```
//!
//! Dispatching drives the paginator on *this* task, pushes objects through the
//! batcher, takes a gate permit per full batch and spawns a worker for it. The
//! loop only ever waits on the next page or on the gate. Finalizing joins
//! every worker handle (the completion barrier) before anyone reads a counter.
//!
//! ⚠️ WORKERS ARE THE SUPERVISOR'S PRIVATE LITTLE MINIONS. DO NOT MAKE THEM PUB.

pub mod gate;
pub mod stats;
mod workers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app_config::AppConfig;
use crate::backends::{Lister, ListerBackend, Paginator, QueueBackend};
use crate::batcher::Batcher;
use crate::common::Batch;
use crate::events::EventTemplate;
use crate::progress::DispatchProgress;
use gate::AdmissionGate;
use stats::RunStatistics;
use workers::{DispatchContext, DispatchWorker, Worker};

/// 🙋 The "are you sure?" collaborator. Gets the object count, says yes or no.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, object_count: u64) -> Result<bool>;
}

/// ✅ Always yes. For `--yes`, scripts, and people who live dangerously.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _object_count: u64) -> Result<bool> {
        Ok(true)
    }
}

/// 🗺️ Where the run is right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Listing,
    Confirming,
    Dispatching,
    Finalizing,
    Done,
}

/// 🏁 How the run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// 💤 the prefix was empty, nothing was asked, nothing was sent
    NothingToDo,
    /// 🙅 the human said no
    Cancelled,
    /// ✅ every listed object went through a worker
    Completed,
    /// 💀 listing broke or dispatch was cancelled mid-way; in-flight work still finished
    Aborted(Error),
}

/// 📋 What gets handed to the reporting side when the run is `Done`.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// 🔍 what the counting pass saw
    pub objects_found: u64,
    pub sent: u64,
    pub failed: u64,
    /// 🧺 objects listed during dispatch but never admitted (cancellation)
    pub abandoned: u64,
    pub batches_dispatched: u64,
    /// 📈 objects a worker finished with, sent or failed (what the bar counted)
    pub processed: u64,
    pub elapsed: Duration,
}

impl RunReport {
    fn without_dispatch(outcome: RunOutcome, objects_found: u64) -> Self {
        Self {
            outcome,
            objects_found,
            sent: 0,
            failed: 0,
            abandoned: 0,
            batches_dispatched: 0,
            processed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// 🚀 sent messages per second of dispatch time
    pub fn objects_per_sec(&self) -> f64 {
        let the_secs = self.elapsed.as_secs_f64();
        if the_secs > 0.0 {
            self.sent as f64 / the_secs
        } else {
            0.0
        }
    }

    /// ✅ anything but `Aborted` is a clean exit
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Aborted(_))
    }
}

/// 🔢 Drain a fresh paginator and count what it yields.
///
/// Separate pass from the dispatch one. If the bucket changes in between,
/// the two numbers disagree. That's accepted, not hidden.
pub async fn count_objects<L: Lister>(lister: &L, bucket: &str, prefix: &str) -> Result<u64> {
    let mut the_pages = lister.paginate(bucket, prefix);
    let mut the_count = 0u64;
    while the_pages.has_more_pages() {
        let the_page = the_pages
            .next_page()
            .await
            .context("💀 Failed to get a page while counting objects")?;
        the_count += the_page.len() as u64;
    }
    Ok(the_count)
}

/// 📦 Bookkeeping for one dispatch pass, consumed by Finalizing.
#[derive(Debug, Default)]
struct DispatchPass {
    handles: Vec<JoinHandle<Result<()>>>,
    batches: u64,
    abandoned: u64,
    error: Option<Error>,
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
#[derive(Debug)]
pub struct Supervisor {
    app_config: AppConfig,
    lister: ListerBackend,
    queue: Arc<QueueBackend>,
    template: Arc<EventTemplate>,
    gate: AdmissionGate,
}

impl Supervisor {
    /// 🚀 Birth of a Supervisor. It's like a baby, but less crying.
    pub fn new(
        app_config: AppConfig,
        lister: ListerBackend,
        queue: QueueBackend,
        template: EventTemplate,
    ) -> Self {
        let gate = AdmissionGate::new(app_config.runtime.max_concurrency);
        Self {
            app_config,
            lister,
            queue: Arc::new(queue),
            template: Arc::new(template),
            gate,
        }
    }

    /// 🚦 the gate this supervisor admits batches through
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    fn target(&self) -> String {
        format!("s3://{}/{}", self.app_config.bucket, self.app_config.prefix)
    }

    /// 🎬 Run the whole thing: count, confirm, dispatch, join, report.
    ///
    /// 💀 `Err` only for fatal conditions before dispatch (counting failure,
    /// confirmation I/O failure). Trouble during dispatch ends up in
    /// `RunOutcome::Aborted`, after every admitted batch has finished.
    pub async fn run(
        &self,
        confirm: &dyn Confirm,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let mut phase = RunPhase::Listing;
        info!("🔍 Checking the number of objects in {}...", self.target());

        let the_bucket = &self.app_config.bucket;
        let the_prefix = &self.app_config.prefix;
        let the_count = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            counted = count_objects(&self.lister, the_bucket, the_prefix) => Some(counted),
        };
        let Some(counted) = the_count else {
            transition(&mut phase, RunPhase::Done);
            info!("🛑 Cancelled while counting objects. Nothing was sent.");
            return Ok(RunReport::without_dispatch(RunOutcome::Cancelled, 0));
        };
        let objects_found =
            counted.with_context(|| format!("💀 Failed to count objects in {}", self.target()))?;
        info!("📦 Found {} objects in {}", objects_found, self.target());

        if objects_found == 0 {
            transition(&mut phase, RunPhase::Done);
            info!("💤 No objects found under the prefix. Nothing to replay.");
            return Ok(RunReport::without_dispatch(RunOutcome::NothingToDo, 0));
        }

        transition(&mut phase, RunPhase::Confirming);
        // -- 🛑 a Ctrl-C during the prompt is a "no", whatever the prompt answered
        if !confirm.confirm(objects_found).await? || cancel.is_cancelled() {
            transition(&mut phase, RunPhase::Done);
            info!("🙅 Operation cancelled.");
            return Ok(RunReport::without_dispatch(RunOutcome::Cancelled, objects_found));
        }

        transition(&mut phase, RunPhase::Dispatching);
        let stats = Arc::new(RunStatistics::start());
        let progress =
            DispatchProgress::new(objects_found, self.app_config.runtime.show_progress);
        let context = DispatchContext {
            queue: Arc::clone(&self.queue),
            template: Arc::clone(&self.template),
            stats: Arc::clone(&stats),
            progress: progress.clone(),
        };
        let pass = self.dispatch(&context, cancel).await;

        transition(&mut phase, RunPhase::Finalizing);
        debug!("⏳ waiting on {} workers", pass.handles.len());
        for joined in futures::future::join_all(pass.handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("⚠️ a dispatch worker reported: {:#}", err),
                Err(join_err) => error!("💀 a dispatch worker panicked: {}", join_err),
            }
        }
        progress.finish();
        let elapsed = stats.elapsed();
        let the_numbers = stats.snapshot();

        transition(&mut phase, RunPhase::Done);
        let outcome = match pass.error {
            Some(err) => RunOutcome::Aborted(err),
            None => RunOutcome::Completed,
        };
        info!(
            "🏁 Operation finished: {} sent, {} failed, {} abandoned in {:?}",
            the_numbers.sent, the_numbers.failed, pass.abandoned, elapsed
        );

        Ok(RunReport {
            outcome,
            objects_found,
            sent: the_numbers.sent,
            failed: the_numbers.failed,
            abandoned: pass.abandoned,
            batches_dispatched: pass.batches,
            processed: progress.processed(),
            elapsed,
        })
    }

    /// 🔄 The producer loop: pages → batcher → gate → worker.
    async fn dispatch(
        &self,
        context: &DispatchContext,
        cancel: &CancellationToken,
    ) -> DispatchPass {
        let mut pass = DispatchPass::default();
        let mut pages = self
            .lister
            .paginate(&self.app_config.bucket, &self.app_config.prefix);
        let mut batcher = Batcher::new(self.app_config.runtime.batch_size);

        while pages.has_more_pages() {
            let page = match pages.next_page().await {
                Ok(page) => page,
                Err(err) => {
                    error!(
                        "💀 Listing failed mid-dispatch, no new pages will be read: {:#}",
                        err
                    );
                    pass.error = Some(err.context(format!(
                        "💀 Error occurred while listing objects in {}",
                        self.target()
                    )));
                    break;
                }
            };

            let mut objects = page.into_iter();
            while let Some(object) = objects.next() {
                let Some(batch) = batcher.push(object) else {
                    continue;
                };
                if let Err(err) = self.admit(batch, context, cancel, &mut pass).await {
                    // -- 🧺 everything listed but not admitted is abandoned, not lost
                    pass.abandoned += (objects.len() + batcher.pending()) as u64;
                    pass.error = Some(err);
                    return pass;
                }
            }
        }

        // -- 🧹 the leftovers were already listed, so they still get sent
        // -- (even after a listing error)
        if let Some(batch) = batcher.finish() {
            if let Err(err) = self.admit(batch, context, cancel, &mut pass).await {
                if pass.error.is_some() {
                    warn!("⚠️ could not admit the final partial batch: {:#}", err);
                } else {
                    pass.error = Some(err);
                }
            }
        }
        pass
    }

    /// 🎟️ Gate first, then spawn. A batch that can't get a permit is abandoned.
    async fn admit(
        &self,
        batch: Batch,
        context: &DispatchContext,
        cancel: &CancellationToken,
        pass: &mut DispatchPass,
    ) -> Result<()> {
        let permit = match self.gate.acquire(cancel).await {
            Ok(permit) => permit,
            Err(err) => {
                pass.abandoned += batch.len() as u64;
                return Err(err);
            }
        };
        pass.batches += 1;
        debug!(
            "📬 admitting batch #{} ({} objects, {} of {} slots busy)",
            pass.batches,
            batch.len(),
            self.gate.in_flight(),
            self.gate.capacity()
        );
        let the_worker = DispatchWorker::new(batch, permit, context.clone());
        pass.handles.push(the_worker.start());
        Ok(())
    }
}

fn transition(phase: &mut RunPhase, next: RunPhase) {
    debug!("🗺️ run phase {:?} → {:?}", phase, next);
    *phase = next;
}
