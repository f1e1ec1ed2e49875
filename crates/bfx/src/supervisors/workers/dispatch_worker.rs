//! 🎬 *[a batch of ten objects arrives. a permit is stapled to it.]*
//! *[somewhere, an SQS queue braces itself.]*
//!
//! 📬 The DispatchWorker: one batch, one permit, one task.
//!
//! For every object: forge the record, serialize the envelope, send it.
//! A failure on one object is logged, counted and forgotten; its siblings
//! still get their turn. When the batch is done the permit drops, and the
//! gate lets the next batch in.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::Worker;
use crate::backends::{Queue, QueueBackend};
use crate::common::{Batch, ObjectDescriptor};
use crate::events::{EventEnvelope, EventTemplate};
use crate::progress::DispatchProgress;
use crate::supervisors::gate::GatePermit;
use crate::supervisors::stats::RunStatistics;

/// 🧰 Everything a worker borrows from the run: queue, template, counters, bar.
/// Cloned once per worker; every field is shared, none is copied.
#[derive(Debug, Clone)]
pub(crate) struct DispatchContext {
    pub(crate) queue: Arc<QueueBackend>,
    pub(crate) template: Arc<EventTemplate>,
    pub(crate) stats: Arc<RunStatistics>,
    pub(crate) progress: DispatchProgress,
}

/// 📬 Owns one batch and the gate permit that let it in.
#[derive(Debug)]
pub(crate) struct DispatchWorker {
    batch: Batch,
    permit: GatePermit,
    context: DispatchContext,
}

impl DispatchWorker {
    pub(crate) fn new(batch: Batch, permit: GatePermit, context: DispatchContext) -> Self {
        Self {
            batch,
            permit,
            context,
        }
    }
}

impl Worker for DispatchWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let DispatchWorker {
                batch,
                permit,
                context,
            } = self;
            trace!("📬 worker picked up a batch of {} objects", batch.len());

            for object in batch {
                match dispatch_one(&context, &object).await {
                    Ok(()) => context.stats.record_sent(),
                    Err(err) => {
                        warn!("⚠️ Failed to dispatch event for object {}: {:#}", object.key, err);
                        context.stats.record_failed();
                    }
                }
                context.progress.advance();
            }

            // -- 🎟️ batch fully processed, slot goes back to the gate
            drop(permit);
            Ok(())
        })
    }
}

/// 🔨 Forge, serialize, send. One object, one attempt.
async fn dispatch_one(context: &DispatchContext, object: &ObjectDescriptor) -> Result<()> {
    let the_record = context.template.build_record(object, Utc::now());
    let the_payload = EventEnvelope::single(the_record)
        .to_payload()
        .with_context(|| format!("💀 Failed to marshal the event for {}", object.key))?;
    context
        .queue
        .send(the_payload)
        .await
        .with_context(|| format!("💀 Failed to send the event for {}", object.key))
}
