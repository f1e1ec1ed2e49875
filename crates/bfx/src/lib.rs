//! 🪣➡️📬 bfx: replay `ObjectCreated:Put` events for objects that already
//! sit in an S3 bucket, one SQS message per object.
//!
//! 🎬 *[the objects were uploaded months ago. the consumer was deployed yesterday.]*
//! *[somebody has to tell it what it missed.]*
//!
//! The pieces:
//! - `app_config`: figment layers, env + TOML
//! - `backends`: S3 lister, SQS queue, in-memory twins, AWS plumbing
//! - `batcher` / `common`: object descriptors grouped into fixed-size batches
//! - `events`: the S3 event notification shape and its forging
//! - `supervisors`: count, confirm, dispatch with bounded concurrency, report
//! - `progress`: the bar and the end-of-run table

pub mod app_config;
pub mod backends;
pub mod batcher;
pub mod common;
pub mod events;
pub mod progress;
pub mod supervisors;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::aws::{AwsClients, resolve_account_id};
use crate::backends::{InMemoryQueue, ListerBackend, QueueBackend, S3Lister, SqsQueue};
use crate::events::EventTemplate;
use crate::supervisors::{Confirm, RunReport, Supervisor};

/// 🎛️ Knobs that belong to this invocation, not to the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// 🧪 list and forge for real, but send to an in-memory queue
    pub dry_run: bool,
}

/// 🚀 Wire the real backends together and run one replay.
///
/// 💀 Fatal errors (no identity, counting failed, prompt I/O broke) come back
/// as `Err`. Everything that happens once dispatch started is in the report.
pub async fn run(
    app_config: AppConfig,
    options: RunOptions,
    confirm: &dyn Confirm,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let the_clients = AwsClients::from_app_config(&app_config).await;
    let the_account_id = resolve_account_id(&the_clients.sdk_config)
        .await
        .context("💀 Could not resolve the AWS account id that goes into principalId")?;

    let the_template = EventTemplate::new(
        &app_config.region,
        &app_config.bucket,
        the_account_id,
        &app_config.event,
    );
    let the_lister = ListerBackend::S3(S3Lister::new(the_clients.s3.clone()));
    let the_queue = if options.dry_run {
        info!("🧪 Dry run: events are forged but stay in memory, SQS never hears about them");
        QueueBackend::InMemory(InMemoryQueue::new())
    } else {
        QueueBackend::Sqs(SqsQueue::new(the_clients.sqs.clone(), &app_config.queue_url))
    };

    Supervisor::new(app_config, the_lister, the_queue, the_template)
        .run(confirm, cancel)
        .await
}
