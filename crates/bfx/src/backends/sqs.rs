// ai
//! 📬 SQS Queue: one `SendMessage` per forged event, one attempt each.
//!
//! No batching into `SendMessageBatch`, no retries of our own. A failed send
//! is reported to the worker, which counts it and moves on to the next object.
//! The SDK's own transport-level retry policy still applies underneath.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::trace;

use crate::backends::Queue;

/// 📬 A real SQS queue, addressed by URL.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn send(&self, payload: String) -> Result<()> {
        let the_response = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(payload)
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 SendMessage to {} failed. The queue ghosted us. \
                     Check: queue URL, sqs:SendMessage permission, queue policy, KMS access.",
                    self.queue_url
                )
            })?;

        trace!(
            "📬 SQS accepted message {}",
            the_response.message_id().unwrap_or("<no id>")
        );
        Ok(())
    }
}
