//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Listers pour object descriptors out of a bucket, page by page. Queues
//! slurp up forged event payloads. And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need to list a real S3 prefix? Feed
//! a real SQS queue? Fake both in RAM for a test or a dry run? We've got a
//! backend for that.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls → `*Backend` enum that dispatches
//! - `Lister` makes a fresh `Paginator` per listing pass (count pass, dispatch pass)
//! - `Paginator`: `has_more_pages()` + `next_page()`, continuation tokens stay inside
//! - `Queue`: `send(&self)`, shared by every worker behind an `Arc`
//! - `aws`: SDK config + the "who am I" call, done once at startup
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;

use crate::common::ObjectDescriptor;

pub mod aws;
pub mod in_mem;
pub mod s3;
pub mod sqs;

pub use in_mem::{InMemoryLister, InMemoryPaginator, InMemoryQueue};
pub use s3::{S3Lister, S3Paginator};
pub use sqs::SqsQueue;

// ===== Paginator =====

/// 📄 A lazy, finite, one-shot walk over the objects under a prefix.
///
/// # Contract 📜
/// - check `has_more_pages()` before every `next_page()`
/// - `next_page()` after exhaustion is an error, not an empty page
/// - an `Err` from `next_page()` ends the listing. No partial-page retry.
/// - not restartable. Want to list again? Ask the `Lister` for a new one.
#[async_trait]
pub trait Paginator: Debug + Send {
    /// 🔍 is there another page behind the curtain?
    fn has_more_pages(&self) -> bool;
    /// 📦 fetch the next page of descriptors (may be empty, S3 does that sometimes)
    async fn next_page(&mut self) -> Result<Vec<ObjectDescriptor>>;
}

/// 🗂️ Something that can start a fresh listing of `bucket`/`prefix`.
pub trait Lister: Debug + Send + Sync {
    type Pages: Paginator;
    fn paginate(&self, bucket: &str, prefix: &str) -> Self::Pages;
}

/// 🎭 The many faces of a Lister.
#[derive(Debug)]
pub enum ListerBackend {
    S3(S3Lister),
    InMemory(InMemoryLister),
}

/// 🎭 ...and the many faces of the paginators they hand out.
#[derive(Debug)]
pub enum PaginatorBackend {
    S3(S3Paginator),
    InMemory(InMemoryPaginator),
}

impl Lister for ListerBackend {
    type Pages = PaginatorBackend;

    fn paginate(&self, bucket: &str, prefix: &str) -> PaginatorBackend {
        match self {
            ListerBackend::S3(lister) => PaginatorBackend::S3(lister.paginate(bucket, prefix)),
            ListerBackend::InMemory(lister) => {
                PaginatorBackend::InMemory(lister.paginate(bucket, prefix))
            }
        }
    }
}

#[async_trait]
impl Paginator for PaginatorBackend {
    fn has_more_pages(&self) -> bool {
        match self {
            PaginatorBackend::S3(p) => p.has_more_pages(),
            PaginatorBackend::InMemory(p) => p.has_more_pages(),
        }
    }

    async fn next_page(&mut self) -> Result<Vec<ObjectDescriptor>> {
        match self {
            PaginatorBackend::S3(p) => p.next_page().await,
            PaginatorBackend::InMemory(p) => p.next_page().await,
        }
    }
}

// ===== Queue =====

/// 📬 A destination that accepts one opaque payload per call.
///
/// # Contract 📜
/// - one call, one message. No batching here; the worker calls us once per object.
/// - `&self`, because a hundred workers hold the same queue at the same time
/// - one attempt. `Err` means this payload failed; the caller counts it and moves on.
#[async_trait]
pub trait Queue: Debug + Send + Sync {
    async fn send(&self, payload: String) -> Result<()>;
}

/// 🎭 The many faces of a Queue. Real SQS, or a Vec pretending very hard.
#[derive(Debug)]
pub enum QueueBackend {
    Sqs(SqsQueue),
    InMemory(InMemoryQueue),
}

#[async_trait]
impl Queue for QueueBackend {
    async fn send(&self, payload: String) -> Result<()> {
        match self {
            QueueBackend::Sqs(queue) => queue.send(payload).await,
            QueueBackend::InMemory(queue) => queue.send(payload).await,
        }
    }
}
