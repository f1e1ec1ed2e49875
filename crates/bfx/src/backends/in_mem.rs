//! # Previously, on backfillx...
//!
//! 🎬 The bucket was real. The queue was real. The AWS bill was very real.
//! Someone had to build a backend so simple it lives entirely in RAM, gone
//! the moment you blink. That someone was this module.
//!
//! `in_mem` provides an in-memory [`Lister`] and [`Queue`]. The lister serves
//! pre-baked pages (and can be told to fail a specific page of a specific
//! pass, for the drama). The queue hoards every payload behind an
//! `Arc<Mutex<...>>` so callers can inspect what arrived. Tests use both.
//! `--dry-run` uses the queue so nothing leaves the machine.
//!
//! 🦆
//!
//! ✅ No network calls. No IAM policies. No mortgage on the line.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::backends::{Lister, Paginator, Queue};
use crate::common::ObjectDescriptor;

/// 💣 "fail page `page` (0-based) of listing pass `pass` (0-based)"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFailure {
    pub pass: usize,
    pub page: usize,
}

/// 🗂️ A bucket that fits in a Vec. Every `paginate()` call is a new pass.
#[derive(Debug, Default)]
pub struct InMemoryLister {
    pages: Vec<Vec<ObjectDescriptor>>,
    failure: Option<PageFailure>,
    page_latency: Option<Duration>,
    passes_started: AtomicUsize,
}

impl InMemoryLister {
    /// 🏗️ Serve exactly these pages, in this order.
    pub fn with_pages(pages: Vec<Vec<ObjectDescriptor>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    /// 🏗️ Chop `objects` into pages of `page_size` (S3 uses 1000, tests use less).
    pub fn with_objects(objects: Vec<ObjectDescriptor>, page_size: usize) -> Self {
        let the_pages = objects
            .chunks(page_size.max(1))
            .map(<[ObjectDescriptor]>::to_vec)
            .collect();
        Self::with_pages(the_pages)
    }

    /// 💣 Make one page of one pass blow up. Pass 0 is the count, pass 1 the dispatch.
    pub fn failing_at(mut self, failure: PageFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// 🐢 Sleep this long before serving each page, like a very large prefix would.
    pub fn with_page_latency(mut self, latency: Duration) -> Self {
        self.page_latency = Some(latency);
        self
    }

    /// 📊 how many listings have been started so far
    pub fn passes_started(&self) -> usize {
        self.passes_started.load(Ordering::SeqCst)
    }
}

impl Lister for InMemoryLister {
    type Pages = InMemoryPaginator;

    fn paginate(&self, bucket: &str, prefix: &str) -> InMemoryPaginator {
        let the_pass = self.passes_started.fetch_add(1, Ordering::SeqCst);
        let fail_at_page = self
            .failure
            .filter(|failure| failure.pass == the_pass)
            .map(|failure| failure.page);
        trace!("🗂️ in-memory pass {the_pass} over {bucket}/{prefix}");

        InMemoryPaginator {
            pages: self.pages.iter().cloned().collect(),
            fail_at_page,
            page_latency: self.page_latency,
            pages_served: 0,
            poisoned: false,
        }
    }
}

/// 📄 One pass over the in-memory pages.
#[derive(Debug)]
pub struct InMemoryPaginator {
    pages: VecDeque<Vec<ObjectDescriptor>>,
    fail_at_page: Option<usize>,
    page_latency: Option<Duration>,
    pages_served: usize,
    poisoned: bool,
}

#[async_trait]
impl Paginator for InMemoryPaginator {
    fn has_more_pages(&self) -> bool {
        !self.poisoned && !self.pages.is_empty()
    }

    async fn next_page(&mut self) -> Result<Vec<ObjectDescriptor>> {
        if let Some(latency) = self.page_latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_at_page == Some(self.pages_served) {
            self.poisoned = true;
            bail!(
                "💀 simulated listing failure on page {} (0-based). The RAM said no.",
                self.pages_served
            );
        }
        match self.pages.pop_front() {
            Some(page) => {
                self.pages_served += 1;
                Ok(page)
            }
            None => bail!("💀 next_page() on an exhausted in-memory listing"),
        }
    }
}

/// 📬 A queue that never forgets. Unlike SQS, which forgets after 4 days by default.
///
/// Clone-able: clones share the same vault, so a test can hand one copy to
/// the pipeline and read the other afterwards.
#[derive(Debug, Default, Clone)]
pub struct InMemoryQueue {
    /// 🔒 every accepted payload, in arrival order
    received: Arc<tokio::sync::Mutex<Vec<String>>>,
    /// 📞 every call, accepted or not
    calls: Arc<AtomicU64>,
    /// 💣 payloads containing any of these needles get rejected
    reject_when_contains: Vec<String>,
    /// 🐢 pretend network latency
    latency: Option<Duration>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 💣 Reject any payload that contains `needle` (an object key works nicely).
    pub fn rejecting(mut self, needle: impl Into<String>) -> Self {
        self.reject_when_contains.push(needle.into());
        self
    }

    /// 🐢 Sleep this long inside every `send`, so workers overlap like real ones.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 👀 a copy of everything accepted so far
    pub async fn payloads(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// 📞 how many times `send` was called, failures included
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn send(&self, payload: String) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(needle) = self
            .reject_when_contains
            .iter()
            .find(|needle| payload.contains(needle.as_str()))
        {
            bail!("💀 in-memory queue rejected a payload containing '{needle}'");
        }
        debug!("📬 in-memory queue accepted {} bytes", payload.len());
        self.received.lock().await.push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_objects(how_many: usize) -> Vec<ObjectDescriptor> {
        (0..how_many)
            .map(|i| ObjectDescriptor::new(format!("k{i}"), "", 1))
            .collect()
    }

    #[tokio::test]
    async fn the_one_where_pages_come_out_in_order_and_then_stop() {
        let the_lister = InMemoryLister::with_objects(the_objects(5), 2);
        let mut the_pages = the_lister.paginate("b", "p");

        let mut the_sizes = Vec::new();
        while the_pages.has_more_pages() {
            the_sizes.push(the_pages.next_page().await.expect("💀 page").len());
        }
        assert_eq!(the_sizes, vec![2, 2, 1]);
        assert!(the_pages.next_page().await.is_err());
    }

    #[tokio::test]
    async fn the_one_where_only_the_chosen_pass_fails() {
        let the_lister = InMemoryLister::with_objects(the_objects(4), 2)
            .failing_at(PageFailure { pass: 1, page: 1 });

        let mut the_count_pass = the_lister.paginate("b", "p");
        assert!(the_count_pass.next_page().await.is_ok());
        assert!(the_count_pass.next_page().await.is_ok());

        let mut the_dispatch_pass = the_lister.paginate("b", "p");
        assert!(the_dispatch_pass.next_page().await.is_ok());
        assert!(the_dispatch_pass.next_page().await.is_err());
        assert!(!the_dispatch_pass.has_more_pages());
        assert_eq!(the_lister.passes_started(), 2);
    }

    #[tokio::test]
    async fn the_one_where_the_queue_keeps_receipts_and_rejects_on_cue() {
        let the_queue = InMemoryQueue::new().rejecting("poison");
        let the_peek = the_queue.clone();

        assert!(the_queue.send("hello".to_string()).await.is_ok());
        assert!(the_queue.send("poison pill".to_string()).await.is_err());

        assert_eq!(the_peek.payloads().await, vec!["hello".to_string()]);
        assert_eq!(the_peek.calls(), 2);
    }
}
