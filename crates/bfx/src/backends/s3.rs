// ai
//! 🪣📡 S3 Lister: walking a prefix one `ListObjectsV2` page at a time.
//!
//! INT. AWS CONSOLE, NIGHT. A prefix holds a few million objects. S3 will
//! hand them over 1000 at a time, each page ending with a continuation token
//! like a cliffhanger at the end of a TV episode. This module watches every
//! episode in order and never skips ahead.
//!
//! 🧠 Knowledge graph:
//! - `S3Lister` owns the client, hands out a fresh `S3Paginator` per pass
//! - `S3Paginator` keeps the token; `is_truncated` + `next_continuation_token` drive it
//! - truncated page without a token = the listing is over (S3 shouldn't do that, but still)
//! - any SDK error poisons the paginator: `has_more_pages()` goes false, error bubbles up

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::backends::{Lister, Paginator};
use crate::common::ObjectDescriptor;

/// 🪣 Starts S3 listings. Cheap to clone the client, so we just hold one.
#[derive(Debug, Clone)]
pub struct S3Lister {
    client: aws_sdk_s3::Client,
}

impl S3Lister {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

impl Lister for S3Lister {
    type Pages = S3Paginator;

    fn paginate(&self, bucket: &str, prefix: &str) -> S3Paginator {
        S3Paginator {
            client: self.client.clone(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            continuation_token: None,
            exhausted: false,
            pages_fetched: 0,
        }
    }
}

/// 📄 One pass over `s3://bucket/prefix`. Not restartable, not shareable.
#[derive(Debug)]
pub struct S3Paginator {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    continuation_token: Option<String>,
    exhausted: bool,
    pages_fetched: usize,
}

#[async_trait]
impl Paginator for S3Paginator {
    fn has_more_pages(&self) -> bool {
        !self.exhausted
    }

    async fn next_page(&mut self) -> Result<Vec<ObjectDescriptor>> {
        if self.exhausted {
            bail!(
                "💀 next_page() called on a finished listing of s3://{}/{}. \
                 Check has_more_pages() first. The well is dry.",
                self.bucket,
                self.prefix
            );
        }

        let mut the_request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix);
        if let Some(token) = &self.continuation_token {
            the_request = the_request.continuation_token(token);
        }

        let the_response = match the_request.send().await {
            Ok(response) => response,
            Err(err) => {
                // -- 🧯 one bad page ends the whole listing
                self.exhausted = true;
                return Err(err).with_context(|| {
                    format!(
                        "💀 ListObjectsV2 failed for s3://{}/{} on page {}. \
                         Check: bucket name, region, s3:ListBucket permission.",
                        self.bucket,
                        self.prefix,
                        self.pages_fetched + 1
                    )
                });
            }
        };
        self.pages_fetched += 1;

        let the_page: Vec<ObjectDescriptor> = the_response
            .contents()
            .iter()
            .map(|object| ObjectDescriptor {
                key: object.key().unwrap_or_default().to_string(),
                tag: object.e_tag().unwrap_or_default().to_string(),
                size: object.size().unwrap_or_default().max(0) as u64,
            })
            .collect();

        self.continuation_token = match the_response.is_truncated() {
            Some(true) => the_response.next_continuation_token().map(str::to_string),
            _ => None,
        };
        self.exhausted = self.continuation_token.is_none();

        trace!(
            "🪣 page {} of s3://{}/{} brought {} objects",
            self.pages_fetched,
            self.bucket,
            self.prefix,
            the_page.len()
        );
        if self.exhausted {
            debug!(
                "🏁 listing of s3://{}/{} finished after {} pages",
                self.bucket, self.prefix, self.pages_fetched
            );
        }
        Ok(the_page)
    }
}
