// ai
//! 📦 Common data structures: the building blocks of backfillx
//!
//! ---
//!
//! 🎬 COLD OPEN: INT. S3 CONSOLE, 3:47 AM
//!
//! 🌩️ Eleven million objects sit under a prefix. Someone wired up an SQS
//! notification *after* they were uploaded. The downstream Lambda has never
//! heard of any of them. The objects don't know they are invisible. Relatable.
//!
//! ✅ And then, an `ObjectDescriptor` arrives. Key, tag, size. Nothing else.
//! It gets grouped into a `Batch` with nine friends and shipped off to a
//! worker, which pretends S3 just told it about them. Like a postal worker
//! re-delivering mail that was never sent. Please tip your postal workers. 🦆

use std::fmt;

/// 🪣 One object as reported by the storage listing: key, content tag, size.
///
/// Immutable once listed. The tag is the opaque ETag the store handed us, kept
/// verbatim (quotes included) and empty when the store gave us nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectDescriptor {
    /// 🗝️ full object key, prefix included
    pub key: String,
    /// 🏷️ ETag, or `""` when the listing didn't carry one
    pub tag: String,
    /// 📏 bytes. zero is a perfectly valid size, ask any `.keep` file.
    pub size: u64,
}

impl ObjectDescriptor {
    /// 🏗️ Build a descriptor from the pieces. Mostly for tests and the in-memory lister.
    pub fn new(key: impl Into<String>, tag: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            tag: tag.into(),
            size,
        }
    }
}

/// 📦 An ordered group of objects handed to exactly one dispatch worker.
///
/// Moved, never shared: once a worker owns it, nobody else gets to touch it.
/// The borrow checker enforces this. We just wrote it down.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    objects: Vec<ObjectDescriptor>,
}

impl Batch {
    pub(crate) fn from_objects(objects: Vec<ObjectDescriptor>) -> Self {
        Self { objects }
    }

    /// 📊 how many objects ride in this batch
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// 👀 peek at the objects, in listing order
    pub fn objects(&self) -> &[ObjectDescriptor] {
        &self.objects
    }
}

impl IntoIterator for Batch {
    type Item = ObjectDescriptor;
    type IntoIter = std::vec::IntoIter<ObjectDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

impl fmt::Display for ObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -- 🎭 keys are what humans grep for in logs. give them the key.
        write!(f, "{} ({} bytes)", self.key, self.size)
    }
}
