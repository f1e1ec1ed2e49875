//! 🧺 The Batcher: groups a stream of objects into fixed-size batches.
//!
//! Objects go in one at a time. Every `batch_size` objects, a full [`Batch`]
//! falls out the bottom. When the listing ends, whatever is left gets swept
//! into one last, shorter batch. No reordering, no dedup, no opinions.
//!
//! 🦆 The duck sorts nothing. The duck merely counts to ten.

use crate::common::{Batch, ObjectDescriptor};

/// 🧺 Pure grouping state: the half-filled basket and the size it fills up at.
#[derive(Debug)]
pub struct Batcher {
    batch_size: usize,
    current: Vec<ObjectDescriptor>,
}

impl Batcher {
    /// 🏗️ A batcher that emits every `batch_size` objects. Zero is treated as one,
    /// because a batch of nothing is a philosophical problem, not a data structure.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            current: Vec::with_capacity(batch_size),
        }
    }

    /// ➕ Add one object. Returns the full batch the moment it reaches `batch_size`.
    pub fn push(&mut self, object: ObjectDescriptor) -> Option<Batch> {
        self.current.push(object);
        if self.current.len() >= self.batch_size {
            let the_full_basket =
                std::mem::replace(&mut self.current, Vec::with_capacity(self.batch_size));
            return Some(Batch::from_objects(the_full_basket));
        }
        None
    }

    /// 📏 objects waiting in the basket that have not been emitted yet
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// 🏁 End of stream: hand back the leftovers, if there are any.
    pub fn finish(self) -> Option<Batch> {
        if self.current.is_empty() {
            None
        } else {
            Some(Batch::from_objects(self.current))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_objects(how_many: usize) -> Vec<ObjectDescriptor> {
        (0..how_many)
            .map(|i| ObjectDescriptor::new(format!("obj-{i:04}"), "", i as u64))
            .collect()
    }

    fn batch_everything(objects: Vec<ObjectDescriptor>, batch_size: usize) -> Vec<Batch> {
        let mut the_batcher = Batcher::new(batch_size);
        let mut the_batches: Vec<Batch> = objects
            .into_iter()
            .filter_map(|o| the_batcher.push(o))
            .collect();
        the_batches.extend(the_batcher.finish());
        the_batches
    }

    #[test]
    fn the_one_where_batch_counts_are_always_the_ceiling() {
        for how_many in 0..60usize {
            for batch_size in 1..13usize {
                let the_batches = batch_everything(the_objects(how_many), batch_size);

                assert_eq!(
                    the_batches.len(),
                    how_many.div_ceil(batch_size),
                    "M={how_many} N={batch_size}"
                );
                // -- 📏 all but the last are exactly N, the last is 1..=N
                if let Some((the_last, the_rest)) = the_batches.split_last() {
                    assert!(the_rest.iter().all(|b| b.len() == batch_size));
                    assert!((1..=batch_size).contains(&the_last.len()));
                }
                // -- 🔄 flatten gives back the input, same order, nothing doubled
                let the_keys: Vec<String> = the_batches
                    .into_iter()
                    .flat_map(|b| b.into_iter().map(|o| o.key))
                    .collect();
                let the_expected: Vec<String> =
                    the_objects(how_many).into_iter().map(|o| o.key).collect();
                assert_eq!(the_keys, the_expected);
            }
        }
    }

    #[test]
    fn the_one_where_twenty_five_objects_make_ten_ten_five() {
        let the_sizes: Vec<usize> = batch_everything(the_objects(25), 10)
            .iter()
            .map(Batch::len)
            .collect();
        assert_eq!(the_sizes, vec![10, 10, 5]);
    }

    #[test]
    fn the_one_where_an_empty_stream_emits_nothing_at_all() {
        assert!(Batcher::new(10).finish().is_none());
    }

    #[test]
    fn the_one_where_batch_size_zero_behaves_like_one() {
        let mut the_batcher = Batcher::new(0);
        assert!(the_batcher.push(ObjectDescriptor::new("solo", "", 1)).is_some());
        assert_eq!(the_batcher.pending(), 0);
    }
}
