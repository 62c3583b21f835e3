//! Entry points that drive accumulators end to end.

use std::path::Path;
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::accumulator::Accumulator;
use crate::config::Configuration;
use crate::error::{Result, SortError};
use crate::input_reader::FileSource;
use crate::sort::output::SortedIter;

/// External sort driven by one [`Configuration`].
///
/// Every method creates fresh accumulators, so one `ExternalSort` can run any
/// number of sorts, including concurrently.
pub struct ExternalSort<T> {
    config: Arc<Configuration<T>>,
}

impl<T> Clone for ExternalSort<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Send> ExternalSort<T> {
    pub fn new(config: Configuration<T>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Configuration<T> {
        &self.config
    }

    /// An empty accumulator for callers that fold records themselves.
    pub fn accumulator(&self) -> Accumulator<T> {
        Accumulator::new(Arc::clone(&self.config))
    }

    pub fn sort<I>(&self, records: I) -> Result<SortedIter<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let mut acc = self.accumulator();
        for record in records {
            acc.add(record)?;
        }
        acc.finish()
    }

    /// Like [`ExternalSort::sort`], stopping at the first failed record.
    pub fn try_sort<I>(&self, records: I) -> Result<SortedIter<T>>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        let mut acc = self.accumulator();
        for record in records {
            acc.add(record?)?;
        }
        acc.finish()
    }

    /// Fold a rayon iterator into one accumulator per split and combine the
    /// splits in input order.
    pub fn par_sort<P>(&self, records: P) -> Result<SortedIter<T>>
    where
        P: IndexedParallelIterator<Item = T>,
    {
        let acc = records
            .try_fold(
                || self.accumulator(),
                |mut acc, record| {
                    acc.add(record)?;
                    Ok::<_, SortError>(acc)
                },
            )
            .try_reduce(|| self.accumulator(), |left, right| left.combine(right))?;

        debug!(
            "Parallel fold produced {} records in {} chunks",
            acc.len(),
            acc.chunk_count()
        );
        acc.finish()
    }

    /// Sort each partition on its own thread, then combine the partial
    /// results left to right.
    pub fn sort_partitions<I>(&self, partitions: Vec<I>) -> Result<SortedIter<T>>
    where
        I: IntoIterator<Item = T> + Send,
    {
        let count = partitions.len();
        let partials = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = partitions
                .into_iter()
                .map(|partition| {
                    scope.spawn(move |_| {
                        let mut acc = self.accumulator();
                        for record in partition {
                            acc.add(record)?;
                        }
                        Ok::<_, SortError>(acc)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(partial) => partial,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect::<Vec<Result<Accumulator<T>>>>()
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

        let mut acc = self.accumulator();
        for partial in partials {
            acc = acc.combine(partial?)?;
        }

        debug!("Combined {} partitions into {} records", count, acc.len());
        acc.finish()
    }

    /// Records of a file written with this sort's serializer, in file order.
    pub fn stream_file(&self, path: impl AsRef<Path>) -> Result<FileSource<T>> {
        FileSource::open(
            path,
            self.config.shared_serializer(),
            self.config.max_record_size(),
            self.config.write_buffer_size(),
        )
    }

    pub fn sort_file(&self, path: impl AsRef<Path>) -> Result<SortedIter<T>> {
        self.try_sort(self.stream_file(path)?)
    }
}
