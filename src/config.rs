use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SortError};
use crate::serializer::Serializer;

pub const DEFAULT_MAX_RECORD_SIZE: usize = 4096;
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 16 * DEFAULT_MAX_RECORD_SIZE;
pub const DEFAULT_INTERNAL_SORT_MAX_ITEMS: usize = 20_000;

pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Validated sort parameters shared by every accumulator of one sort.
pub struct Configuration<T> {
    serializer: Arc<dyn Serializer<T>>,
    comparator: Comparator<T>,
    max_record_size: usize,
    write_buffer_size: usize,
    internal_sort_max_items: usize,
    max_number_of_chunks: Option<usize>,
    parallel_sort: bool,
    temp_dir: Option<PathBuf>,
}

impl<T> Clone for Configuration<T> {
    fn clone(&self) -> Self {
        Self {
            serializer: Arc::clone(&self.serializer),
            comparator: Arc::clone(&self.comparator),
            max_record_size: self.max_record_size,
            write_buffer_size: self.write_buffer_size,
            internal_sort_max_items: self.internal_sort_max_items,
            max_number_of_chunks: self.max_number_of_chunks,
            parallel_sort: self.parallel_sort,
            temp_dir: self.temp_dir.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Configuration<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("max_record_size", &self.max_record_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("internal_sort_max_items", &self.internal_sort_max_items)
            .field("max_number_of_chunks", &self.max_number_of_chunks)
            .field("parallel_sort", &self.parallel_sort)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl<T> Configuration<T> {
    pub fn serializer(&self) -> &dyn Serializer<T> {
        self.serializer.as_ref()
    }

    pub(crate) fn shared_serializer(&self) -> Arc<dyn Serializer<T>> {
        Arc::clone(&self.serializer)
    }

    pub fn comparator(&self) -> &Comparator<T> {
        &self.comparator
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.comparator)(a, b)
    }

    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn internal_sort_max_items(&self) -> usize {
        self.internal_sort_max_items
    }

    pub fn max_number_of_chunks(&self) -> Option<usize> {
        self.max_number_of_chunks
    }

    pub fn parallel_sort(&self) -> bool {
        self.parallel_sort
    }

    /// Directory for spill files; `None` means the OS temp dir.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }
}

pub struct ConfigurationBuilder<T> {
    serializer: Arc<dyn Serializer<T>>,
    comparator: Comparator<T>,
    max_record_size: usize,
    write_buffer_size: usize,
    internal_sort_max_items: usize,
    max_number_of_chunks: Option<usize>,
    parallel_sort: bool,
    temp_dir: Option<PathBuf>,
}

impl<T> ConfigurationBuilder<T> {
    pub fn new<S, F>(serializer: S, comparator: F) -> Self
    where
        S: Serializer<T> + 'static,
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            serializer: Arc::new(serializer),
            comparator: Arc::new(comparator),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            internal_sort_max_items: DEFAULT_INTERNAL_SORT_MAX_ITEMS,
            max_number_of_chunks: None,
            parallel_sort: false,
            temp_dir: None,
        }
    }

    /// Sort by the record's own `Ord` implementation.
    pub fn natural<S>(serializer: S) -> Self
    where
        S: Serializer<T> + 'static,
        T: Ord + 'static,
    {
        Self::new(serializer, T::cmp)
    }

    pub fn comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Arc::new(comparator);
        self
    }

    pub fn max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    pub fn write_buffer_size(mut self, write_buffer_size: usize) -> Self {
        self.write_buffer_size = write_buffer_size;
        self
    }

    pub fn internal_sort_max_items(mut self, internal_sort_max_items: usize) -> Self {
        self.internal_sort_max_items = internal_sort_max_items;
        self
    }

    pub fn max_number_of_chunks(mut self, max_number_of_chunks: usize) -> Self {
        self.max_number_of_chunks = Some(max_number_of_chunks);
        self
    }

    pub fn parallel_sort(mut self, parallel_sort: bool) -> Self {
        self.parallel_sort = parallel_sort;
        self
    }

    pub fn temp_dir(mut self, temp_dir: impl AsRef<Path>) -> Self {
        self.temp_dir = Some(temp_dir.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<Configuration<T>> {
        if self.max_record_size == 0 {
            return Err(SortError::config("max_record_size", "must be positive"));
        }
        if self.max_record_size > self.write_buffer_size {
            return Err(SortError::config(
                "max_record_size",
                format!(
                    "record size {} must not be larger than write buffer {}",
                    self.max_record_size, self.write_buffer_size
                ),
            ));
        }
        if self.internal_sort_max_items == 0 {
            return Err(SortError::config(
                "internal_sort_max_items",
                "must be positive",
            ));
        }
        if let Some(max_chunks) = self.max_number_of_chunks {
            if max_chunks < 2 {
                return Err(SortError::config(
                    "max_number_of_chunks",
                    format!("merge fan-in {} must be at least 2", max_chunks),
                ));
            }
        }

        Ok(Configuration {
            serializer: self.serializer,
            comparator: self.comparator,
            max_record_size: self.max_record_size,
            write_buffer_size: self.write_buffer_size,
            internal_sort_max_items: self.internal_sort_max_items,
            max_number_of_chunks: self.max_number_of_chunks,
            parallel_sort: self.parallel_sort,
            temp_dir: self.temp_dir,
        })
    }
}
