// External sort library: bounded in-memory runs, one spill file, k-way merge

pub mod accumulator;
pub mod collect;
pub mod config;
pub mod diskio;
pub mod error;
pub mod input_reader;
pub mod serializer;
pub mod sort;

// Export the main types
pub use accumulator::Accumulator;
pub use collect::ExternalSort;
pub use config::{Comparator, Configuration, ConfigurationBuilder};
pub use error::{ErrorKind, Result, SortError};
pub use input_reader::FileSource;
pub use serializer::{DecodeError, Serializer, ensure_remaining};
pub use sort::output::SortedIter;
