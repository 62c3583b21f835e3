pub mod chunk;
pub mod cursor;
pub mod merge;
pub mod output;
pub mod sort_buffer;
