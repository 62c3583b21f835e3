pub mod file;
pub mod mapping;
pub mod spill_file;
