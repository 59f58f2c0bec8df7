pub mod batcher;
pub mod error;
pub mod fetcher;
pub mod transformer;
