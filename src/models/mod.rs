//! Data models for brainscrape.

mod product;

pub use product::ProductRecord;
