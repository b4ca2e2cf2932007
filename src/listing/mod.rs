//! Product listings and where their outcomes are recorded.

mod models;
mod store;

pub use models::{ListingDisposition, Product};
pub use store::{JsonListingStore, ListingStore, ListingStoreError};
