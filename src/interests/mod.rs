//! Interest taxonomy used to bias itinerary generation.
//!
//! The catalog is built once at startup and shared read-only between
//! requests.

pub mod catalog;

pub use catalog::{InterestCatalog, InterestCategory};
