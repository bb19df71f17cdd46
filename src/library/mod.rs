//! Runtime library catalog and loader
//!
//! Renderers declare third-party libraries by name (react, babel, chart.js).
//! The loader resolves names against a validated catalog, fetches each
//! library once through a pluggable fetcher, and records injection order in
//! the document head.

pub mod catalog;
pub mod fetcher;
pub mod loader;

pub use catalog::LibraryCatalog;
pub use fetcher::{HttpFetcher, LibraryFetcher, NoopFetcher};
pub use loader::{library_tag, HeadEntry, LibraryLoader, LoadStatus};
