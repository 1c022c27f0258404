//! Web capabilities: search and page fetching.
//!
//! The research engine only sees the [`Searcher`] and [`Fetcher`] traits.
//! [`SearxngSearcher`] and [`HttpFetcher`] are the bundled implementations
//! used by the binary.

pub mod fetch;
pub mod html;
pub mod search;

pub use fetch::{Fetcher, HttpFetcher};
pub use search::{SearchHit, Searcher, SearxngSearcher};
