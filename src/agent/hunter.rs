//! Hunter: turns a search query into source candidates.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::model::{Source, TaskId};
use crate::web::Searcher;

/// Finds sources for a task through the injected [`Searcher`].
///
/// Holds no state between calls. A search failure is logged and yields no
/// sources; it never fails the task.
pub struct Hunter<'a> {
    searcher: &'a dyn Searcher,
    search_count: usize,
}

impl<'a> Hunter<'a> {
    /// Creates a hunter requesting `search_count` results per query.
    #[must_use]
    pub fn new(searcher: &'a dyn Searcher, search_count: usize) -> Self {
        Self {
            searcher,
            search_count,
        }
    }

    /// Searches `query` on behalf of `task_id`.
    pub async fn hunt(&self, task_id: &TaskId, query: &str) -> Vec<Source> {
        let hits = match self.searcher.search(query, self.search_count).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(task = %task_id, query, error = %e, "search failed");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let sources: Vec<Source> = hits
            .into_iter()
            .filter(|hit| !hit.url.trim().is_empty())
            .filter(|hit| seen.insert(hit.url.trim().to_string()))
            .take(self.search_count)
            .map(|hit| Source::new(hit.url.trim(), hit.title, hit.description, task_id.clone()))
            .collect();

        debug!(task = %task_id, query, sources = sources.len(), "hunt completed");
        sources
    }
}
