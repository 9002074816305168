use std::collections::HashSet;
use std::sync::Arc;

use crate::batch::{resolve_batch, RequestLimiter};
use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::models::{Item, Story, StoryCollection};

pub struct StoryListLoader {
    source: Arc<dyn ItemSource>,
    limiter: RequestLimiter,
    limit: usize,
}

impl StoryListLoader {
    pub fn new(source: Arc<dyn ItemSource>, limiter: RequestLimiter, limit: usize) -> Self {
        Self {
            source,
            limiter,
            limit,
        }
    }

    /// Fetch the newest story ids, resolve each one and return them newest
    /// first. Any failed lookup fails the whole load.
    pub async fn load(&self) -> Result<StoryCollection, FetchError> {
        let mut ids = self.source.new_story_ids().await?;
        ids.truncate(self.limit);

        // Ids must be unique within a collection; keep the first occurrence
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));

        let mut stories = resolve_batch(self.source.as_ref(), &self.limiter, &ids, Item::into_story).await?;
        sort_newest_first(&mut stories);

        tracing::info!(requested = ids.len(), count = stories.len(), "loaded stories");
        Ok(StoryCollection::new(stories))
    }
}

// Stable, so equal timestamps keep resolution order
pub fn sort_newest_first(stories: &mut [Story]) {
    stories.sort_by(|a, b| b.time.cmp(&a.time));
}

/// Stories whose title contains `query`, ignoring case. Order is preserved
/// and an empty query keeps everything.
pub fn filter_stories(stories: &[Story], query: &str) -> Vec<Story> {
    if query.is_empty() {
        return stories.to_vec();
    }

    let query = query.to_lowercase();
    stories
        .iter()
        .filter(|story| story.title.to_lowercase().contains(&query))
        .cloned()
        .collect()
}
