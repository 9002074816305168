use std::sync::Arc;

use crate::batch::{resolve_batch, RequestLimiter};
use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::models::{ChildrenState, Comment, CommentNode, Item, Story};

#[derive(Clone)]
pub struct CommentTreeLoader {
    source: Arc<dyn ItemSource>,
    limiter: RequestLimiter,
}

impl CommentTreeLoader {
    pub fn new(source: Arc<dyn ItemSource>, limiter: RequestLimiter) -> Self {
        Self { source, limiter }
    }

    /// Resolve one level of a thread in `ids` order, skipping deleted and
    /// dead comments. Any other failure fails the level.
    pub async fn resolve(&self, ids: &[u64]) -> Result<Vec<Comment>, FetchError> {
        let comments = resolve_batch(self.source.as_ref(), &self.limiter, ids, Item::into_comment).await?;
        tracing::debug!(requested = ids.len(), count = comments.len(), "resolved comments");
        Ok(comments)
    }

    // Top level of a story's thread, newest first
    pub async fn resolve_thread(&self, ids: &[u64]) -> Result<Vec<Comment>, FetchError> {
        let mut comments = self.resolve(ids).await?;
        comments.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(comments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadState {
    Loading,
    Loaded,
    Failed(String),
}

/// The materialized thread of the story being viewed.
///
/// Only the top level is ordered by recency. Replies below it keep the
/// order of their parent's `kids`, minus tombstones, at every depth.
#[derive(Debug, Clone)]
pub struct CommentTree {
    pub story: Story,
    pub roots: Vec<CommentNode>,
    pub state: ThreadState,
}

impl CommentTree {
    pub fn new(story: Story) -> Self {
        let state = if story.kids.is_empty() {
            ThreadState::Loaded
        } else {
            ThreadState::Loading
        };

        Self {
            story,
            roots: Vec::new(),
            state,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == ThreadState::Loading
    }

    // Replaces the whole top level, dropping nested expansions
    pub fn set_roots(&mut self, comments: Vec<Comment>) {
        self.roots = comments.into_iter().map(CommentNode::new).collect();
        self.state = ThreadState::Loaded;
    }

    // Whatever was displayed before stays displayed
    pub fn fail(&mut self, message: String) {
        self.state = ThreadState::Failed(message);
    }

    // Starting a reload cancels every reply fetch still in flight
    pub fn begin_reload(&mut self) {
        self.state = ThreadState::Loading;
        for node in &mut self.roots {
            node.reset_pending();
        }
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut CommentNode> {
        self.roots.iter_mut().find_map(|node| node.find_mut(id))
    }

    /// Expand or collapse a comment. Returns the reply ids to fetch when the
    /// replies are not already cached.
    pub fn toggle(&mut self, id: u64) -> Option<Vec<u64>> {
        let node = self.find_mut(id)?;
        if node.toggle() {
            Some(node.comment.kids.clone())
        } else {
            None
        }
    }

    // Refetch the replies of a comment whose last fetch failed
    pub fn retry(&mut self, id: u64) -> Option<Vec<u64>> {
        let node = self.find_mut(id)?;
        if !matches!(node.state, ChildrenState::Failed(_)) {
            return None;
        }
        node.expanded = false;
        if node.toggle() {
            Some(node.comment.kids.clone())
        } else {
            None
        }
    }

    pub fn attach(&mut self, id: u64, replies: Vec<Comment>) -> bool {
        match self.find_mut(id) {
            Some(node) => {
                node.attach(replies);
                true
            }
            None => false,
        }
    }

    pub fn fail_node(&mut self, id: u64, message: String) {
        if let Some(node) = self.find_mut(id) {
            node.fail(message);
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.roots.iter().map(|node| 1 + node.loaded_descendants()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment_item, story_with_kids, FakeSource};

    fn loader(source: FakeSource) -> (Arc<FakeSource>, CommentTreeLoader) {
        let source = Arc::new(source);
        let loader = CommentTreeLoader::new(source.clone(), RequestLimiter::new(8));
        (source, loader)
    }

    fn ids(comments: &[Comment]) -> Vec<u64> {
        comments.iter().map(|comment| comment.id).collect()
    }

    fn thread_source() -> FakeSource {
        FakeSource::new()
            .with_item(comment_item(10, 100, vec![20, 21, 22]))
            .with_item(comment_item(11, 300, vec![]))
            .with_item(comment_item(12, 200, vec![]))
            .with_item(comment_item(20, 50, vec![30]))
            .with_null(21)
            .with_item(comment_item(22, 900, vec![]))
            .with_item(comment_item(30, 10, vec![]))
    }

    #[tokio::test]
    async fn resolve_keeps_id_order() {
        let (_, loader) = loader(thread_source());
        assert_eq!(ids(&loader.resolve(&[10, 11, 12]).await.unwrap()), vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn thread_top_level_is_newest_first() {
        let (_, loader) = loader(thread_source());
        assert_eq!(ids(&loader.resolve_thread(&[10, 11, 12]).await.unwrap()), vec![11, 12, 10]);
    }

    #[tokio::test]
    async fn null_reply_is_omitted_and_siblings_populate() {
        let (_, loader) = loader(thread_source());
        let replies = loader.resolve(&[20, 21, 22]).await.unwrap();
        // upstream order, not time order
        assert_eq!(ids(&replies), vec![20, 22]);
    }

    #[tokio::test]
    async fn resolving_twice_gives_equal_results() {
        let (_, loader) = loader(thread_source());
        let first = loader.resolve(&[10, 11, 12]).await.unwrap();
        let second = loader.resolve(&[10, 11, 12]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_reply_fails_the_level() {
        let (_, loader) = loader(thread_source().with_failure(22));
        assert!(loader.resolve(&[20, 21, 22]).await.is_err());
    }

    #[tokio::test]
    async fn re_expansion_uses_cached_replies() {
        let (source, loader) = loader(thread_source());
        let story = story_with_kids(1, 1000, vec![10, 11, 12]).into_story().unwrap();
        let mut tree = CommentTree::new(story.clone());
        assert!(tree.is_loading());

        tree.set_roots(loader.resolve_thread(&story.kids).await.unwrap());
        assert_eq!(source.fetch_count(), 3);

        let kids = tree.toggle(10).expect("first expansion fetches");
        tree.attach(10, loader.resolve(&kids).await.unwrap());
        assert_eq!(source.fetch_count(), 6);

        assert_eq!(tree.toggle(10), None);
        assert_eq!(tree.toggle(10), None);
        assert_eq!(source.fetch_count(), 6);

        let node = tree.find_mut(10).unwrap();
        assert!(node.expanded);
        assert_eq!(node.state, ChildrenState::Loaded);
        assert_eq!(node.children.len(), 2);
    }

    #[tokio::test]
    async fn expands_to_any_depth() {
        let (_, loader) = loader(thread_source());
        let mut tree = CommentTree::new(story_with_kids(1, 1000, vec![10]).into_story().unwrap());
        tree.set_roots(loader.resolve_thread(&[10]).await.unwrap());

        let kids = tree.toggle(10).unwrap();
        tree.attach(10, loader.resolve(&kids).await.unwrap());
        let kids = tree.toggle(20).unwrap();
        assert_eq!(kids, vec![30]);
        tree.attach(20, loader.resolve(&kids).await.unwrap());

        // recursion ends at a comment without replies
        assert_eq!(tree.toggle(30), None);
        assert_eq!(tree.loaded_count(), 4);
    }

    #[test]
    fn story_without_comments_is_loaded_immediately() {
        let tree = CommentTree::new(story_with_kids(1, 1000, vec![]).into_story().unwrap());
        assert_eq!(tree.state, ThreadState::Loaded);
        assert!(tree.roots.is_empty());
    }

    #[tokio::test]
    async fn failed_replies_can_be_retried() {
        let (source, loader) = loader(thread_source().with_failure(22));
        let mut tree = CommentTree::new(story_with_kids(1, 1000, vec![10]).into_story().unwrap());
        tree.set_roots(loader.resolve_thread(&[10]).await.unwrap());

        let kids = tree.toggle(10).unwrap();
        let err = loader.resolve(&kids).await.unwrap_err();
        tree.fail_node(10, err.to_string());
        assert_eq!(tree.retry(11), None);

        source.set_item(comment_item(22, 900, vec![]));
        let kids = tree.retry(10).expect("failed node refetches");
        tree.attach(10, loader.resolve(&kids).await.unwrap());

        let node = tree.find_mut(10).unwrap();
        assert!(node.expanded);
        assert_eq!(node.children.len(), 2);
        assert_eq!(tree.retry(10), None);
    }

    #[tokio::test]
    async fn reload_forgets_reply_fetches_in_flight() {
        let (_, loader) = loader(thread_source());
        let mut tree = CommentTree::new(story_with_kids(1, 1000, vec![10, 11]).into_story().unwrap());
        tree.set_roots(loader.resolve_thread(&[10, 11]).await.unwrap());

        assert!(tree.toggle(10).is_some());
        tree.begin_reload();
        tree.fail("reload failed".to_string());

        let node = tree.find_mut(10).unwrap();
        assert_eq!(node.state, ChildrenState::NotLoaded);
        assert!(!node.expanded);
        assert_eq!(tree.toggle(10), Some(vec![20, 21, 22]));
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut tree = CommentTree::new(story_with_kids(1, 1000, vec![10]).into_story().unwrap());
        assert_eq!(tree.toggle(99), None);
        assert!(!tree.attach(99, Vec::new()));
    }
}
