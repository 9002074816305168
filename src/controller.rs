use chrono::{DateTime, Local};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::batch::RequestLimiter;
use crate::comments::{CommentTree, CommentTreeLoader};
use crate::config::Settings;
use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::models::{Comment, Story, StoryCollection};
use crate::stories::{filter_stories, StoryListLoader};
use crate::task::{run_cancellable, RefreshTimer, RequestSlot};

type RepaintHook = Arc<dyn Fn() + Send + Sync>;

// Completed background work, drained by `poll` on the UI thread
enum Event {
    StoriesLoaded {
        generation: u64,
        result: Result<StoryCollection, FetchError>,
    },
    ThreadLoaded {
        story_id: u64,
        generation: u64,
        result: Result<Vec<Comment>, FetchError>,
    },
    RepliesLoaded {
        comment_id: u64,
        generation: u64,
        result: Result<Vec<Comment>, FetchError>,
    },
    RefreshTick,
}

#[derive(Clone)]
struct Notifier {
    tx: Sender<Event>,
    repaint: Option<RepaintHook>,
}

impl Notifier {
    fn send(&self, event: Event) -> bool {
        let delivered = self.tx.send(event).is_ok();
        if let Some(repaint) = &self.repaint {
            repaint();
        }
        delivered
    }
}

/// Owns everything the reader shows: the published story list, the search
/// query, the open thread and the refresh timer.
///
/// Network work runs on the tokio runtime behind `handle`; results come back
/// through a channel and are only applied in `poll`, so the UI never sees a
/// half-written list or tree.
pub struct ReaderController {
    handle: Handle,
    story_loader: Arc<StoryListLoader>,
    comment_loader: CommentTreeLoader,
    refresh_interval: Duration,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    repaint: Option<RepaintHook>,
    stories: StoryCollection,
    visible: Vec<Story>,
    query: String,
    story_slot: RequestSlot,
    thread_slot: RequestSlot,
    thread: Option<CommentTree>,
    error: Option<String>,
    last_updated: Option<DateTime<Local>>,
    timer: Option<RefreshTimer>,
}

impl ReaderController {
    pub fn new(handle: Handle, source: Arc<dyn ItemSource>, settings: &Settings) -> Self {
        // Both loaders draw from one pool of request permits
        let limiter = RequestLimiter::new(settings.max_concurrent_requests);
        let (events_tx, events_rx) = channel();
        tracing::debug!(max_concurrent = limiter.max_concurrent(), "request limiter ready");

        Self {
            handle,
            story_loader: Arc::new(StoryListLoader::new(source.clone(), limiter.clone(), settings.story_limit)),
            comment_loader: CommentTreeLoader::new(source, limiter),
            refresh_interval: settings.refresh_interval(),
            events_tx,
            events_rx,
            repaint: None,
            stories: StoryCollection::default(),
            visible: Vec::new(),
            query: String::new(),
            story_slot: RequestSlot::default(),
            thread_slot: RequestSlot::default(),
            thread: None,
            error: None,
            last_updated: None,
            timer: None,
        }
    }

    // Called whenever background work completes so an idle UI wakes up
    pub fn set_repaint_hook<F>(&mut self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.repaint = Some(Arc::new(hook));
    }

    fn notifier(&self) -> Notifier {
        Notifier {
            tx: self.events_tx.clone(),
            repaint: self.repaint.clone(),
        }
    }

    /// Load the stories and start the periodic refresh.
    pub fn mount(&mut self) {
        if self.timer.is_none() {
            let notifier = self.notifier();
            self.timer = Some(RefreshTimer::start(&self.handle, self.refresh_interval, move || {
                notifier.send(Event::RefreshTick)
            }));
            tracing::info!(interval_secs = self.refresh_interval.as_secs(), "refresh timer started");
        }
        self.refresh();
    }

    /// Stop the timer and abandon everything in flight.
    pub fn unmount(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
            tracing::info!("refresh timer stopped");
        }
        self.story_slot.cancel();
        self.thread_slot.cancel();
    }

    pub fn is_mounted(&self) -> bool {
        self.timer.is_some()
    }

    /// Reload the story list. A load that is still running is cancelled and
    /// its result will never be published.
    pub fn refresh(&mut self) {
        let ticket = self.story_slot.begin();
        let loader = self.story_loader.clone();
        let notifier = self.notifier();
        tracing::debug!(generation = ticket.generation, "loading stories");

        self.handle.spawn(async move {
            let result = run_cancellable(&ticket.token, loader.load()).await;
            if matches!(result, Err(FetchError::Cancelled)) {
                return;
            }
            notifier.send(Event::StoriesLoaded {
                generation: ticket.generation,
                result,
            });
        });
    }

    pub fn set_query(&mut self, query: &str) {
        if self.query == query {
            return;
        }
        self.query = query.to_string();
        self.apply_filter();
    }

    fn apply_filter(&mut self) {
        self.visible = filter_stories(&self.stories, &self.query);
    }

    pub fn open_story(&mut self, story: Story) {
        tracing::info!(story_id = story.id, comments = story.kids.len(), "opening story");
        let has_comments = !story.kids.is_empty();
        self.thread = Some(CommentTree::new(story));

        if has_comments {
            self.load_thread();
        } else {
            self.thread_slot.cancel();
        }
    }

    pub fn close_story(&mut self) {
        self.thread_slot.cancel();
        self.thread = None;
    }

    // Re-resolve the top level of the open thread; nested expansions are dropped
    pub fn refresh_comments(&mut self) {
        let Some(tree) = self.thread.as_mut() else {
            return;
        };
        if tree.story.kids.is_empty() {
            return;
        }
        tree.begin_reload();
        self.load_thread();
    }

    fn load_thread(&mut self) {
        let Some(tree) = self.thread.as_ref() else {
            return;
        };

        let ticket = self.thread_slot.begin();
        let story_id = tree.story.id;
        let kids = tree.story.kids.clone();
        let loader = self.comment_loader.clone();
        let notifier = self.notifier();

        self.handle.spawn(async move {
            let result = run_cancellable(&ticket.token, loader.resolve_thread(&kids)).await;
            if matches!(result, Err(FetchError::Cancelled)) {
                return;
            }
            notifier.send(Event::ThreadLoaded {
                story_id,
                generation: ticket.generation,
                result,
            });
        });
    }

    /// Expand or collapse a comment. Replies are fetched on the first
    /// expansion only; afterwards the cached replies are shown again.
    pub fn toggle_comment(&mut self, comment_id: u64) {
        let Some(tree) = self.thread.as_mut() else {
            return;
        };
        if let Some(kids) = tree.toggle(comment_id) {
            self.load_replies(comment_id, kids);
        }
    }

    // Only a comment whose reply fetch failed is refetched
    pub fn retry_comment(&mut self, comment_id: u64) {
        let Some(tree) = self.thread.as_mut() else {
            return;
        };
        if let Some(kids) = tree.retry(comment_id) {
            self.load_replies(comment_id, kids);
        }
    }

    fn load_replies(&mut self, comment_id: u64, kids: Vec<u64>) {
        let Some(ticket) = self.thread_slot.child() else {
            if let Some(tree) = self.thread.as_mut() {
                tree.fail_node(comment_id, "thread is no longer open".to_string());
            }
            return;
        };

        let loader = self.comment_loader.clone();
        let notifier = self.notifier();
        tracing::debug!(comment_id, replies = kids.len(), "loading replies");

        self.handle.spawn(async move {
            let result = run_cancellable(&ticket.token, loader.resolve(&kids)).await;
            if matches!(result, Err(FetchError::Cancelled)) {
                return;
            }
            notifier.send(Event::RepliesLoaded {
                comment_id,
                generation: ticket.generation,
                result,
            });
        });
    }

    /// Apply finished background work. Returns true when anything visible
    /// changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            changed |= self.handle_event(event);
        }
        changed
    }

    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::StoriesLoaded { generation, result } => {
                if !self.story_slot.finish(generation) {
                    tracing::debug!(generation, "discarding stale story load");
                    return false;
                }
                match result {
                    Ok(stories) => {
                        self.stories = stories;
                        self.apply_filter();
                        self.error = None;
                        self.last_updated = Some(Local::now());
                    }
                    Err(e) => {
                        // keep showing the previous list
                        tracing::warn!("story refresh failed: {e}");
                        self.error = Some(format!("Failed to load stories: {e}"));
                    }
                }
                true
            }
            Event::ThreadLoaded {
                story_id,
                generation,
                result,
            } => {
                if !self.thread_slot.finish(generation) {
                    tracing::debug!(story_id, generation, "discarding stale thread load");
                    return false;
                }
                let Some(tree) = self.thread.as_mut().filter(|tree| tree.story.id == story_id) else {
                    return false;
                };
                match result {
                    Ok(comments) => {
                        tracing::info!(story_id, count = comments.len(), "loaded comments");
                        tree.set_roots(comments);
                    }
                    Err(e) => {
                        tracing::warn!(story_id, "comment load failed: {e}");
                        tree.fail(format!("Failed to load comments: {e}"));
                    }
                }
                true
            }
            Event::RepliesLoaded {
                comment_id,
                generation,
                result,
            } => {
                if !self.thread_slot.is_current(generation) {
                    tracing::debug!(comment_id, generation, "discarding stale replies");
                    return false;
                }
                let Some(tree) = self.thread.as_mut() else {
                    return false;
                };
                match result {
                    Ok(replies) => tree.attach(comment_id, replies),
                    Err(e) => {
                        tracing::warn!(comment_id, "reply load failed: {e}");
                        tree.fail_node(comment_id, format!("Failed to load replies: {e}"));
                        true
                    }
                }
            }
            Event::RefreshTick => {
                // Let a running load finish instead of restarting it every tick
                if self.story_slot.is_pending() {
                    tracing::debug!("skipping timed refresh, a load is already running");
                    return false;
                }
                self.refresh();
                false
            }
        }
    }

    pub fn stories(&self) -> &StoryCollection {
        &self.stories
    }

    pub fn visible_stories(&self) -> &[Story] {
        &self.visible
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_loading(&self) -> bool {
        self.story_slot.is_pending()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn last_updated(&self) -> Option<DateTime<Local>> {
        self.last_updated
    }

    pub fn thread(&self) -> Option<&CommentTree> {
        self.thread.as_ref()
    }
}

impl Drop for ReaderController {
    fn drop(&mut self) {
        self.unmount();
    }
}
