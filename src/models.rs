use serde::Deserialize;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::FetchError;

// Raw record from the item endpoint. Stories and comments share the endpoint,
// so every field is optional and the shape is decided by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Item {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub by: Option<String>,
    pub time: Option<i64>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub score: Option<i64>,
    pub descendants: Option<i64>,
    pub kids: Option<Vec<u64>>,
    pub deleted: Option<bool>,
    pub dead: Option<bool>,
}

impl Item {
    // Deleted and dead items keep their id but carry no content
    pub fn is_tombstone(&self) -> bool {
        self.deleted.unwrap_or(false) || self.dead.unwrap_or(false)
    }

    pub fn into_story(self) -> Result<Story, FetchError> {
        if self.is_tombstone() {
            return Err(FetchError::NotFound(self.id));
        }

        Ok(Story {
            id: self.id,
            title: self.title.unwrap_or_default(),
            by: self.by.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            score: self.score.unwrap_or_default(),
            descendants: self.descendants.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            kids: self.kids.unwrap_or_default(),
        })
    }

    pub fn into_comment(self) -> Result<Comment, FetchError> {
        if self.is_tombstone() {
            return Err(FetchError::NotFound(self.id));
        }

        Ok(Comment {
            id: self.id,
            by: self.by.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            kids: self.kids.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub by: String,
    // Unix seconds
    pub time: i64,
    pub score: i64,
    // Total comment count for the thread
    pub descendants: i64,
    // Empty for self posts such as Ask HN
    pub url: String,
    pub text: String,
    pub kids: Vec<u64>,
}

impl Story {
    pub fn discussion_url(&self) -> String {
        format!("https://news.ycombinator.com/item?id={}", self.id)
    }

    // Where a click on the title should go
    pub fn link(&self) -> String {
        if self.url.is_empty() {
            self.discussion_url()
        } else {
            self.url.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub by: String,
    // HTML fragment as served by the API
    pub text: String,
    pub time: i64,
    pub kids: Vec<u64>,
}

/// Immutable snapshot of the story list, newest first.
///
/// Cloning is cheap; a refresh publishes a new snapshot instead of touching
/// the one consumers already hold.
#[derive(Debug, Clone, Default)]
pub struct StoryCollection {
    stories: Arc<Vec<Story>>,
}

impl StoryCollection {
    pub fn new(stories: Vec<Story>) -> Self {
        Self {
            stories: Arc::new(stories),
        }
    }
}

impl Deref for StoryCollection {
    type Target = [Story];

    fn deref(&self) -> &Self::Target {
        &self.stories
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildrenState {
    NotLoaded,
    Loading,
    Loaded,
    Failed(String),
}

/// One comment in a thread plus its lazily fetched replies.
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
    pub expanded: bool,
    pub state: ChildrenState,
}

impl CommentNode {
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            children: Vec::new(),
            expanded: false,
            state: ChildrenState::NotLoaded,
        }
    }

    pub fn has_replies(&self) -> bool {
        !self.comment.kids.is_empty()
    }

    /// Flip between collapsed and expanded.
    ///
    /// Returns true when the caller has to fetch the replies: the first
    /// expansion, or an expansion after a failed fetch. Replies that were
    /// already fetched are reused.
    pub fn toggle(&mut self) -> bool {
        if !self.has_replies() {
            return false;
        }

        self.expanded = !self.expanded;
        if self.expanded && matches!(self.state, ChildrenState::NotLoaded | ChildrenState::Failed(_)) {
            self.state = ChildrenState::Loading;
            return true;
        }
        false
    }

    // Children are written once per completed fetch
    pub fn attach(&mut self, replies: Vec<Comment>) {
        self.children = replies.into_iter().map(CommentNode::new).collect();
        self.state = ChildrenState::Loaded;
    }

    pub fn fail(&mut self, message: String) {
        self.state = ChildrenState::Failed(message);
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut CommentNode> {
        if self.comment.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    // A reply fetch that was cancelled will never report back; forget it so
    // the next expansion fetches again
    pub fn reset_pending(&mut self) {
        if self.state == ChildrenState::Loading {
            self.state = ChildrenState::NotLoaded;
            self.expanded = false;
        }
        for child in &mut self.children {
            child.reset_pending();
        }
    }

    // Replies fetched so far, at every depth
    pub fn loaded_descendants(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.loaded_descendants())
            .sum()
    }
}
