// In-memory item source shared by the loader and controller tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;
use crate::hn_client::ItemSource;
use crate::models::Item;

#[derive(Clone)]
enum Entry {
    Present(Item),
    Null,
    Failing,
}

#[derive(Default)]
pub struct FakeSource {
    ids: Mutex<Vec<u64>>,
    ids_delay: Mutex<Option<Duration>>,
    ids_failing: Mutex<bool>,
    entries: Mutex<HashMap<u64, Entry>>,
    delays: Mutex<HashMap<u64, Duration>>,
    fetched: Mutex<Vec<u64>>,
    listings: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub fn story_item(id: u64, time: i64, title: &str) -> Item {
    Item {
        id,
        kind: Some("story".to_string()),
        by: Some("author".to_string()),
        time: Some(time),
        title: Some(title.to_string()),
        score: Some(1),
        descendants: Some(0),
        ..Item::default()
    }
}

pub fn story_with_kids(id: u64, time: i64, kids: Vec<u64>) -> Item {
    Item {
        kids: Some(kids),
        ..story_item(id, time, "thread")
    }
}

pub fn comment_item(id: u64, time: i64, kids: Vec<u64>) -> Item {
    Item {
        id,
        kind: Some("comment".to_string()),
        by: Some("commenter".to_string()),
        time: Some(time),
        text: Some(format!("comment {id}")),
        kids: if kids.is_empty() { None } else { Some(kids) },
        ..Item::default()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(self, ids: Vec<u64>) -> Self {
        self.set_ids(ids);
        self
    }

    pub fn with_item(self, item: Item) -> Self {
        self.set_item(item);
        self
    }

    pub fn with_null(self, id: u64) -> Self {
        self.entries.lock().unwrap().insert(id, Entry::Null);
        self
    }

    pub fn with_deleted(self, id: u64) -> Self {
        self.set_item(Item {
            id,
            deleted: Some(true),
            ..Item::default()
        });
        self
    }

    pub fn with_failure(self, id: u64) -> Self {
        self.set_failure(id);
        self
    }

    pub fn with_delay(self, id: u64, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(id, delay);
        self
    }

    pub fn set_ids(&self, ids: Vec<u64>) {
        *self.ids.lock().unwrap() = ids;
    }

    pub fn set_ids_delay(&self, delay: Option<Duration>) {
        *self.ids_delay.lock().unwrap() = delay;
    }

    pub fn set_ids_failing(&self, failing: bool) {
        *self.ids_failing.lock().unwrap() = failing;
    }

    pub fn set_item(&self, item: Item) {
        self.entries.lock().unwrap().insert(item.id, Entry::Present(item));
    }

    pub fn set_failure(&self, id: u64) {
        self.entries.lock().unwrap().insert(id, Entry::Failing);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetches_of(&self, id: u64) -> usize {
        self.fetched.lock().unwrap().iter().filter(|&&fetched| fetched == id).count()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    async fn new_story_ids(&self) -> Result<Vec<u64>, FetchError> {
        let delay = *self.ids_delay.lock().unwrap();
        let ids = self.ids.lock().unwrap().clone();
        let failing = *self.ids_failing.lock().unwrap();
        // counted once the response for this call is fixed
        self.listings.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(FetchError::Network("listing unavailable".to_string()));
        }
        Ok(ids)
    }

    async fn item(&self, id: u64) -> Result<Item, FetchError> {
        self.fetched.lock().unwrap().push(id);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self.delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let entry = self.entries.lock().unwrap().get(&id).cloned();
        match entry {
            Some(Entry::Present(item)) => Ok(item),
            Some(Entry::Null) | None => Err(FetchError::NotFound(id)),
            Some(Entry::Failing) => Err(FetchError::Network(format!("item {id} unavailable"))),
        }
    }
}
