//! Stateful in-memory stand-in for the platform, used by engine and coordinator tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::arc::{ApiError, ContentApi, SearchQuery, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Search,
    Circulations,
    RemoveCirculation,
    HasPublished,
    Unpublish,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub story_id: String,
}

#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    circulations: Mutex<HashMap<String, Vec<String>>>,
    published: Mutex<HashSet<String>>,
    deleted: Mutex<HashSet<String>>,
    scripted: Mutex<HashMap<(String, Op), VecDeque<ApiError>>>,
    pages: Mutex<VecDeque<SearchResponse>>,
}

impl FakeApi {
    /// A story circulating on `websites` with a published revision.
    pub fn with_published(self, story_id: &str, websites: &[&str]) -> Self {
        self.circulations.lock().unwrap().insert(
            story_id.to_string(),
            websites.iter().map(|w| w.to_string()).collect(),
        );
        self.published.lock().unwrap().insert(story_id.to_string());
        self
    }

    /// A story that no longer exists on the platform.
    pub fn with_deleted(self, story_id: &str) -> Self {
        self.deleted.lock().unwrap().insert(story_id.to_string());
        self
    }

    /// Queue a failure for the next call of `op` on `story_id`.
    pub fn fail(self, story_id: &str, op: Op, err: ApiError) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .entry((story_id.to_string(), op))
            .or_default()
            .push_back(err);
        self
    }

    /// Queue a search page; pages are served in order.
    pub fn with_page(self, page: SearchResponse) -> Self {
        self.pages.lock().unwrap().push_back(page);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops_for(&self, story_id: &str) -> Vec<Op> {
        self.calls()
            .into_iter()
            .filter(|c| c.story_id == story_id)
            .map(|c| c.op)
            .collect()
    }

    pub fn touched(&self, story_id: &str) -> bool {
        !self.ops_for(story_id).is_empty()
    }

    pub fn is_deleted(&self, story_id: &str) -> bool {
        self.deleted.lock().unwrap().contains(story_id)
    }

    fn enter(&self, story_id: &str, op: Op) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(Call {
            op,
            story_id: story_id.to_string(),
        });
        let mut scripted = self.scripted.lock().unwrap();
        match scripted.get_mut(&(story_id.to_string(), op)).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn exists(&self, story_id: &str) -> Result<(), ApiError> {
        if self.deleted.lock().unwrap().contains(story_id) {
            return Err(ApiError::NotFound(format!("story {story_id}")));
        }
        Ok(())
    }
}

impl ContentApi for FakeApi {
    async fn search_page(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        self.enter(&query.q, Op::Search)?;
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn circulations(&self, story_id: &str) -> Result<Vec<String>, ApiError> {
        self.enter(story_id, Op::Circulations)?;
        self.exists(story_id)?;
        Ok(self
            .circulations
            .lock()
            .unwrap()
            .get(story_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_circulation(&self, story_id: &str, website_id: &str) -> Result<(), ApiError> {
        self.enter(story_id, Op::RemoveCirculation)?;
        self.exists(story_id)?;
        let mut circulations = self.circulations.lock().unwrap();
        let list = circulations.entry(story_id.to_string()).or_default();
        let before = list.len();
        list.retain(|w| w != website_id);
        if list.len() == before {
            return Err(ApiError::NotFound(format!("circulation {website_id}")));
        }
        Ok(())
    }

    async fn has_published_revision(&self, story_id: &str) -> Result<bool, ApiError> {
        self.enter(story_id, Op::HasPublished)?;
        Ok(self.published.lock().unwrap().contains(story_id))
    }

    async fn unpublish(&self, story_id: &str) -> Result<(), ApiError> {
        self.enter(story_id, Op::Unpublish)?;
        if !self.published.lock().unwrap().remove(story_id) {
            return Err(ApiError::NotFound(format!("published revision of {story_id}")));
        }
        Ok(())
    }

    async fn delete(&self, story_id: &str) -> Result<(), ApiError> {
        self.enter(story_id, Op::Delete)?;
        self.exists(story_id)?;
        self.deleted.lock().unwrap().insert(story_id.to_string());
        Ok(())
    }
}
