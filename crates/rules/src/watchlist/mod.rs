//! Watch-list resolution and list management.
//!
//! Lists are kept sorted by `(priority, registration order)` so resolution
//! is a front-to-back scan that stops at the first list with a live,
//! matching item.

mod matcher;


use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use platewatch_core::{EngineError, ListType};
use platewatch_recognition::normalize;

use crate::schedule::ActivityWindow;
use crate::schema::{WatchList, WatchListItem};

use self::matcher::ItemMatcher;

/// The list (and item) a plate resolved to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListMatch {
    pub list_id: String,
    pub list_name: String,
    pub list_type: ListType,
    pub priority: i32,
    pub item_id: String,
    pub pattern: String,
}

struct CompiledItem {
    item: WatchListItem,
    matcher: ItemMatcher,
}

struct CompiledList {
    seq: u64,
    /// List metadata; `items` is kept empty, see `entries`.
    list: WatchList,
    window: Option<Arc<dyn ActivityWindow>>,
    entries: Vec<CompiledItem>,
}

impl CompiledList {
    fn compile(list: WatchList, seq: u64) -> Result<Self, EngineError> {
        let window = list.schedule.as_ref().map(|s| s.compile()).transpose()?;
        let mut list = list;
        let items = std::mem::take(&mut list.items);
        let mut compiled = Self {
            seq,
            list,
            window,
            entries: Vec::with_capacity(items.len()),
        };
        for item in items {
            compiled.push(item)?;
        }
        Ok(compiled)
    }

    fn push(&mut self, item: WatchListItem) -> Result<(), EngineError> {
        if self.entries.iter().any(|e| e.item.id == item.id) {
            return Err(EngineError::Configuration(format!(
                "duplicate item id '{}' in list '{}'",
                item.id, self.list.id
            )));
        }
        let matcher = ItemMatcher::compile(self.list.match_mode, &item.pattern)?;
        self.entries.push(CompiledItem { item, matcher });
        Ok(())
    }

    fn is_live(&self, channel_id: &str, at: DateTime<Utc>) -> bool {
        if !self.list.is_active {
            return false;
        }
        if !self.list.channel_ids.is_empty() && !self.list.channel_ids.iter().any(|c| c == channel_id) {
            return false;
        }
        self.window.as_ref().map_or(true, |w| w.is_active_at(at))
    }

    fn snapshot(&self) -> WatchList {
        let mut list = self.list.clone();
        list.items = self.entries.iter().map(|e| e.item.clone()).collect();
        list
    }

    fn item_mut(&mut self, item_id: &str) -> Result<&mut CompiledItem, EngineError> {
        let list_id = self.list.id.clone();
        self.entries
            .iter_mut()
            .find(|e| e.item.id == item_id)
            .ok_or_else(|| EngineError::not_found("watch-list item", format!("{list_id}/{item_id}")))
    }
}

#[derive(Default)]
struct ResolverState {
    lists: Vec<CompiledList>,
    next_seq: u64,
}

impl ResolverState {
    fn position(&self, list_id: &str) -> Result<usize, EngineError> {
        self.lists
            .iter()
            .position(|l| l.list.id == list_id)
            .ok_or_else(|| EngineError::not_found("watch-list", list_id))
    }

    fn sort(&mut self) {
        self.lists.sort_by_key(|l| (l.list.priority, l.seq));
    }
}

/// Prioritized allow/deny/info lists, shared across channels.
#[derive(Default)]
pub struct WatchListResolver {
    state: RwLock<ResolverState>,
}

impl WatchListResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a list, or replace one with the same id.
    ///
    /// A replaced list keeps its original registration order for
    /// priority tie-breaks. Invalid patterns or schedules are a
    /// configuration error and leave the resolver unchanged.
    pub fn register_list(&self, list: WatchList) -> Result<(), EngineError> {
        let mut state = self.state.write().expect("watch-list lock poisoned");
        let existing = state.position(&list.id).ok();
        let seq = match existing {
            Some(idx) => state.lists[idx].seq,
            None => state.next_seq,
        };
        let compiled = CompiledList::compile(list, seq)?;
        info!(
            list_id = %compiled.list.id,
            list_type = %compiled.list.list_type,
            priority = compiled.list.priority,
            items = compiled.entries.len(),
            "registered watch-list"
        );
        match existing {
            Some(idx) => state.lists[idx] = compiled,
            None => {
                state.lists.push(compiled);
                state.next_seq += 1;
            }
        }
        state.sort();
        Ok(())
    }

    pub fn remove_list(&self, list_id: &str) -> Result<WatchList, EngineError> {
        let mut state = self.state.write().expect("watch-list lock poisoned");
        let idx = state.position(list_id)?;
        Ok(state.lists.remove(idx).snapshot())
    }

    pub fn add_item(&self, list_id: &str, item: WatchListItem) -> Result<(), EngineError> {
        let mut state = self.state.write().expect("watch-list lock poisoned");
        let idx = state.position(list_id)?;
        debug!(list_id, item_id = %item.id, "adding watch-list item");
        state.lists[idx].push(item)
    }

    pub fn remove_item(&self, list_id: &str, item_id: &str) -> Result<WatchListItem, EngineError> {
        let mut state = self.state.write().expect("watch-list lock poisoned");
        let idx = state.position(list_id)?;
        let list = &mut state.lists[idx];
        let pos = list
            .entries
            .iter()
            .position(|e| e.item.id == item_id)
            .ok_or_else(|| EngineError::not_found("watch-list item", format!("{list_id}/{item_id}")))?;
        Ok(list.entries.remove(pos).item)
    }

    /// Expire an item immediately by setting its `expires_at` to `now`.
    pub fn expire_item(&self, list_id: &str, item_id: &str, now: DateTime<Utc>) -> Result<(), EngineError> {
        let mut state = self.state.write().expect("watch-list lock poisoned");
        let idx = state.position(list_id)?;
        state.lists[idx].item_mut(item_id)?.item.expires_at = Some(now);
        Ok(())
    }

    /// Drop every item expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().expect("watch-list lock poisoned");
        let mut removed = 0;
        for list in state.lists.iter_mut() {
            let ttl = list.list.ttl_seconds;
            let before = list.entries.len();
            list.entries.retain(|e| !e.item.is_expired_at(ttl, now));
            removed += before - list.entries.len();
        }
        if removed > 0 {
            info!(removed, "purged expired watch-list items");
        }
        removed
    }

    /// Snapshot of all lists in evaluation order.
    pub fn lists(&self) -> Vec<WatchList> {
        let state = self.state.read().expect("watch-list lock poisoned");
        state.lists.iter().map(CompiledList::snapshot).collect()
    }

    pub fn list(&self, list_id: &str) -> Option<WatchList> {
        let state = self.state.read().expect("watch-list lock poisoned");
        state
            .lists
            .iter()
            .find(|l| l.list.id == list_id)
            .map(CompiledList::snapshot)
    }

    /// First list (by priority) with a live item matching `plate`.
    ///
    /// `plate` is canonicalized first, so raw and normalized text resolve
    /// the same way. Regex items see the canonical form.
    pub fn resolve(&self, plate: &str, channel_id: &str, at: DateTime<Utc>) -> Option<ListMatch> {
        let canonical = normalize(plate);
        let plate = canonical.as_str();
        let state = self.state.read().expect("watch-list lock poisoned");
        for list in state.lists.iter().filter(|l| l.is_live(channel_id, at)) {
            let ttl = list.list.ttl_seconds;
            let hit = list
                .entries
                .iter()
                .filter(|e| !e.item.is_expired_at(ttl, at))
                .find(|e| e.matcher.matches(plate));
            if let Some(entry) = hit {
                debug!(
                    plate,
                    list_id = %list.list.id,
                    list_type = %list.list.list_type,
                    item_id = %entry.item.id,
                    "watch-list match"
                );
                return Some(ListMatch {
                    list_id: list.list.id.clone(),
                    list_name: list.list.name.clone(),
                    list_type: list.list.list_type,
                    priority: list.list.priority,
                    item_id: entry.item.id.clone(),
                    pattern: entry.item.pattern.clone(),
                });
            }
        }
        None
    }
}
