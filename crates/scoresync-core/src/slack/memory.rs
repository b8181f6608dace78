use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::error::{Result, SyncError};
use crate::models::EntryKey;

use super::{LogEntry, MessageLog, SearchPage, SearchQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MarkerWrite {
    Add { key: String, icon: String },
    Remove { key: String, icon: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    messages: BTreeMap<EntryKey, LogEntry>,
    failing_pages: BTreeSet<u32>,
    failing_replies: BTreeSet<EntryKey>,
    failing_marker_writes: BTreeSet<EntryKey>,
    writes: Vec<MarkerWrite>,
    resolutions: usize,
}

/// Message log held in memory, used by the cycle tests.
#[derive(Debug)]
pub(crate) struct MemoryLog {
    channel_id: String,
    channel_name: Option<String>,
    page_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryLog {
    pub(crate) fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_name: None,
            page_size: 2,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// A log whose channel can be looked up by `name`.
    pub(crate) fn named(channel_id: &str, name: &str) -> Self {
        Self {
            channel_name: Some(name.to_string()),
            ..Self::new(channel_id)
        }
    }

    fn check_channel(&self, channel_id: &str) -> Result<()> {
        if channel_id == self.channel_id {
            return Ok(());
        }
        Err(SyncError::MessageLog(format!("channel_not_found: {channel_id}")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory log lock")
    }

    pub(crate) fn post(&self, key: &str, sender: &str, text: &str) {
        self.put(key, sender, text, None);
    }

    pub(crate) fn reply(&self, thread: &str, key: &str, sender: &str, text: &str) {
        self.put(key, sender, text, Some(thread));
    }

    fn put(&self, key: &str, sender: &str, text: &str, thread: Option<&str>) {
        let key = EntryKey::parse(key).expect("key");
        let entry = LogEntry {
            key: key.clone(),
            text: text.to_string(),
            sender_id: sender.to_string(),
            channel_id: self.channel_id.clone(),
            thread_key: thread.map(|thread| EntryKey::parse(thread).expect("thread key")),
            edited_at: None,
            markers: Vec::new(),
        };
        self.lock().messages.insert(key, entry);
    }

    pub(crate) fn edit(&self, key: &str, text: &str, edited_at: &str) {
        let key = EntryKey::parse(key).expect("key");
        let mut state = self.lock();
        let entry = state.messages.get_mut(&key).expect("message exists");
        entry.text = text.to_string();
        entry.edited_at = Some(EntryKey::parse(edited_at).expect("edited key"));
    }

    pub(crate) fn delete(&self, key: &str) {
        let key = EntryKey::parse(key).expect("key");
        self.lock().messages.remove(&key);
    }

    pub(crate) fn set_markers(&self, key: &str, icons: &[&str]) {
        let key = EntryKey::parse(key).expect("key");
        let mut state = self.lock();
        let entry = state.messages.get_mut(&key).expect("message exists");
        entry.markers = icons.iter().map(ToString::to_string).collect();
    }

    pub(crate) fn markers_of(&self, key: &str) -> Vec<String> {
        let key = EntryKey::parse(key).expect("key");
        self.lock()
            .messages
            .get(&key)
            .map(|entry| entry.markers.clone())
            .unwrap_or_default()
    }

    pub(crate) fn fail_page(&self, page: u32) {
        self.lock().failing_pages.insert(page);
    }

    pub(crate) fn fail_replies(&self, key: &str) {
        let key = EntryKey::parse(key).expect("key");
        self.lock().failing_replies.insert(key);
    }

    pub(crate) fn fail_marker_writes(&self, key: &str) {
        let key = EntryKey::parse(key).expect("key");
        self.lock().failing_marker_writes.insert(key);
    }

    pub(crate) fn writes(&self) -> Vec<MarkerWrite> {
        self.lock().writes.clone()
    }

    pub(crate) fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub(crate) fn resolutions(&self) -> usize {
        self.lock().resolutions
    }
}

impl MessageLog for MemoryLog {
    fn search_page(&self, query: &SearchQuery, page: u32) -> Result<SearchPage> {
        let state = self.lock();
        if state.failing_pages.contains(&page) {
            return Err(SyncError::MessageLog(format!("search page {page} unavailable")));
        }
        let matches = state
            .messages
            .values()
            .filter(|entry| entry.text.contains(&query.keyword))
            .map(|entry| LogEntry {
                thread_key: None,
                edited_at: None,
                markers: Vec::new(),
                ..entry.clone()
            })
            .collect::<Vec<_>>();
        let pages = matches.len().div_ceil(self.page_size) as u32;
        let start = (page.saturating_sub(1) as usize) * self.page_size;
        let entries = matches
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect();
        Ok(SearchPage { entries, pages })
    }

    fn thread_replies(&self, _channel_id: &str, key: &EntryKey) -> Result<Vec<LogEntry>> {
        let state = self.lock();
        if state.failing_replies.contains(key) {
            return Err(SyncError::MessageLog(format!("replies for {key} unavailable")));
        }
        let Some(head) = state.messages.get(key) else {
            return Err(SyncError::MessageLog("thread_not_found".to_string()));
        };
        let mut out = vec![head.clone()];
        out.extend(
            state
                .messages
                .values()
                .filter(|entry| entry.thread_key.as_ref() == Some(key) && &entry.key != key)
                .cloned(),
        );
        Ok(out)
    }

    fn markers(&self, channel_id: &str, key: &EntryKey) -> Result<Vec<String>> {
        self.check_channel(channel_id)?;
        Ok(self
            .lock()
            .messages
            .get(key)
            .map(|entry| entry.markers.clone())
            .unwrap_or_default())
    }

    fn add_marker(&self, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()> {
        self.check_channel(channel_id)?;
        let mut state = self.lock();
        if state.failing_marker_writes.contains(key) {
            return Err(SyncError::MessageLog(format!("reactions.add failed for {key}")));
        }
        state.writes.push(MarkerWrite::Add {
            key: key.to_string(),
            icon: icon.to_string(),
        });
        if let Some(entry) = state.messages.get_mut(key)
            && !entry.markers.iter().any(|marker| marker == icon)
        {
            entry.markers.push(icon.to_string());
        }
        Ok(())
    }

    fn remove_marker(&self, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()> {
        self.check_channel(channel_id)?;
        let mut state = self.lock();
        if state.failing_marker_writes.contains(key) {
            return Err(SyncError::MessageLog(format!("reactions.remove failed for {key}")));
        }
        state.writes.push(MarkerWrite::Remove {
            key: key.to_string(),
            icon: icon.to_string(),
        });
        if let Some(entry) = state.messages.get_mut(key) {
            entry.markers.retain(|marker| marker != icon);
        }
        Ok(())
    }

    fn resolve_channel(&self, name: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.resolutions += 1;
        Ok((self.channel_name.as_deref() == Some(name.trim_start_matches('#')))
            .then(|| self.channel_id.clone()))
    }
}
