use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::{SlackConfig, normalize_base_url};
use crate::error::{Result, SyncError};
use crate::models::EntryKey;

use super::wire::{Envelope, ReactionsGetResponse, RepliesResponse, SearchResponse};
use super::{LogEntry, MessageLog, SearchPage, SearchQuery};

#[derive(Clone)]
pub struct SlackClient {
    base_url: String,
    page_size: u32,
    http: Client,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    pub fn new(config: &SlackConfig, page_size: u32) -> Result<Self> {
        let token = config.token.as_deref().ok_or_else(|| {
            SyncError::Validation("slack token is not configured (SCORESYNC_SLACK_TOKEN)".to_string())
        })?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SyncError::Validation(format!("invalid slack token: {e}")))?;
        headers.insert(AUTHORIZATION, value);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            page_size: page_size.max(1),
            http,
        })
    }

    fn get<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        let url = Url::parse_with_params(&format!("{}/{method}", self.base_url), params)
            .map_err(|e| SyncError::Validation(format!("invalid slack url for {method}: {e}")))?;
        let resp = self.http.get(url).send()?.error_for_status()?;
        Ok(resp.json::<T>()?)
    }

    fn post_marker(&self, method: &str, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()> {
        let url = format!("{}/{method}", self.base_url);
        let body = json!({
            "channel": channel_id,
            "timestamp": key.as_str(),
            "name": icon,
        });
        let envelope = self
            .http
            .post(url)
            .json(&body)
            .send()?
            .error_for_status()?
            .json::<Envelope>()?;
        envelope.check_marker_write(method)
    }
}

impl MessageLog for SlackClient {
    fn search_page(&self, query: &SearchQuery, page: u32) -> Result<SearchPage> {
        let response: SearchResponse = self.get(
            "search.messages",
            &[
                ("query", query.to_query_string()),
                ("sort", "timestamp".to_string()),
                ("sort_dir", "asc".to_string()),
                ("count", self.page_size.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        response.envelope.check("search.messages")?;
        let Some(messages) = response.messages else {
            return Ok(SearchPage {
                entries: Vec::new(),
                pages: 0,
            });
        };
        let entries = messages
            .matches
            .into_iter()
            .map(|matched| matched.into_entry())
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchPage {
            entries,
            pages: messages.paging.pages,
        })
    }

    fn resolve_channel(&self, name: &str) -> Result<Option<String>> {
        let response: SearchResponse = self.get(
            "search.messages",
            &[
                ("query", format!("in:{}", name.trim_start_matches('#'))),
                ("count", "1".to_string()),
            ],
        )?;
        response.channel_named(name)
    }

    fn thread_replies(&self, channel_id: &str, key: &EntryKey) -> Result<Vec<LogEntry>> {
        let response: RepliesResponse = self.get(
            "conversations.replies",
            &[
                ("channel", channel_id.to_string()),
                ("ts", key.as_str().to_string()),
            ],
        )?;
        response.envelope.check("conversations.replies")?;
        response
            .messages
            .into_iter()
            .map(|message| message.into_entry(channel_id))
            .collect()
    }

    fn markers(&self, channel_id: &str, key: &EntryKey) -> Result<Vec<String>> {
        let response: ReactionsGetResponse = self.get(
            "reactions.get",
            &[
                ("channel", channel_id.to_string()),
                ("timestamp", key.as_str().to_string()),
            ],
        )?;
        response.envelope.check("reactions.get")?;
        Ok(response
            .message
            .map(|message| message.reactions.into_iter().map(|r| r.name).collect())
            .unwrap_or_default())
    }

    fn add_marker(&self, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()> {
        self.post_marker("reactions.add", channel_id, icon, key)
    }

    fn remove_marker(&self, channel_id: &str, icon: &str, key: &EntryKey) -> Result<()> {
        self.post_marker("reactions.remove", channel_id, icon, key)
    }
}
