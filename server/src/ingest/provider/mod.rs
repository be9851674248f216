//! The Mail Provider Adapter contract (spec §6): the ingestion core only
//! ever talks to a mailbox through this trait. `gmail` is the one
//! implementation; anything implementing `MailProviderAdapter` would do.

pub mod gmail;

use async_trait::async_trait;

use crate::error::AppResult;

/// A message as the core needs it: enough header material for
/// `MessageProcessor::process` plus the identifiers the Coordinator tracks.
#[derive(Debug, Clone)]
pub struct ProviderMessage {
    pub id: String,
    pub thread_id: String,
    pub from_header: String,
    pub to_header: String,
    pub cc_header: String,
    /// Raw `Date` header, if present and parseable; `resolve_message_date`
    /// falls back to `internal_timestamp_ms` when this is `None`.
    pub date_header: Option<String>,
    pub internal_timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListMessagesQuery {
    pub page_token: Option<String>,
    pub max_results: Option<u32>,
    pub q: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListMessagesResult {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: u64,
}

#[derive(Debug, Clone)]
pub struct HistoryEvent {
    pub id: String,
    pub messages_added: Vec<ProviderMessage>,
}

#[derive(Debug, Clone)]
pub struct HistoryResult {
    pub history: Vec<HistoryEvent>,
    pub history_id: String,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub history_id: String,
    pub email_address: String,
}

#[async_trait]
pub trait MailProviderAdapter: Send + Sync {
    async fn list_messages(&self, query: ListMessagesQuery) -> AppResult<ListMessagesResult>;
    async fn get_message(&self, id: &str) -> AppResult<ProviderMessage>;
    async fn batch_get_messages(&self, ids: &[String]) -> AppResult<Vec<ProviderMessage>>;
    async fn get_history(&self, start_cursor: &str, page_token: Option<String>) -> AppResult<HistoryResult>;
    async fn get_profile(&self) -> AppResult<Profile>;
}
