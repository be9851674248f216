//! The Gmail REST implementation of `MailProviderAdapter` (spec §6),
//! grounded in the teacher's `email/client.rs`: a `reqwest` client gated by
//! a `leaky_bucket::RateLimiter`, `mail-parser` for raw-message decoding,
//! and a `gmail_url!` path-join macro. OAuth refresh follows
//! `routes::auth::exchange_refresh_token`'s form-post shape, simplified to
//! an in-memory cached access token (no encrypted-token-storage layer —
//! out of scope per spec.md §1).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use leaky_bucket::RateLimiter;
use mail_parser::MessageParser;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::error::AppResult;
use crate::server_config::cfg;

use super::{HistoryResult, ListMessagesQuery, ListMessagesResult, MailProviderAdapter, MessageRef, Profile, ProviderMessage};

macro_rules! gmail_url {
    ($($params:expr),*) => {{
        const GMAIL_ENDPOINT: &str = "https://www.googleapis.com/gmail/v1/users/me";
        let parts: Vec<String> = vec![$($params.to_string()),*];
        format!("{}/{}", GMAIL_ENDPOINT, parts.join("/"))
    }};
}

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_FACTOR: u64 = 2;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct GmailProvider {
    http_client: reqwest::Client,
    refresh_token: String,
    rate_limiter: RateLimiter,
    token: RwLock<CachedToken>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct GmailMessageRef {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
}

#[derive(Deserialize, Default)]
struct GmailListMessagesResponse {
    messages: Option<Vec<GmailMessageRef>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "resultSizeEstimate")]
    result_size_estimate: Option<u64>,
}

#[derive(Deserialize)]
struct GmailMessage {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
    raw: Option<String>,
}

#[derive(Deserialize)]
struct GmailProfile {
    #[serde(rename = "historyId")]
    history_id: String,
    #[serde(rename = "emailAddress")]
    email_address: String,
}

#[derive(Deserialize)]
struct GmailHistoryResponse {
    history: Option<Vec<GmailHistoryRecord>>,
    #[serde(rename = "historyId")]
    history_id: String,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct GmailHistoryRecord {
    id: String,
    #[serde(rename = "messagesAdded")]
    messages_added: Option<Vec<GmailHistoryMessageAdded>>,
}

#[derive(Deserialize)]
struct GmailHistoryMessageAdded {
    message: GmailMessageRef,
}

impl GmailProvider {
    pub fn new(http_client: reqwest::Client, refresh_token: String) -> Self {
        Self {
            http_client,
            refresh_token,
            rate_limiter: RateLimiter::builder().initial(5).interval(Duration::from_secs(1)).refill(5).build(),
            // Expired in the past so the first call always refreshes.
            token: RwLock::new(CachedToken { access_token: String::new(), expires_at: DateTime::UNIX_EPOCH.into() }),
        }
    }

    async fn access_token(&self) -> AppResult<String> {
        {
            let cached = self.token.read().await;
            if cached.expires_at > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }
        self.refresh().await
    }

    /// Exchange the long-lived refresh token for a short-lived access token,
    /// grounded in `routes::auth::exchange_refresh_token`'s form-post shape.
    async fn refresh(&self) -> AppResult<String> {
        let resp = self
            .http_client
            .post(&cfg.gmail_config.token_uri)
            .form(&[
                ("client_id", cfg.gmail_config.client_id.as_str()),
                ("client_secret", cfg.gmail_config.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let parsed: TokenResponse = resp.json().await?;

        let mut cached = self.token.write().await;
        cached.access_token = parsed.access_token.clone();
        cached.expires_at = Utc::now() + chrono::Duration::seconds(parsed.expires_in);
        Ok(parsed.access_token)
    }

    /// Retries 429/500/503 with capped exponential backoff (base 1000ms,
    /// factor 2, max 3 retries, spec §6); 404 is surfaced immediately as
    /// `ProviderCursorExpired` via `AppError`'s `From<reqwest::Error>`.
    async fn send_with_retry(&self, build: impl Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        self.rate_limiter.acquire(1).await;
        let mut attempt = 0;
        loop {
            let token = self.access_token().await?;
            let resp = build(&self.http_client, &token).send().await?;
            let status = resp.status();
            if status.is_success() {
                return Ok(resp);
            }
            if attempt >= MAX_RETRIES || !matches!(status.as_u16(), 429 | 500 | 503) {
                return Err(resp.error_for_status().unwrap_err().into());
            }
            let delay_ms = BACKOFF_BASE_MS * BACKOFF_FACTOR.pow(attempt);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            attempt += 1;
        }
    }

    /// Gmail's `format=RAW` returns the full RFC 822 message, base64url
    /// encoded. Decoded headers come back through `mail-parser`'s structured
    /// `Address` type rather than raw text, so `render_address_header`
    /// reconstitutes a header string in the same shape `ingest::address`
    /// expects to parse (quoted name + angle-bracket address).
    fn decode_raw_message(raw: &str) -> AppResult<(String, String, String, Option<String>)> {
        let bytes = base64::engine::general_purpose::URL_SAFE
            .decode(raw)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid base64 in raw message: {e}")))?;
        let parsed = MessageParser::default()
            .parse(&bytes)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("mail-parser failed to parse raw message")))?;

        let from = render_address_header(parsed.from());
        let to = render_address_header(parsed.to());
        let cc = render_address_header(parsed.cc());
        let date = parsed.date().map(|d| d.to_rfc3339());
        Ok((from, to, cc, date))
    }
}

fn render_address_header(addr: Option<&mail_parser::Address>) -> String {
    let Some(addr) = addr else { return String::new() };
    match addr {
        mail_parser::Address::List(list) => list.iter().map(render_one_address).collect::<Vec<_>>().join(", "),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter())
            .map(render_one_address)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn render_one_address(a: &mail_parser::Addr) -> String {
    match (a.name.as_deref(), a.address.as_deref()) {
        (Some(name), Some(address)) => format!("\"{name}\" <{address}>"),
        (None, Some(address)) => address.to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl MailProviderAdapter for GmailProvider {
    async fn list_messages(&self, query: ListMessagesQuery) -> AppResult<ListMessagesResult> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(token) = &query.page_token {
            params.push(("pageToken".to_string(), token.clone()));
        }
        if let Some(max) = query.max_results {
            params.push(("maxResults".to_string(), max.to_string()));
        }
        if let Some(q) = &query.q {
            params.push(("q".to_string(), q.clone()));
        }

        let resp = self
            .send_with_retry(|client, token| client.get(gmail_url!("messages")).query(&params).bearer_auth(token))
            .await?;
        let data: GmailListMessagesResponse = resp.json().await?;

        Ok(ListMessagesResult {
            messages: data
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageRef { id: m.id, thread_id: m.thread_id })
                .collect(),
            next_page_token: data.next_page_token,
            result_size_estimate: data.result_size_estimate.unwrap_or(0),
        })
    }

    async fn get_message(&self, id: &str) -> AppResult<ProviderMessage> {
        let resp = self
            .send_with_retry(|client, token| client.get(gmail_url!("messages", id)).query(&[("format", "RAW")]).bearer_auth(token))
            .await?;
        let data: GmailMessage = resp.json().await?;
        to_provider_message(data)
    }

    async fn batch_get_messages(&self, ids: &[String]) -> AppResult<Vec<ProviderMessage>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.get_message(id).await?);
        }
        Ok(out)
    }

    async fn get_history(&self, start_cursor: &str, page_token: Option<String>) -> AppResult<HistoryResult> {
        let mut params: Vec<(String, String)> = vec![("startHistoryId".to_string(), start_cursor.to_string())];
        if let Some(token) = &page_token {
            params.push(("pageToken".to_string(), token.clone()));
        }

        let resp = self
            .send_with_retry(|client, token| client.get(gmail_url!("history")).query(&params).bearer_auth(token))
            .await?;
        let data: GmailHistoryResponse = resp.json().await?;

        let history = data
            .history
            .unwrap_or_default()
            .into_iter()
            .map(|record| {
                let messages_added = record
                    .messages_added
                    .unwrap_or_default()
                    .into_iter()
                    .map(|added| MessageRef { id: added.message.id, thread_id: added.message.thread_id })
                    .collect::<Vec<_>>();
                (record.id, messages_added)
            })
            .collect::<Vec<_>>();

        // `get_history` only returns message refs cheaply; the Coordinator
        // fetches full bodies via `batch_get_messages` before processing.
        let mut events = Vec::with_capacity(history.len());
        for (id, refs) in history {
            let ids = refs.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
            let messages_added = self.batch_get_messages(&ids).await?;
            events.push(super::HistoryEvent { id, messages_added });
        }

        Ok(HistoryResult { history: events, history_id: data.history_id, next_page_token: data.next_page_token })
    }

    async fn get_profile(&self) -> AppResult<Profile> {
        let resp = self.send_with_retry(|client, token| client.get(gmail_url!("profile")).bearer_auth(token)).await?;
        let data: GmailProfile = resp.json().await?;
        Ok(Profile { history_id: data.history_id, email_address: data.email_address })
    }
}

fn to_provider_message(data: GmailMessage) -> AppResult<ProviderMessage> {
    let raw = data.raw.ok_or_else(|| AppError::Internal(anyhow::anyhow!("message {} has no raw payload", data.id)))?;
    let (from_header, to_header, cc_header, date_header) = GmailProvider::decode_raw_message(&raw)?;
    let internal_timestamp_ms = data.internal_date.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);

    Ok(ProviderMessage { id: data.id, thread_id: data.thread_id, from_header, to_header, cc_header, date_header, internal_timestamp_ms })
}
