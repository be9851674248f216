//! Shared on-wire shape of one entry in a `recent_threads` JSON column.
//!
//! Stored as a plain JSON array on `contact` and `email_address`; callers are
//! expected to parse, fold in a mutation, and serialize back rather than
//! treat the column as a relational table.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    #[serde(rename = "threadId")]
    pub thread_id: String,
    pub account: String,
    pub timestamp: String,
}

impl ThreadRef {
    pub fn new(thread_id: impl Into<String>, account: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            account: account.into(),
            timestamp: timestamp.into(),
        }
    }
}
