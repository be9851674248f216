pub mod constants;

pub use constants::AccessScopes;

/// Minimum set of OAuth scopes the ingestion coordinator's Gmail adapter
/// needs: reading message/history lists plus the account profile (for
/// `get_profile`'s `historyId`). Labeling/compose/send scopes are never
/// requested — the ingestion core only ever reads mail.
pub const REQUIRED_SCOPES: [AccessScopes; 2] = [AccessScopes::Readonly, AccessScopes::Metadata];
