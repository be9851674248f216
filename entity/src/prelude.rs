pub use super::blacklisted_domain::{BlacklistCategory, Entity as BlacklistedDomain};
pub use super::company::Entity as Company;
pub use super::contact::Entity as Contact;
pub use super::domain::Entity as Domain;
pub use super::email_address::Entity as EmailAddress;
pub use super::processed_message::Entity as ProcessedMessage;
pub use super::sync_state::Entity as SyncState;
pub use super::thread_ref::ThreadRef;
