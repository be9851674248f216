pub mod blacklisted_domain;
pub mod company;
pub mod contact;
pub mod domain;
pub mod email_address;
pub mod prelude;
pub mod processed_message;
pub mod sync_state;
pub mod thread_ref;
