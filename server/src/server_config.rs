use config::{Config, ConfigError};
use lazy_static::lazy_static;
use serde::Deserialize;

/// The Google OAuth application secret, shaped exactly like the file Google's
/// console hands out (`client_secret.json`, loaded here as toml so it goes
/// through the same `config` crate as everything else).
#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub client_id: String,
    pub project_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
}

impl GmailConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        builder.try_deserialize()
    }
}

/// One mailbox being ingested. `label` is the opaque account string threaded
/// through `SyncState`/`ProcessedMessage`/`ThreadRef` (spec.md treats it as
/// opaque; this deployment uses `{"work", "personal"}`).
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    pub label: String,
    pub self_address: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    accounts: Vec<AccountConfig>,
    #[serde(default)]
    whitelist_domains: Vec<String>,
    #[serde(default = "default_page_size")]
    batch_page_size: u64,
    #[serde(default = "default_budget_secs")]
    sync_budget_secs: u64,
    #[serde(default = "default_catchup_cron")]
    catchup_cron: String,
    #[serde(default = "default_caught_up_cron")]
    caught_up_cron: String,
}

fn default_page_size() -> u64 {
    100
}

fn default_budget_secs() -> u64 {
    20
}

fn default_catchup_cron() -> String {
    "0 * * * * *".to_string()
}

fn default_caught_up_cron() -> String {
    "0 */15 * * * *".to_string()
}

pub struct ServerConfig {
    pub accounts: Vec<AccountConfig>,
    pub whitelist_domains: Vec<String>,
    pub batch_page_size: u64,
    pub sync_budget_secs: u64,
    pub catchup_cron: String,
    pub caught_up_cron: String,
    pub gmail_config: GmailConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "accounts: {:?}, whitelist_domains: {:?}, batch_page_size: {}, sync_budget_secs: {}",
            self.accounts
                .iter()
                .map(|a| a.label.as_str())
                .collect::<Vec<_>>(),
            self.whitelist_domains,
            self.batch_page_size,
            self.sync_budget_secs,
        )
    }
}

lazy_static! {
    pub static ref CONFIG: ServerConfig = {
        let root = env!("CARGO_MANIFEST_DIR");
        let path = format!("{root}/client_secret.toml");
        let gmail_config = GmailConfig::from_file(&path).expect("client_secret.toml is required");
        let path = format!("{root}/config.toml");
        let server_config: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        ServerConfig {
            accounts: server_config.accounts,
            whitelist_domains: server_config.whitelist_domains,
            batch_page_size: server_config.batch_page_size,
            sync_budget_secs: server_config.sync_budget_secs,
            catchup_cron: server_config.catchup_cron,
            caught_up_cron: server_config.caught_up_cron,
            gmail_config,
        }
    };
}

#[allow(non_upper_case_globals)]
pub use self::CONFIG as cfg;
