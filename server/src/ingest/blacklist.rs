//! The blacklist decision engine (spec §4.2): a whitelist short-circuit, an
//! ordered regex table for system/transactional/marketing senders, and a
//! process-lifetime cache of the persisted blacklisted-domain set with a
//! day+count freshness rule (spec §9 "process-wide blacklist cache").

use std::collections::HashSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;

use crate::db_core::prelude::*;
use crate::error::AppResult;

static LOCAL_PART_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(no[._-]?reply|do[._-]?not[._-]?reply|mailer[._-]?daemon|postmaster|bounces?|auto[._-]?reply|automated|notifications?|notify|alerts?|news(letter)?|marketing|promo(tion)?s?|campaigns?|support|info|sales|hello|contact|team|feedback|billing|subscriptions?|updates?|service|help|admin|webmaster)$",
    )
    .expect("LOCAL_PART_RE is a valid regex")
});

static MARKETING_SUBDOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@(email|e|t|m|mail|news|notify|alerts?|promo|offers?|campaign|action|messages?)\.")
        .expect("MARKETING_SUBDOMAIN_RE is a valid regex")
});

static EDU_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.edu$").expect("EDU_RE is a valid regex"));

const PERSONAL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "yahoo.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
];

struct CacheState {
    domains: HashSet<String>,
    day: NaiveDate,
    count: u64,
}

pub struct BlacklistEngine {
    conn: DatabaseConnection,
    whitelist: HashSet<String>,
    cache: RwLock<Option<CacheState>>,
}

impl BlacklistEngine {
    pub fn new(conn: DatabaseConnection, whitelist_domains: &[String]) -> Self {
        Self {
            conn,
            whitelist: whitelist_domains.iter().map(|d| d.to_lowercase()).collect(),
            cache: RwLock::new(None),
        }
    }

    pub async fn is_blacklisted(&self, address: &str, domain: &str) -> AppResult<bool> {
        if self.is_transactional(address, domain) {
            return Ok(true);
        }
        self.is_domain_blacklisted(domain).await
    }

    /// Whitelist short-circuits to `false` unconditionally; otherwise match
    /// against the ordered regex table. All patterns case-insensitive.
    pub fn is_transactional(&self, address: &str, domain: &str) -> bool {
        if self.whitelist.contains(domain) {
            return false;
        }

        let local = address.split('@').next().unwrap_or(address);
        LOCAL_PART_RE.is_match(local) || MARKETING_SUBDOMAIN_RE.is_match(address) || EDU_RE.is_match(domain)
    }

    pub async fn is_domain_blacklisted(&self, domain: &str) -> AppResult<bool> {
        if let Some(cache) = self.cache.read().await.as_ref() {
            return Ok(cache.domains.contains(domain));
        }

        let found = BlacklistedDomain::find_by_id(domain.to_string())
            .one(&self.conn)
            .await?;
        Ok(found.is_some())
    }

    /// Snapshot the persisted set into memory. Idempotent within a day as
    /// long as the persisted row count hasn't moved; a changed count or a
    /// new day forces a reload.
    pub async fn load_cache(&self) -> AppResult<()> {
        let today = chrono::Utc::now().date_naive();
        let count = BlacklistedDomain::find().count(&self.conn).await?;

        {
            let current = self.cache.read().await;
            if let Some(cache) = current.as_ref() {
                if cache.day == today && cache.count == count {
                    return Ok(());
                }
            }
        }

        let domains = BlacklistedDomain::find()
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|row| row.domain)
            .collect::<HashSet<_>>();

        *self.cache.write().await = Some(CacheState { domains, day: today, count });
        Ok(())
    }

    pub async fn add(&self, domain: &str, category: BlacklistCategory, source: Option<&str>) -> AppResult<()> {
        let domain = domain.to_lowercase();
        BlacklistedDomain::insert(blacklisted_domain::ActiveModel {
            domain: ActiveValue::Set(domain.clone()),
            category: ActiveValue::Set(category),
            source: ActiveValue::Set(source.map(|s| s.to_string())),
            created_at: ActiveValue::Set(chrono::Utc::now().into()),
        })
        .on_conflict(
            OnConflict::column(blacklisted_domain::Column::Domain)
                .update_columns([blacklisted_domain::Column::Category, blacklisted_domain::Column::Source])
                .to_owned(),
        )
        .exec(&self.conn)
        .await?;

        if let Some(cache) = self.cache.write().await.as_mut() {
            cache.domains.insert(domain);
            cache.count += 1;
        }
        Ok(())
    }

    pub async fn remove(&self, domain: &str) -> AppResult<()> {
        let domain = domain.to_lowercase();
        BlacklistedDomain::delete_by_id(domain.clone()).exec(&self.conn).await?;

        if let Some(cache) = self.cache.write().await.as_mut() {
            cache.domains.remove(&domain);
        }
        Ok(())
    }

    pub async fn list(&self, category: Option<BlacklistCategory>) -> AppResult<Vec<blacklisted_domain::Model>> {
        let query = BlacklistedDomain::find();
        let query = match category {
            Some(c) => query.filter(blacklisted_domain::Column::Category.eq(c)),
            None => query,
        };
        Ok(query.all(&self.conn).await?)
    }

    pub async fn seed_personal_domains(&self) -> AppResult<()> {
        for domain in PERSONAL_DOMAINS {
            self.add(domain, BlacklistCategory::Personal, Some("seed")).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_core::test::setup_conn;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn engine() -> BlacklistEngine {
        BlacklistEngine::new(setup_conn(), &["partner.com".to_string()])
    }

    #[test]
    fn transactional_local_parts_are_excluded() {
        let engine = engine();
        for addr in [
            "noreply@acme.com",
            "no-reply@acme.com",
            "do.not.reply@acme.com",
            "mailer-daemon@acme.com",
            "postmaster@acme.com",
            "support@acme.com",
            "billing@acme.com",
        ] {
            let domain = addr.split('@').nth(1).unwrap();
            assert!(engine.is_transactional(addr, domain), "{addr} should be transactional");
        }
    }

    #[test]
    fn marketing_subdomains_are_excluded() {
        let engine = engine();
        assert!(engine.is_transactional("anything@mail.promo.biz", "mail.promo.biz"));
        assert!(engine.is_transactional("x@e.shop.com", "e.shop.com"));
    }

    #[test]
    fn edu_domains_are_excluded() {
        let engine = engine();
        assert!(engine.is_transactional("prof@state.edu", "state.edu"));
    }

    #[test]
    fn whitelist_overrides_every_pattern() {
        let engine = engine();
        // partner.com is whitelisted even though "support@" would otherwise match.
        assert!(!engine.is_transactional("support@partner.com", "partner.com"));
    }

    #[test]
    fn ordinary_personal_addresses_are_not_transactional() {
        let engine = engine();
        assert!(!engine.is_transactional("jane@beta.io", "beta.io"));
    }

    #[tokio::test]
    async fn domain_blacklist_checks_cache_when_populated() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<blacklisted_domain::Model>::new()])
            .append_query_results([vec![blacklisted_domain::Model {
                domain: "spam.io".to_string(),
                category: BlacklistCategory::Manual,
                source: None,
                created_at: chrono::Utc::now().into(),
            }]])
            .into_connection();
        let engine = BlacklistEngine::new(conn, &[]);

        engine.load_cache().await.unwrap();
        assert!(engine.is_domain_blacklisted("spam.io").await.unwrap());
    }

    #[tokio::test]
    async fn add_updates_cache_in_place_when_populated() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<blacklisted_domain::Model>::new()])
            .append_query_results([Vec::<blacklisted_domain::Model>::new()])
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .into_connection();
        let engine = BlacklistEngine::new(conn, &[]);

        engine.load_cache().await.unwrap();
        engine.add("spam.io", BlacklistCategory::Manual, Some("admin")).await.unwrap();
        assert!(engine.is_domain_blacklisted("spam.io").await.unwrap());
    }
}
