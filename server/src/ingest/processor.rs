//! The Message Processor (spec §4.4): turns one provider message into a
//! single committed unit of store mutation. Owns no long-lived state beyond
//! its collaborators; `process` is the whole public surface.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::AppResult;
use crate::ingest::address::{parse_header, ParsedAddress};
use crate::ingest::blacklist::BlacklistEngine;
use crate::ingest::provider::ProviderMessage;
use crate::ingest::store::{ContactOrEmailDelta, EntityStore, MessageDeltas, NewAddressSeed, StatDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    From,
    To,
    Cc,
}

#[derive(Debug, Clone)]
struct TaggedAddress {
    parsed: ParsedAddress,
    role: Role,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub contacts_created: u32,
    pub companies_created: u32,
    pub domains_created: u32,
    pub emails_created: u32,
}

pub struct MessageProcessor<'a> {
    store: &'a EntityStore,
    blacklist: &'a BlacklistEngine,
}

impl<'a> MessageProcessor<'a> {
    pub fn new(store: &'a EntityStore, blacklist: &'a BlacklistEngine) -> Self {
        Self { store, blacklist }
    }

    pub async fn process(&self, account: &str, self_address: &str, msg: &ProviderMessage) -> AppResult<ProcessResult> {
        let message_date = resolve_message_date(msg);
        let tagged = extract_addresses(msg);
        let sent_by_self = tagged.iter().any(|t| t.role == Role::From && t.parsed.address == self_address);

        let mut kept = Vec::with_capacity(tagged.len());
        for t in tagged {
            if t.parsed.address == self_address {
                continue;
            }
            if self.blacklist.is_blacklisted(&t.parsed.address, &t.parsed.domain).await? {
                continue;
            }
            kept.push(t);
        }

        if kept.is_empty() {
            return Ok(ProcessResult::default());
        }

        let unique_domains = kept.iter().map(|t| t.parsed.domain.clone()).collect::<HashSet<_>>();
        let unique_addresses = kept.iter().map(|t| t.parsed.address.clone()).collect::<HashSet<_>>();

        let existing_domains = self.store.fetch_domains(&unique_domains).await?;
        let existing_emails = self.store.fetch_emails(&unique_addresses).await?;

        let new_domains = unique_domains.iter().filter(|d| !existing_domains.contains_key(*d)).cloned().collect::<Vec<_>>();
        let mut domain_to_company = existing_domains.clone();
        let mut domains_created = 0u32;
        let mut companies_created = 0u32;
        if !new_domains.is_empty() {
            let resolved = self.store.create_companies_and_domains(&new_domains).await?;
            domains_created += new_domains.len() as u32;
            companies_created += new_domains.len() as u32;
            domain_to_company.extend(resolved);
        }

        // (contact_id, stored contact name, stored email observed_name, company_id) —
        // the two names are tracked independently since a shared Contact can
        // diverge from one of its EmailAddresses' own `observed_name` (I8/I9).
        let mut address_to_contact: HashMap<String, (i32, Option<String>, Option<String>, i32)> = existing_emails
            .iter()
            .map(|(addr, e)| (addr.clone(), (e.contact_id, e.contact_name.clone(), e.observed_name.clone(), e.company_id)))
            .collect();

        let new_seeds = kept
            .iter()
            .filter(|t| !address_to_contact.contains_key(&t.parsed.address))
            .map(|t| NewAddressSeed {
                address: t.parsed.address.clone(),
                domain: t.parsed.domain.clone(),
                name: t.parsed.name.clone(),
                company_id: *domain_to_company.get(&t.parsed.domain).expect("domain was just resolved or pre-existing"),
            })
            // two tagged addresses in the same message can share one new address; dedup by address
            .fold(HashMap::<String, NewAddressSeed>::new(), |mut acc, seed| {
                acc.entry(seed.address.clone()).or_insert(seed);
                acc
            })
            .into_values()
            .collect::<Vec<_>>();

        let mut contacts_created = 0u32;
        let mut emails_created = 0u32;
        if !new_seeds.is_empty() {
            let resolved = self.store.create_contacts_and_emails(&new_seeds).await?;
            contacts_created += new_seeds.len() as u32;
            emails_created += new_seeds.len() as u32;
            for seed in &new_seeds {
                let contact_id = *resolved.get(&seed.address).expect("create_contacts_and_emails resolves every seed");
                address_to_contact.insert(seed.address.clone(), (contact_id, seed.name.clone(), seed.name.clone(), seed.company_id));
            }
        }

        let mut companies: HashMap<i32, StatDelta> = HashMap::new();
        let mut domains: HashMap<String, StatDelta> = HashMap::new();
        let mut contacts: HashMap<i32, ContactOrEmailDelta> = HashMap::new();
        let mut emails: HashMap<String, ContactOrEmailDelta> = HashMap::new();

        for t in &kept {
            let (contact_id, stored_contact_name, stored_observed_name, company_id) =
                address_to_contact.get(&t.parsed.address).cloned().expect("every kept address was resolved above");

            let mut delta = StatDelta::default();
            if sent_by_self && t.role == Role::To {
                delta.to += 1;
            }
            if !sent_by_self && t.role == Role::From {
                delta.from += 1;
            }
            if t.role == Role::Cc {
                delta.included += 1;
            }

            companies.entry(company_id).or_default().add(delta);
            domains.entry(t.parsed.domain.clone()).or_default().add(delta);

            let contact_name_upgrade = if stored_contact_name.is_none() { t.parsed.name.clone() } else { None };
            let email_name_upgrade = if stored_observed_name.is_none() { t.parsed.name.clone() } else { None };

            let contact_entry = contacts.entry(contact_id).or_default();
            contact_entry.stat.add(delta);
            if contact_entry.name.is_none() {
                contact_entry.name = contact_name_upgrade;
            }

            let email_entry = emails.entry(t.parsed.address.clone()).or_default();
            email_entry.stat.add(delta);
            if email_entry.name.is_none() {
                email_entry.name = email_name_upgrade;
            }
        }

        let thread_ref = entity::ThreadRef::new(msg.thread_id.clone(), account.to_string(), message_date.to_rfc3339());
        let deltas = MessageDeltas { message_date: message_date.into(), thread_ref, companies, domains, contacts, emails };
        self.store.apply_deltas(&deltas).await?;

        Ok(ProcessResult { contacts_created, companies_created, domains_created, emails_created })
    }
}

/// Parse `Date`, falling back to `internal_timestamp_ms` on failure (spec
/// §4.4 step 1). Accepts both RFC 3339 (`2024-03-01T10:00:00Z`) and RFC 2822
/// (`Fri, 01 Mar 2024 10:00:00 +0000`) since real mail carries the latter.
fn resolve_message_date(msg: &ProviderMessage) -> DateTime<Utc> {
    msg.date_header
        .as_deref()
        .and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .or_else(|_| DateTime::parse_from_rfc2822(raw))
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .unwrap_or_else(|| Utc.timestamp_millis_opt(msg.internal_timestamp_ms).single().unwrap_or_else(Utc::now))
}

fn extract_addresses(msg: &ProviderMessage) -> Vec<TaggedAddress> {
    let mut out = Vec::new();
    out.extend(parse_header(&msg.from_header).into_iter().map(|parsed| TaggedAddress { parsed, role: Role::From }));
    out.extend(parse_header(&msg.to_header).into_iter().map(|parsed| TaggedAddress { parsed, role: Role::To }));
    out.extend(parse_header(&msg.cc_header).into_iter().map(|parsed| TaggedAddress { parsed, role: Role::Cc }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_core::test::setup_conn;

    fn msg(from: &str, to: &str, cc: &str, date: &str, thread_id: &str) -> ProviderMessage {
        ProviderMessage {
            id: "m1".to_string(),
            thread_id: thread_id.to_string(),
            from_header: from.to_string(),
            to_header: to.to_string(),
            cc_header: cc.to_string(),
            date_header: Some(date.to_string()),
            internal_timestamp_ms: 0,
        }
    }

    #[test]
    fn resolves_rfc3339_date() {
        let m = msg("a@b.com", "c@d.com", "", "2024-03-01T10:00:00Z", "t1");
        assert_eq!(resolve_message_date(&m).to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn falls_back_to_internal_timestamp_on_unparseable_date() {
        let mut m = msg("a@b.com", "c@d.com", "", "not a date", "t1");
        m.internal_timestamp_ms = 1_709_289_600_000; // 2024-03-01T10:40:00Z-ish
        let resolved = resolve_message_date(&m);
        assert_eq!(resolved.timestamp_millis(), 1_709_289_600_000);
    }

    #[test]
    fn extracts_and_tags_addresses_by_role() {
        let m = msg(r#""Jane Roe" <jane@beta.io>"#, "me@acme.com", "cc@beta.io", "2024-03-01T10:00:00Z", "t1");
        let tagged = extract_addresses(&m);
        assert_eq!(tagged.len(), 3);
        assert_eq!(tagged[0].role, Role::From);
        assert_eq!(tagged[1].role, Role::To);
        assert_eq!(tagged[2].role, Role::Cc);
    }

    /// Scenario C: the self address is filtered before any blacklist check,
    /// `noreply@mail.promo.biz` is excluded by the transactional regex table
    /// (no DB call), and `friend@spam.io` is excluded by a single domain
    /// lookup that finds it already blacklisted — zero entity mutations.
    #[tokio::test]
    async fn scenario_c_blacklist_exclusion_is_a_pure_noop() {
        use entity::blacklisted_domain;
        use entity::prelude::BlacklistCategory;
        use sea_orm::{DatabaseBackend, MockDatabase};

        let blacklist_conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![blacklisted_domain::Model {
                domain: "spam.io".to_string(),
                category: BlacklistCategory::Manual,
                source: None,
                created_at: chrono::Utc::now().into(),
            }]])
            .into_connection();

        let store = EntityStore::new(setup_conn());
        let blacklist = BlacklistEngine::new(blacklist_conn, &[]);

        let processor = MessageProcessor::new(&store, &blacklist);
        let m = msg("noreply@mail.promo.biz", "me@acme.com, friend@spam.io", "", "2024-03-03T00:00:00Z", "t3");
        let result = processor.process("work", "me@acme.com", &m).await.unwrap();
        assert_eq!(result, ProcessResult::default());
    }
}
