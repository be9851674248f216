//! The Entity Store (spec §4.3): batched lookup, insert-if-missing, and
//! relative-delta update over the four stat-bearing entities plus the two
//! auxiliary ones (SyncState, ProcessedMessage). All multi-statement writes
//! for one unit of work go through a single `sea_orm` transaction so a
//! failure mid-batch leaves the store fully-committed or fully-rolled-back.

pub mod threads;

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use entity::prelude::ThreadRef;
use sea_orm::{
    sea_query::{Expr, LockType},
    ConnectionTrait, Condition, DatabaseTransaction, TransactionTrait,
};

use crate::db_core::prelude::*;
use crate::error::AppResult;

pub type Timestamp = sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Debug, Clone)]
pub struct ExistingEmail {
    pub contact_id: i32,
    pub contact_name: Option<String>,
    pub observed_name: Option<String>,
    pub company_id: i32,
}

#[derive(Debug, Clone)]
pub struct NewAddressSeed {
    pub address: String,
    pub domain: String,
    pub name: Option<String>,
    pub company_id: i32,
}

/// Per-entity relative delta for one message's contribution (spec §4.4 step 9).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatDelta {
    pub to: i64,
    pub from: i64,
    pub included: i64,
}

impl StatDelta {
    pub fn add(&mut self, other: StatDelta) {
        self.to += other.to;
        self.from += other.from;
        self.included += other.included;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContactOrEmailDelta {
    pub stat: StatDelta,
    /// The parsed display name from this message, carried so a write-once
    /// name upgrade can run if the stored name is still null (I8/I9).
    pub name: Option<String>,
}

/// The full set of aggregated mutations staged for one message (spec §4.4
/// steps 9-10), applied in `EntityStore::apply_deltas` as one transaction.
#[derive(Debug, Clone)]
pub struct MessageDeltas {
    pub message_date: Timestamp,
    pub thread_ref: ThreadRef,
    pub companies: HashMap<i32, StatDelta>,
    pub domains: HashMap<String, StatDelta>,
    pub contacts: HashMap<i32, ContactOrEmailDelta>,
    pub emails: HashMap<String, ContactOrEmailDelta>,
}

pub struct EntityStore {
    conn: DatabaseConnection,
}

impl EntityStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub async fn fetch_domains(&self, domains: &HashSet<String>) -> AppResult<HashMap<String, i32>> {
        if domains.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = Domain::find()
            .filter(domain::Column::Domain.is_in(domains.iter().cloned()))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|r| (r.domain, r.company_id)).collect())
    }

    pub async fn fetch_emails(&self, addresses: &HashSet<String>) -> AppResult<HashMap<String, ExistingEmail>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(FromQueryResult)]
        struct Row {
            address: String,
            contact_id: i32,
            contact_name: Option<String>,
            observed_name: Option<String>,
            company_id: i32,
        }

        let rows = EmailAddress::find()
            .filter(email_address::Column::Address.is_in(addresses.iter().cloned()))
            .join(JoinType::InnerJoin, email_address::Relation::Contact.def())
            .select_only()
            .column(email_address::Column::Address)
            .column(email_address::Column::ContactId)
            .column(email_address::Column::ObservedName)
            .column_as(contact::Column::Name, "contact_name")
            .column_as(contact::Column::CompanyId, "company_id")
            .into_model::<Row>()
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.address,
                    ExistingEmail {
                        contact_id: r.contact_id,
                        contact_name: r.contact_name,
                        observed_name: r.observed_name,
                        company_id: r.company_id,
                    },
                )
            })
            .collect())
    }

    /// Insert-if-missing for a set of brand-new domains: one Company (named
    /// after the domain, spec I7) plus one primary Domain per domain, in a
    /// single transaction. Returns the resolved `domain -> company_id` map —
    /// on a lost insert-or-ignore race against another account thread, the
    /// winning row's company_id is fetched and returned instead (spec §5).
    pub async fn create_companies_and_domains(&self, new_domains: &[String]) -> AppResult<HashMap<String, i32>> {
        let mut resolved = HashMap::new();
        if new_domains.is_empty() {
            return Ok(resolved);
        }

        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().into();

        for d in new_domains {
            let company = company::ActiveModel {
                id: ActiveValue::NotSet,
                name: ActiveValue::Set(Some(d.clone())),
                emails_to: ActiveValue::Set(0),
                emails_from: ActiveValue::Set(0),
                emails_included: ActiveValue::Set(0),
                meetings_completed: ActiveValue::Set(0),
                meetings_upcoming: ActiveValue::Set(0),
                first_seen: ActiveValue::Set(None),
                last_seen: ActiveValue::Set(None),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            };
            let inserted = Company::insert(company).exec(&txn).await?;
            let candidate_company_id = inserted.last_insert_id;

            let domain_row = domain::ActiveModel {
                domain: ActiveValue::Set(d.clone()),
                company_id: ActiveValue::Set(candidate_company_id),
                is_primary: ActiveValue::Set(true),
                emails_to: ActiveValue::Set(0),
                emails_from: ActiveValue::Set(0),
                emails_included: ActiveValue::Set(0),
                meetings_completed: ActiveValue::Set(0),
                meetings_upcoming: ActiveValue::Set(0),
                first_seen: ActiveValue::Set(None),
                last_seen: ActiveValue::Set(None),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            };
            let result = Domain::insert(domain_row)
                .on_conflict(OnConflict::column(domain::Column::Domain).do_nothing().to_owned())
                .exec_without_returning(&txn)
                .await?;

            let final_company_id = if result == 0 {
                // Lost the race: another account thread already owns this
                // domain. The Company row just inserted above is an orphan
                // (no Domain points at it) — delete it rather than leaving a
                // domain-less Company behind (spec §4.3 "no-ops if a Domain
                // row already exists").
                Company::delete_by_id(candidate_company_id).exec(&txn).await?;
                Domain::find_by_id(d.clone())
                    .one(&txn)
                    .await?
                    .map(|row| row.company_id)
                    .unwrap_or(candidate_company_id)
            } else {
                candidate_company_id
            };
            resolved.insert(d.clone(), final_company_id);
        }

        txn.commit().await?;
        Ok(resolved)
    }

    /// Insert-if-missing for a set of brand-new addresses: one Contact plus
    /// one EmailAddress per address, bound to the caller-supplied company_id.
    /// Same lost-race recovery as `create_companies_and_domains`.
    pub async fn create_contacts_and_emails(&self, seeds: &[NewAddressSeed]) -> AppResult<HashMap<String, i32>> {
        let mut resolved = HashMap::new();
        if seeds.is_empty() {
            return Ok(resolved);
        }

        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().into();

        for seed in seeds {
            let contact = contact::ActiveModel {
                id: ActiveValue::NotSet,
                company_id: ActiveValue::Set(seed.company_id),
                name: ActiveValue::Set(seed.name.clone()),
                recent_threads: ActiveValue::Set(serde_json::json!([])),
                emails_to: ActiveValue::Set(0),
                emails_from: ActiveValue::Set(0),
                emails_included: ActiveValue::Set(0),
                meetings_completed: ActiveValue::Set(0),
                meetings_upcoming: ActiveValue::Set(0),
                first_seen: ActiveValue::Set(None),
                last_seen: ActiveValue::Set(None),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            };
            let inserted = Contact::insert(contact).exec(&txn).await?;
            let candidate_contact_id = inserted.last_insert_id;

            let email_row = email_address::ActiveModel {
                address: ActiveValue::Set(seed.address.clone()),
                contact_id: ActiveValue::Set(candidate_contact_id),
                domain: ActiveValue::Set(seed.domain.clone()),
                observed_name: ActiveValue::Set(seed.name.clone()),
                active: ActiveValue::Set(true),
                recent_threads: ActiveValue::Set(serde_json::json!([])),
                emails_to: ActiveValue::Set(0),
                emails_from: ActiveValue::Set(0),
                emails_included: ActiveValue::Set(0),
                meetings_completed: ActiveValue::Set(0),
                meetings_upcoming: ActiveValue::Set(0),
                first_seen: ActiveValue::Set(None),
                last_seen: ActiveValue::Set(None),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            };
            let result = EmailAddress::insert(email_row)
                .on_conflict(OnConflict::column(email_address::Column::Address).do_nothing().to_owned())
                .exec_without_returning(&txn)
                .await?;

            let final_contact_id = if result == 0 {
                EmailAddress::find_by_id(seed.address.clone())
                    .one(&txn)
                    .await?
                    .map(|row| row.contact_id)
                    .unwrap_or(candidate_contact_id)
            } else {
                candidate_contact_id
            };
            resolved.insert(seed.address.clone(), final_contact_id);
        }

        txn.commit().await?;
        Ok(resolved)
    }

    /// Singular convenience wrapper named exactly as spec §4.3 (the batch
    /// form above is what `MessageProcessor` actually calls per message).
    pub async fn upsert_company_domain(&self, domain: &str) -> AppResult<i32> {
        let mut map = self.create_companies_and_domains(&[domain.to_string()]).await?;
        Ok(map.remove(domain).expect("create_companies_and_domains always resolves every input domain"))
    }

    pub async fn upsert_contact_email(&self, address: &str, domain: &str, name: Option<&str>, company_id: i32) -> AppResult<i32> {
        let seed = NewAddressSeed { address: address.to_string(), domain: domain.to_string(), name: name.map(str::to_string), company_id };
        let mut map = self.create_contacts_and_emails(&[seed]).await?;
        Ok(map.remove(address).expect("create_contacts_and_emails always resolves every input address"))
    }

    /// Apply every aggregated delta for one message as a single transaction
    /// (spec §4.4 step 11): counters via `current + delta`, first/last-seen
    /// via `LEAST/GREATEST(COALESCE(current, ts), ts)`, both of which commute
    /// under concurrent account threads without a read-modify-write race.
    /// The thread-reference fold is read-modify-write and is protected by a
    /// `SELECT ... FOR UPDATE` on the touched row within this same transaction.
    pub async fn apply_deltas(&self, deltas: &MessageDeltas) -> AppResult<()> {
        let txn = self.conn.begin().await?;

        for (company_id, delta) in &deltas.companies {
            apply_stat_update::<company::Entity>(&txn, Condition::all().add(company::Column::Id.eq(*company_id)), *delta, deltas.message_date).await?;
        }
        for (d, delta) in &deltas.domains {
            apply_stat_update::<domain::Entity>(&txn, Condition::all().add(domain::Column::Domain.eq(d.clone())), *delta, deltas.message_date).await?;
        }
        for (contact_id, delta) in &deltas.contacts {
            apply_stat_update::<contact::Entity>(&txn, Condition::all().add(contact::Column::Id.eq(*contact_id)), delta.stat, deltas.message_date).await?;
            fold_contact_thread(&txn, *contact_id, &deltas.thread_ref).await?;
            if let Some(name) = &delta.name {
                set_contact_name_if_null_tx(&txn, *contact_id, name).await?;
            }
        }
        for (address, delta) in &deltas.emails {
            apply_stat_update::<email_address::Entity>(&txn, Condition::all().add(email_address::Column::Address.eq(address.clone())), delta.stat, deltas.message_date).await?;
            fold_email_thread(&txn, address, &deltas.thread_ref).await?;
            if let Some(name) = &delta.name {
                set_email_observed_name_if_null_tx(&txn, address, name).await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn set_contact_name_if_null(&self, contact_id: i32, name: &str) -> AppResult<()> {
        set_contact_name_if_null_tx(&self.conn, contact_id, name).await
    }

    pub async fn set_email_observed_name_if_null(&self, address: &str, name: &str) -> AppResult<()> {
        set_email_observed_name_if_null_tx(&self.conn, address, name).await
    }

    pub async fn has_processed(&self, message_id: &str) -> AppResult<bool> {
        Ok(ProcessedMessage::find_by_id(message_id.to_string()).one(&self.conn).await?.is_some())
    }

    /// Written *before* the mutation batch for the message begins (spec
    /// §4.5 rationale): guarantees forward progress at the cost of
    /// under-counting a message whose commit crashes mid-flight.
    pub async fn mark_processed(&self, message_id: &str, account: &str) -> AppResult<()> {
        ProcessedMessage::insert(processed_message::ActiveModel {
            message_id: ActiveValue::Set(message_id.to_string()),
            account: ActiveValue::Set(account.to_string()),
            recorded_at: ActiveValue::Set(chrono::Utc::now().into()),
        })
        .on_conflict(OnConflict::column(processed_message::Column::MessageId).do_nothing().to_owned())
        .exec_without_returning(&self.conn)
        .await?;
        Ok(())
    }

    pub async fn read_sync_state(&self, account: &str) -> AppResult<Option<sync_state::Model>> {
        Ok(SyncState::find_by_id(account.to_string()).one(&self.conn).await?)
    }

    /// Create the row if absent, starting cold-batch catch-up at
    /// `default_start` (spec §4.5: 2000-01-01). No-ops if already present.
    pub async fn init_sync_state_if_absent(&self, account: &str, default_start: NaiveDate) -> AppResult<sync_state::Model> {
        let now = chrono::Utc::now().into();
        SyncState::insert(sync_state::ActiveModel {
            account: ActiveValue::Set(account.to_string()),
            provider_cursor: ActiveValue::Set(None),
            last_sync_at: ActiveValue::Set(None),
            batch_day: ActiveValue::Set(Some(default_start)),
            page_token: ActiveValue::Set(None),
            page_number: ActiveValue::Set(0),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        })
        .on_conflict(OnConflict::column(sync_state::Column::Account).do_nothing().to_owned())
        .exec_without_returning(&self.conn)
        .await?;

        Ok(self.read_sync_state(account).await?.expect("just inserted or already present"))
    }

    pub async fn write_batch_page(&self, account: &str, batch_day: NaiveDate, page_token: Option<String>, page_number: i32) -> AppResult<()> {
        SyncState::update_many()
            .filter(sync_state::Column::Account.eq(account))
            .col_expr(sync_state::Column::BatchDay, Expr::value(batch_day))
            .col_expr(sync_state::Column::PageToken, Expr::value(page_token))
            .col_expr(sync_state::Column::PageNumber, Expr::value(page_number))
            .col_expr(sync_state::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn write_provider_cursor(&self, account: &str, cursor: &str) -> AppResult<()> {
        SyncState::update_many()
            .filter(sync_state::Column::Account.eq(account))
            .col_expr(sync_state::Column::ProviderCursor, Expr::value(cursor))
            .col_expr(sync_state::Column::LastSyncAt, Expr::value(chrono::Utc::now()))
            .col_expr(sync_state::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}

async fn apply_stat_update<E>(
    txn: &DatabaseTransaction,
    filter: Condition,
    delta: StatDelta,
    message_date: Timestamp,
) -> AppResult<()>
where
    E: sea_orm::EntityTrait,
    E::Column: StatColumns,
{
    E::update_many()
        .filter(filter)
        .col_expr(E::Column::emails_to(), Expr::col(E::Column::emails_to()).add(delta.to))
        .col_expr(E::Column::emails_from(), Expr::col(E::Column::emails_from()).add(delta.from))
        .col_expr(E::Column::emails_included(), Expr::col(E::Column::emails_included()).add(delta.included))
        .col_expr(
            E::Column::first_seen(),
            Expr::cust_with_values("LEAST(COALESCE(first_seen, ?), ?)", [message_date, message_date]),
        )
        .col_expr(
            E::Column::last_seen(),
            Expr::cust_with_values("GREATEST(COALESCE(last_seen, ?), ?)", [message_date, message_date]),
        )
        .col_expr(E::Column::updated_at(), Expr::value(chrono::Utc::now()))
        .exec(txn)
        .await?;
    Ok(())
}

/// The four stat-bearing entities share the same five counter/timestamp
/// columns but sea_orm generates a distinct `Column` enum per entity; this
/// trait lets `apply_stat_update` stay generic over all four instead of
/// writing the same five `col_expr` calls four times.
trait StatColumns {
    fn emails_to() -> Self;
    fn emails_from() -> Self;
    fn emails_included() -> Self;
    fn first_seen() -> Self;
    fn last_seen() -> Self;
    fn updated_at() -> Self;
}

impl StatColumns for company::Column {
    fn emails_to() -> Self { company::Column::EmailsTo }
    fn emails_from() -> Self { company::Column::EmailsFrom }
    fn emails_included() -> Self { company::Column::EmailsIncluded }
    fn first_seen() -> Self { company::Column::FirstSeen }
    fn last_seen() -> Self { company::Column::LastSeen }
    fn updated_at() -> Self { company::Column::UpdatedAt }
}

impl StatColumns for domain::Column {
    fn emails_to() -> Self { domain::Column::EmailsTo }
    fn emails_from() -> Self { domain::Column::EmailsFrom }
    fn emails_included() -> Self { domain::Column::EmailsIncluded }
    fn first_seen() -> Self { domain::Column::FirstSeen }
    fn last_seen() -> Self { domain::Column::LastSeen }
    fn updated_at() -> Self { domain::Column::UpdatedAt }
}

impl StatColumns for contact::Column {
    fn emails_to() -> Self { contact::Column::EmailsTo }
    fn emails_from() -> Self { contact::Column::EmailsFrom }
    fn emails_included() -> Self { contact::Column::EmailsIncluded }
    fn first_seen() -> Self { contact::Column::FirstSeen }
    fn last_seen() -> Self { contact::Column::LastSeen }
    fn updated_at() -> Self { contact::Column::UpdatedAt }
}

impl StatColumns for email_address::Column {
    fn emails_to() -> Self { email_address::Column::EmailsTo }
    fn emails_from() -> Self { email_address::Column::EmailsFrom }
    fn emails_included() -> Self { email_address::Column::EmailsIncluded }
    fn first_seen() -> Self { email_address::Column::FirstSeen }
    fn last_seen() -> Self { email_address::Column::LastSeen }
    fn updated_at() -> Self { email_address::Column::UpdatedAt }
}

async fn fold_contact_thread(txn: &DatabaseTransaction, contact_id: i32, new_ref: &ThreadRef) -> AppResult<()> {
    let row = Contact::find_by_id(contact_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .expect("contact row must exist before its delta is applied");
    let current: Vec<ThreadRef> = serde_json::from_value(row.recent_threads).unwrap_or_default();
    let folded = threads::fold_thread_ref(current, new_ref.clone());

    Contact::update_many()
        .filter(contact::Column::Id.eq(contact_id))
        .col_expr(contact::Column::RecentThreads, Expr::value(serde_json::to_value(folded).expect("ThreadRef is serializable")))
        .exec(txn)
        .await?;
    Ok(())
}

async fn fold_email_thread(txn: &DatabaseTransaction, address: &str, new_ref: &ThreadRef) -> AppResult<()> {
    let row = EmailAddress::find_by_id(address.to_string())
        .lock(LockType::Update)
        .one(txn)
        .await?
        .expect("email_address row must exist before its delta is applied");
    let current: Vec<ThreadRef> = serde_json::from_value(row.recent_threads).unwrap_or_default();
    let folded = threads::fold_thread_ref(current, new_ref.clone());

    EmailAddress::update_many()
        .filter(email_address::Column::Address.eq(address.to_string()))
        .col_expr(email_address::Column::RecentThreads, Expr::value(serde_json::to_value(folded).expect("ThreadRef is serializable")))
        .exec(txn)
        .await?;
    Ok(())
}

async fn set_contact_name_if_null_tx<C: ConnectionTrait>(conn: &C, contact_id: i32, name: &str) -> AppResult<()> {
    Contact::update_many()
        .filter(contact::Column::Id.eq(contact_id))
        .filter(contact::Column::Name.is_null())
        .col_expr(contact::Column::Name, Expr::value(name))
        .exec(conn)
        .await?;
    Ok(())
}

async fn set_email_observed_name_if_null_tx<C: ConnectionTrait>(conn: &C, address: &str, name: &str) -> AppResult<()> {
    EmailAddress::update_many()
        .filter(email_address::Column::Address.eq(address.to_string()))
        .filter(email_address::Column::ObservedName.is_null())
        .col_expr(email_address::Column::ObservedName, Expr::value(name))
        .exec(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_core::test::setup_conn;

    #[tokio::test]
    async fn fetch_domains_and_emails_are_empty_for_empty_input() {
        let store = EntityStore::new(setup_conn());
        assert!(store.fetch_domains(&HashSet::new()).await.unwrap().is_empty());
        assert!(store.fetch_emails(&HashSet::new()).await.unwrap().is_empty());
    }
}
