use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};

/// A mock connection with no queued results, for tests that only need a
/// connection to exist (e.g. constructing a store/engine/processor) and
/// stage their own `append_query_results`/`append_exec_results` per case.
pub fn setup_conn() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}
