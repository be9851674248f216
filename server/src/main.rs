mod db_core;
mod error;
mod ingest;
mod request_tracing;
mod server_config;
mod status;

use std::{env, net::SocketAddr, sync::Arc};

use ingest::tasks::IngestRuntime;
use mimalloc::MiMalloc;
use migration::MigratorTrait;
use request_tracing::trace_with_request_id_layer;
use sea_orm::{ConnectOptions, Database};
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env::set_var("RUST_LOG", env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_env("RUST_LOG"))
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);
    let conn = Database::connect(db_options).await.expect("Database connection failed");

    migration::Migrator::up(&conn, None).await?;

    validate_gmail_scopes();

    let http_client = reqwest::Client::builder().build()?;
    let cfg = &*server_config::cfg;

    let runtime = Arc::new(IngestRuntime::new(
        conn,
        cfg.accounts.clone(),
        &cfg.whitelist_domains,
        http_client,
        cfg.batch_page_size,
        cfg.sync_budget_secs,
    ));

    let router = status::router().layer(trace_with_request_id_layer());

    let mut scheduler = JobScheduler::new().await.expect("Failed to create scheduler");

    {
        let catchup_runtime = Arc::clone(&runtime);
        scheduler
            .add(Job::new_async(cfg.catchup_cron.as_str(), move |uuid, _l| {
                let runtime = Arc::clone(&catchup_runtime);
                Box::pin(async move {
                    if runtime.all_caught_up() {
                        return;
                    }
                    tracing::info!("running catch-up ingestion pass {}", uuid);
                    runtime.run_sync_pass().await;
                })
            })?)
            .await?;

        let caught_up_runtime = Arc::clone(&runtime);
        scheduler
            .add(Job::new_async(cfg.caught_up_cron.as_str(), move |uuid, _l| {
                let runtime = Arc::clone(&caught_up_runtime);
                Box::pin(async move {
                    if !runtime.all_caught_up() {
                        return;
                    }
                    tracing::info!("running caught-up ingestion pass {}", uuid);
                    runtime.run_sync_pass().await;
                })
            })?)
            .await?;
    }

    scheduler.shutdown_on_ctrl_c();
    scheduler.set_shutdown_handler(Box::new(move || {
        Box::pin(async move {
            tracing::info!("shutting down scheduler");
        })
    }));

    match scheduler.start().await {
        Ok(_) => tracing::info!("scheduler started"),
        Err(e) => tracing::error!("failed to start scheduler: {:?}", e),
    }

    let shutdown_handle = tokio::spawn(async move {
        if env::var("NO_SHUTDOWN").unwrap_or_else(|_| "false".to_string()) == "true" {
            return;
        }
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
        tracing::info!("received ctrl-c, shutting down");
        std::process::exit(0);
    });

    let _ = tokio::join!(run_server(router), shutdown_handle);

    Ok(())
}

/// Fails fast at startup rather than silently under-scoping a sync later:
/// the Gmail adapter only ever reads mail, so the configured app scopes must
/// cover at least readonly + metadata (spec §6).
fn validate_gmail_scopes() {
    use lib_email_clients::gmail::{AccessScopes, REQUIRED_SCOPES};
    use std::str::FromStr;

    let granted: Vec<AccessScopes> =
        server_config::cfg.gmail_config.scopes.iter().filter_map(|s| AccessScopes::from_str(s).ok()).collect();

    for required in REQUIRED_SCOPES {
        if !granted.contains(&required) {
            panic!("client_secret.toml is missing required Gmail scope: {required:?}");
        }
    }
}

fn run_server(router: axum::Router) -> JoinHandle<()> {
    tokio::spawn(async move {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>().expect("PORT must be a valid u16")));
        tracing::info!("listening on {addr}");
        let listener = TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, router).await.unwrap();
    })
}
