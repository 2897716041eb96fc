use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::api;
use crate::catalog::{
    CatalogGateway, http::HttpCatalog, memory::MemoryCatalog, postgres::PgCatalog,
};
use crate::config::{AppConfig, CatalogSource};
use crate::decision::links::LinkTable;
use crate::session::{SessionDeps, SessionStore};

/// Open the catalog named by `catalog.source`.
pub async fn build_gateway(config: &AppConfig) -> anyhow::Result<Arc<dyn CatalogGateway>> {
    let gateway: Arc<dyn CatalogGateway> = match config.catalog.source {
        CatalogSource::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("database.url is not set"))?;
            let catalog = PgCatalog::connect(
                url,
                config.database.max_connections,
                config.database.run_migrations,
            )
            .await?;
            Arc::new(catalog)
        }
        CatalogSource::Http => {
            let base_url = config
                .catalog
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("catalog.base_url is not set"))?;
            let timeout = Duration::from_secs(config.catalog.http_timeout_secs);
            Arc::new(HttpCatalog::new(base_url, timeout)?)
        }
        CatalogSource::Memory => {
            let path = config
                .catalog
                .fixture_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("catalog.fixture_path is not set"))?;
            Arc::new(MemoryCatalog::from_yaml_file(path)?)
        }
    };

    info!(
        name: "catalog.connected",
        source = ?config.catalog.source,
        "Catalog gateway ready"
    );
    Ok(gateway)
}

/// Built-in part links, extended from `links.table_path` when set.
pub fn build_links(config: &AppConfig) -> anyhow::Result<LinkTable> {
    let mut links = LinkTable::builtin();
    if let Some(path) = &config.links.table_path {
        let added = links.extend_from_yaml_file(path)?;
        info!(name: "links.loaded", path = %path, entries = added, "Link table extended");
    }
    Ok(links)
}

/// Wire shared state from its collaborators.
pub fn build_state(
    config: &AppConfig,
    gateway: Arc<dyn CatalogGateway>,
    links: LinkTable,
) -> AppState {
    let sessions = SessionStore::new(SessionDeps {
        gateway: Arc::clone(&gateway),
        links: Arc::new(links),
        support_phone: config.support.phone.clone(),
    });
    AppState { gateway, sessions }
}

/// Router with tracing and a per-request timeout.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    api::router()
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(request_timeout, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let gateway = build_gateway(&config).await?;
    let links = build_links(&config)?;
    let state = build_state(&config, gateway, links);

    let idle_timeout = Duration::from_secs(config.sessions.idle_timeout_secs);
    let sweep = state.sessions.spawn_idle_sweep(idle_timeout);

    let app = build_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    let served = axum::serve(listener, app.into_make_service()).await;
    sweep.abort();
    served?;
    Ok(())
}
