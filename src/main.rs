use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod lifecycle;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::service::LeaveService;
use crate::store::Store;
use crate::utils::{email_filter, request_cache::RequestCache, seed};
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    let store = Store::new(pool.clone());

    if config.seed_default_users {
        let created = seed::seed_default_users(&store)
            .await
            .context("Failed to seed default users")?;
        info!(created, "Default users seeded");
    }

    actix_web::rt::spawn(async move {
        if let Err(e) = email_filter::warmup_email_filter(&pool, 100).await {
            error!(error = %e, "Failed to warmup email filter");
        }
    });

    let service = LeaveService::new(
        store.clone(),
        RequestCache::new(config.cache_capacity, config.cache_ttl_secs),
        config.policy(),
    );

    let server_addr = config.server_addr.clone();
    info!(addr = %server_addr, auto_approve_on_scan = config.scan_auto_approve, "Listening");

    HttpServer::new(move || {
        let routes_config = config.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(store.clone()))
            .app_data(Data::new(service.clone()))
            .app_data(Data::new(config.clone()))
            // Configure auth + protected routes with rate limiting
            .configure(move |cfg| routes::configure(cfg, routes_config))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run()
    .await?;

    Ok(())
}
