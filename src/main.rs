use actix::SyncArbiter;
use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use wedding_rust_back::services;
use wedding_rust_back::services::db_utils::{get_db_pool, init_db, AppState, DbActor};
use wedding_rust_back::services::email::EmailNotifier;
use wedding_rust_back::types::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let pool = get_db_pool(&config.database_url).expect("failed to build connection pool");
    init_db(&pool, &config).expect("failed to initialize database");

    let db = SyncArbiter::start(5, move || DbActor(pool.clone()));
    let notifier = EmailNotifier::from_config(&config);
    let state = AppState {
        db,
        config: config.clone(),
        notifier,
    };

    tracing::info!(address = %config.bind_address, "wedding API listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(Data::new(state.clone()))
            .configure(services::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
