use actix::SyncArbiter;
use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{middleware, App, HttpServer};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use auth::TokenService;
use services::db_utils::{bootstrap_schema, get_db_pool, AppState, PgActor};
use services::llm_client::LlmClient;
use settings::Settings;

mod auth;
mod schema;
mod services;
mod settings;
mod types;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn init_pg_db(settings: &Settings) -> std::io::Result<actix::Addr<PgActor>> {
    let workers = settings.pg_pool_workers.max(1);
    let pool = get_db_pool(&settings.pg_database_url, workers as u32 + 1)
        .map_err(|err| std::io::Error::other(err.to_string()))?;

    let mut conn = pool
        .get()
        .map_err(|err| std::io::Error::other(format!("Unable to reach database: {err}")))?;
    bootstrap_schema(&mut conn).map_err(|err| std::io::Error::other(format!("Schema bootstrap failed: {err:?}")))?;
    drop(conn);
    tracing::info!("database schema ready");

    Ok(SyncArbiter::start(workers, move || PgActor(pool.clone())))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    init_logging();

    let settings = Settings::load().map_err(|err| {
        tracing::error!(%err, "invalid configuration");
        std::io::Error::other(err.to_string())
    })?;

    let pg_db = init_pg_db(&settings)?;
    let tokens = Data::new(TokenService::new(
        &settings.api_key,
        &settings.jwt_secret,
        settings.token_expire_minutes,
    ));
    let llm = Data::new(LlmClient::new(
        &settings.llm_base_url,
        settings.groq_api_key.clone(),
        &settings.llm_model,
    ));
    let state = Data::new(AppState { pg_db });

    tracing::info!(address = %settings.bind_address, "starting GoodFoods API");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(tokens.clone())
            .app_data(llm.clone())
            .configure(services::extractor_errors)
            .configure(services::routes)
    })
    .bind(settings.bind_address.as_str())?
    .run()
    .await
}
