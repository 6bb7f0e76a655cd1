mod config;
mod error;
mod inference;
mod routes;
mod storage;
mod views;

use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use inference::Model;
use routes::configure_routes;
use std::env;
use storage::UploadStore;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    log::info!(
        "Model: {}, uploads: {} (retention: {})",
        config.model_path.display(),
        config.upload_dir.display(),
        config.retention
    );

    let metadata = config
        .load_metadata()
        .map_err(|e| startup_error("Failed to load model metadata", e))?;
    let model = Model::load(&config.model_path, metadata)
        .map_err(|e| startup_error("Model loading failed", e))?;
    log::info!("Model loaded. Start serving...");

    let store = UploadStore::new(&config.upload_dir).with_retention(config.retention);
    store
        .ensure_dir()
        .map_err(|e| startup_error("Failed to create upload directory", e))?;
    log::info!("Upload directory ready: {}", store.upload_dir().display());

    let model = web::Data::new(model);
    let store = web::Data::new(store);

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(model.clone())
            .app_data(store.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
