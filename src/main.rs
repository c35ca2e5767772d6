use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use doctor_ai_api::config::Config;
use doctor_ai_api::inference::OnnxClassifier;
use doctor_ai_api::store::BlobStore;
use doctor_ai_api::{routes, AppState, ModelEndpoint};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Logger already initialized: {err}");
    }

    let config = Config::parse();
    let state = build_state(&config)?;

    let (host, port) = config.bind_addr();
    let origins = config.allowed_origins.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&origins))
            .wrap(middleware::Logger::default())
            .configure(routes(state.clone()))
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    let server = server
        .bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    tracing::info!("Server running at http://{host}:{port}");

    server.run().await?;
    Ok(())
}

/// Loads every configured model; any failure aborts startup.
fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let mut endpoints = Vec::new();
    for spec in config.endpoint_specs() {
        let labels = spec.labels.load()?;
        let classifier = OnnxClassifier::load(&spec.path, spec.shape)?;
        tracing::info!(
            model = spec.name,
            path = %spec.path.display(),
            classes = labels.len(),
            width = spec.shape.width,
            height = spec.shape.height,
            "model loaded"
        );
        endpoints.push(ModelEndpoint {
            name: spec.name.to_string(),
            labels,
            shape: spec.shape,
            classifier: Arc::new(classifier),
        });
    }

    let mut state = AppState::new(endpoints, config.public_url.clone())
        .with_channel_order(config.channel_order)
        .with_max_body_bytes(config.max_body_bytes);
    if let Some(url) = &config.database_url {
        tracing::info!("stored-image lookups enabled at GET /predict");
        state = state.with_store(BlobStore::new(url.clone()));
    }

    Ok(state)
}

fn cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();
    }

    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
}
