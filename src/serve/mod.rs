pub mod error;
pub mod handlers;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};

use crate::model::bundle::ModelBundle;

/// Shared server state: the bundle path plus the currently loaded bundle.
///
/// The bundle sits behind `RwLock<Option<Arc<_>>>` so `/reload` swaps it in
/// one pointer write while in-flight requests keep their own `Arc`.
pub struct AppState {
    bundle_path: PathBuf,
    bundle: RwLock<Option<Arc<ModelBundle>>>,
}

impl AppState {
    pub fn new(bundle_path: PathBuf) -> Self {
        Self { bundle_path, bundle: RwLock::new(None) }
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    /// The currently loaded bundle, if any.
    pub fn current(&self) -> Option<Arc<ModelBundle>> {
        self.bundle.read().expect("bundle lock poisoned").clone()
    }

    /// Load the bundle from disk and swap it in. On failure the previous
    /// bundle stays live.
    pub fn reload(&self) -> Result<Arc<ModelBundle>> {
        let loaded = Arc::new(
            ModelBundle::load(&self.bundle_path)
                .with_context(|| format!("load bundle {}", self.bundle_path.display()))?,
        );
        *self.bundle.write().expect("bundle lock poisoned") = Some(loaded.clone());
        Ok(loaded)
    }
}

/// Run the prediction API until interrupted.
///
/// A missing or unreadable bundle is not fatal at startup: the server comes
/// up with `model_loaded: false`, prediction returns 503, and a later
/// `POST /reload` can bring the model online.
pub fn run(bundle_path: PathBuf, host: &str, port: u16) -> Result<()> {
    let state = web::Data::new(AppState::new(bundle_path));
    match state.reload() {
        Ok(bundle) => log::info!("Serving {} bundle", bundle.model_name),
        Err(e) => log::warn!("Starting without a model: {e:#}"),
    }

    log::info!("Listening on {host}:{port}");
    let host = host.to_string();
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .wrap(middleware::Logger::default())
                .app_data(state.clone())
                .route("/predict", web::post().to(handlers::predict))
                .route("/health", web::get().to(handlers::health))
                .route("/model-info", web::get().to(handlers::model_info))
                .route("/reload", web::post().to(handlers::reload))
        })
        .bind((host.as_str(), port))
        .with_context(|| format!("bind {host}:{port}"))?
        .run()
        .await
        .context("server terminated with an error")
    })
}
