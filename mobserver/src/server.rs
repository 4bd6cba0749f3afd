//! Serveur HTTP partagé par les crates de Mobify
//!
//! Enveloppe un `Router` partagé auquel les crates de Mobify ajoutent leurs
//! routes avant le démarrage. La couche CORS est appliquée au démarrage à
//! partir des origines configurées.

use crate::logs::{LogState, LoggingOptions, init_logging, log_dump, log_sse};
use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use mobconfig::Config;
use serde::Serialize;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::{
    signal,
    sync::{RwLock, oneshot},
    task::JoinHandle,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa_swagger_ui::SwaggerUi;

/// Identité du serveur une fois configuré
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    cors_origins: Vec<String>,
    routes: Arc<RwLock<Router>>,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
    logs: Option<LogState>,
}

impl Server {
    /// `http_port` à `0` demande un port éphémère, lisible ensuite avec
    /// [`Server::local_addr`]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            cors_origins: Vec::new(),
            routes: Arc::new(RwLock::new(Router::new())),
            task: None,
            stop_tx: None,
            local_addr: None,
            logs: None,
        }
    }

    /// Route GET dont la closure produit un corps JSON
    ///
    /// ```rust,no_run
    /// # use mobserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "localhost", 8000);
    /// server.add_route("/", || async {
    ///     serde_json::json!({"message": "Mobify API is running"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let produce = Arc::new(f);
        let handler = move || {
            let produce = Arc::clone(&produce);
            async move { Json(produce().await) }
        };

        self.mount(path, Router::new().route("/", get(handler))).await;
    }

    /// Monte `routes` à la racine (`"/"`) ou sous `path`
    pub async fn add_router(&mut self, path: &str, routes: Router) {
        self.mount(path, routes).await;
    }

    /// Fusionne une API documentée et publie sa documentation
    ///
    /// Les routes de `api_router` sont fusionnées à la racine. La documentation
    /// est servie sur `/swagger-ui/{name}` et la spécification OpenAPI sur
    /// `/api-docs/{name}.json`.
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger = SwaggerUi::new(format!("/swagger-ui/{}", name))
            .url(format!("/api-docs/{}.json", name), openapi);

        let mut routes = self.routes.write().await;
        *routes = std::mem::take(&mut *routes).merge(api_router).merge(swagger);
    }

    async fn mount(&mut self, path: &str, extra: Router) {
        let mut routes = self.routes.write().await;
        let current = std::mem::take(&mut *routes);
        *routes = match path.trim_start_matches('/') {
            "" => current.merge(extra),
            prefix => current.nest(&format!("/{}", prefix), extra),
        };
    }

    /// Origines autorisées par la couche CORS
    pub fn set_cors_origins(&mut self, origins: Vec<String>) {
        self.cors_origins = origins;
    }

    fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        if self.cors_origins.iter().any(|o| o == "*") {
            return layer.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        layer.allow_origin(AllowOrigin::list(origins))
    }

    /// Ouvre l'écoute et sert les routes en tâche de fond
    ///
    /// L'écoute est ouverte avant le retour : une erreur de bind est remontée
    /// à l'appelant. Le serveur s'arrête proprement sur Ctrl+C ou sur
    /// [`Server::stop`]. Retourne l'adresse effectivement écoutée.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.http_port))
            .await
            .with_context(|| format!("cannot bind HTTP port {}", self.http_port))?;
        let local_addr = listener.local_addr()?;

        info!(
            "Server {} running at http://{}:{}",
            self.name,
            self.base_url,
            local_addr.port()
        );

        let app = self.routes.read().await.clone().layer(self.cors_layer());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        self.task = Some(tokio::spawn(async move {
            let served = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal(stop_rx))
                .await;
            if let Err(e) = served {
                error!("HTTP server error: {}", e);
            }
        }));
        self.stop_tx = Some(stop_tx);
        self.local_addr = Some(local_addr);

        Ok(local_addr)
    }

    /// Demande l'arrêt gracieux du serveur
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Bloque jusqu'à l'arrêt du serveur
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("HTTP server task failed: {}", e);
            }
        }
    }

    /// Adresse d'écoute, une fois démarré
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn info(&self) -> ServerInfo {
        let http_port = self.local_addr.map_or(self.http_port, |addr| addr.port());
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port,
        }
    }

    /// Initialise le système de logging et enregistre `/log-sse` et `/log-dump`
    pub async fn init_logging(&mut self, options: &LoggingOptions) -> Result<LogState> {
        let log_state = init_logging(options)?;
        self.register_log_routes(log_state.clone()).await;
        Ok(log_state)
    }

    /// Enregistre les routes de logs sur un état déjà construit
    pub async fn register_log_routes(&mut self, logs: LogState) {
        let routes = Router::new()
            .route("/log-sse", get(log_sse))
            .route("/log-dump", get(log_dump))
            .with_state(logs.clone());
        self.mount("/", routes).await;
        self.logs = Some(logs);
    }

    /// État du buffer de logs, si le logging a été initialisé
    pub fn log_state(&self) -> Option<&LogState> {
        self.logs.as_ref()
    }
}

async fn shutdown_signal(stop_rx: oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C reçu, arrêt gracieux");
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = stop_rx => {},
    }
}

/// Construction d'un [`Server`] depuis la configuration ou pas à pas
pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
    cors_origins: Vec<String>,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            cors_origins: Vec::new(),
        }
    }

    /// Builder initialisé depuis la section `host` de la configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: "Mobify".to_string(),
            base_url: config.get_base_url(),
            http_port: config.get_http_port(),
            cors_origins: config.get_cors_origins(),
        }
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn build(self) -> Server {
        let mut server = Server::new(self.name, self.base_url, self.http_port);
        server.set_cors_origins(self.cors_origins);
        server
    }
}
