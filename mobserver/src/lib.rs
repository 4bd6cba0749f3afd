//! # mobserver - Serveur web de Mobify basé sur Axum
//!
//! Cette crate fournit le serveur HTTP partagé par les différentes briques de
//! Mobify :
//!
//! - [`server`] : le [`Server`] et son [`ServerBuilder`], routes JSON, handlers
//!   avec état, APIs documentées par OpenAPI/Swagger, CORS, arrêt gracieux
//! - [`logs`] : initialisation de `tracing` et exposition des logs récents
//!   (`/log-dump`, `/log-sse`)
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use mobconfig::Config;
//! use mobserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_config("")?;
//!     let mut server = ServerBuilder::from_config(&config).build();
//!     server.init_logging(&LoggingOptions::from_config(&config)).await?;
//!
//!     server.add_route("/", || async {
//!         serde_json::json!({"message": "Mobify API is running"})
//!     }).await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
