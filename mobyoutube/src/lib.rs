//! # mobyoutube - Résolution des pistes YouTube pour Mobify
//!
//! Transforme un identifiant de vidéo en URL de diffusion audio, met les
//! résolutions en cache et importe des playlists entières.
//!
//! ## Architecture
//!
//! - [`Extractor`] : frontière bloquante avec le mécanisme d'extraction
//!   ([`YtDlpExtractor`] pilote `yt-dlp`)
//! - [`WorkerPool`] : pool borné qui exécute l'extracteur hors du runtime async
//! - [`Resolver`] : `resolve`, `search`, `playlist` à travers le pool
//! - [`ResolutionCache`] : cache TTL avec coalescence des résolutions concurrentes
//! - [`YoutubeClient`] : façade résolveur + cache, partagée par tout le serveur
//! - [`BatchResolver`] : résolution d'un lot de pistes sous plafond de concurrence
//! - [`ImportSink`] : frontière avec la persistance des playlists importées
//!
//! Avec la feature `server` (par défaut), le module `api_rest` expose les
//! endpoints HTTP et [`YoutubeServerExt`] les enregistre sur un
//! `mobserver::Server`.
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use mobconfig::Config;
//! use mobyoutube::{MediaIdentifier, YoutubeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_config("")?;
//!     let client = YoutubeClient::from_config(&config);
//!
//!     let id = MediaIdentifier::parse("dQw4w9WgXcQ")?;
//!     let stream = client.resolve(&id).await?;
//!     println!("{} -> {}", id, stream.delivery_url);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod client;
pub mod config_ext;
pub mod error;
pub mod extractor;
pub mod import;
pub mod models;
pub mod pool;
pub mod resolver;

#[cfg(feature = "server")]
pub mod api_rest;
#[cfg(feature = "server")]
pub mod server_ext;

pub use batch::BatchResolver;
pub use cache::{CacheStats, ResolutionCache};
pub use client::YoutubeClient;
pub use config_ext::YoutubeConfigExt;
pub use error::{ResolutionError, Result};
pub use extractor::{Extractor, YtDlpExtractor};
pub use import::{ImportSink, MemoryImportSink, StoredPlaylist};
pub use models::{
    BatchResult, Extraction, ImportedTrack, InvalidIdentifier, MediaIdentifier, ResolvedStream,
    SearchHit, TrackMetadata,
};
pub use pool::WorkerPool;
pub use resolver::Resolver;

#[cfg(feature = "server")]
pub use api_rest::YoutubeState;
#[cfg(feature = "server")]
pub use server_ext::YoutubeServerExt;
