//! Extension de mobserver::Server pour enregistrer l'API YouTube
//!
//! `mobserver` ne dépend pas de `mobyoutube` : c'est ce trait qui ajoute les
//! routes au serveur.

use crate::api_rest::{ApiDoc, YoutubeState, create_router};
use mobserver::Server;
use utoipa::OpenApi;

/// Trait d'extension pour ajouter l'API YouTube à un serveur mobserver
///
/// # Routes enregistrées
///
/// - `GET /stream/{id}` - Résolution d'une piste
/// - `GET /search` - Recherche (query params: query, page, limit)
/// - `POST /import/tracks` - Import d'une liste de pistes
/// - `POST /youtube/import/url` - Import d'une playlist de la plateforme
/// - `GET /cache/stats` - Statistiques du cache
/// - `GET /swagger-ui/mobify` - Documentation interactive
///
/// # Exemple
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mobconfig::Config;
/// use mobserver::ServerBuilder;
/// use mobyoutube::{MemoryImportSink, YoutubeClient, YoutubeConfigExt, YoutubeServerExt, YoutubeState};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load_config("")?;
/// let client = YoutubeClient::from_config(&config);
/// let state = YoutubeState::new(client, Arc::new(MemoryImportSink::new()), config.get_import_concurrency());
///
/// let mut server = ServerBuilder::from_config(&config).build();
/// server.init_youtube(state).await;
/// # Ok(())
/// # }
/// ```
pub trait YoutubeServerExt {
    async fn init_youtube(&mut self, state: YoutubeState);
}

impl YoutubeServerExt for Server {
    async fn init_youtube(&mut self, state: YoutubeState) {
        self.add_openapi(create_router(state), ApiDoc::openapi(), "mobify")
            .await;
    }
}
