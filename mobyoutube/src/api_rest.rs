//! Endpoints API REST : résolution, recherche et imports
//!
//! Le flux audio lui-même (`/audio/{id}`) est servi par `mobrelay`.

use crate::batch::BatchResolver;
use crate::cache::CacheStats;
use crate::client::YoutubeClient;
use crate::error::ResolutionError;
use crate::import::ImportSink;
use crate::models::{MediaIdentifier, SearchHit, TrackMetadata, ImportedTrack};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 30;

/// État partagé par les handlers
#[derive(Clone)]
pub struct YoutubeState {
    pub client: YoutubeClient,
    pub batch: BatchResolver,
    pub sink: Arc<dyn ImportSink>,
    pub import_concurrency: usize,
}

impl YoutubeState {
    pub fn new(client: YoutubeClient, sink: Arc<dyn ImportSink>, import_concurrency: usize) -> Self {
        Self {
            batch: BatchResolver::new(client.clone()),
            client,
            sink,
            import_concurrency,
        }
    }
}

// ============ Erreurs ============

/// Corps JSON des réponses d'erreur
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug)]
pub enum AppError {
    Resolution(ResolutionError),
    BadRequest(String),
    Internal(String),
}

impl From<ResolutionError> for AppError {
    fn from(err: ResolutionError) -> Self {
        Self::Resolution(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Resolution(e) => (e.status_code(), e.kind(), e.to_string()),
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m),
            AppError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", m),
        };

        let body = ErrorResponse {
            error: message,
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_identifier(raw: &str) -> Result<MediaIdentifier, AppError> {
    MediaIdentifier::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

// ============ Types de requête / réponse ============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StreamResponse {
    pub id: MediaIdentifier,
    /// Chemin du relais audio à utiliser par le lecteur
    pub stream_url: String,
    pub title: Option<String>,
    /// Durée en secondes
    pub duration: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Texte recherché
    pub query: Option<String>,
    /// Page (à partir de 1)
    pub page: Option<usize>,
    /// Résultats par page (1 à 30)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub page: usize,
    pub has_more: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportTracksRequest {
    /// Nom de la playlist créée
    pub name: String,
    pub tracks: Vec<TrackMetadata>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportUrlRequest {
    /// URL de la playlist sur la plateforme
    pub url: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResponse {
    pub success: bool,
    pub imported_count: usize,
    pub playlist_id: u64,
}

// ============ Router ============

/// Crée le router Axum avec tous les endpoints YouTube
pub fn create_router(state: YoutubeState) -> Router {
    Router::new()
        .route("/stream/{id}", get(get_stream))
        .route("/search", get(search))
        .route("/import/tracks", post(import_tracks))
        .route("/youtube/import/url", post(import_url))
        .route("/cache/stats", get(get_cache_stats))
        .with_state(state)
}

// ============ Handlers ============

/// Résout une piste et retourne le chemin du relais audio
#[utoipa::path(
    get,
    path = "/stream/{id}",
    tag = "youtube",
    params(
        ("id" = String, Path, description = "Identifiant de la vidéo")
    ),
    responses(
        (status = 200, description = "Piste résolue", body = StreamResponse),
        (status = 400, description = "Identifiant invalide", body = ErrorResponse),
        (status = 502, description = "Vidéo introuvable ou bloquée", body = ErrorResponse),
        (status = 503, description = "Extracteur indisponible", body = ErrorResponse),
        (status = 504, description = "Délai d'extraction dépassé", body = ErrorResponse),
    )
)]
pub async fn get_stream(
    State(state): State<YoutubeState>,
    Path(id): Path<String>,
) -> Result<Json<StreamResponse>, AppError> {
    let id = parse_identifier(&id)?;
    let record = state.client.resolve(&id).await?;

    Ok(Json(StreamResponse {
        stream_url: format!("/audio/{}", id),
        id,
        title: record.title,
        duration: record.duration_seconds,
    }))
}

/// Recherche paginée dans le catalogue
#[utoipa::path(
    get,
    path = "/search",
    tag = "youtube",
    params(SearchParams),
    responses(
        (status = 200, description = "Résultats de recherche", body = SearchResponse),
        (status = 400, description = "Paramètres invalides", body = ErrorResponse),
    )
)]
pub async fn search(
    State(state): State<YoutubeState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Query parameter 'query' is required".to_string(),
        ));
    }

    let page = params.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::BadRequest("page must be >= 1".to_string()));
    }
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )));
    }

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::BadRequest("page is out of range".to_string()))?;
    let results = state.client.search(&query, limit, offset).await?;

    Ok(Json(SearchResponse {
        has_more: results.len() == limit,
        results,
        page,
    }))
}

/// Importe une liste de pistes en les retrouvant sur la plateforme
#[utoipa::path(
    post,
    path = "/import/tracks",
    tag = "import",
    request_body = ImportTracksRequest,
    responses(
        (status = 200, description = "Import effectué (les pistes introuvables sont ignorées)", body = ImportResponse),
        (status = 400, description = "Requête invalide", body = ErrorResponse),
    )
)]
pub async fn import_tracks(
    State(state): State<YoutubeState>,
    Json(request): Json<ImportTracksRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Playlist name is required".to_string()));
    }
    if request.tracks.is_empty() {
        return Err(AppError::BadRequest("No tracks to import".to_string()));
    }

    info!(name = %request.name, tracks = request.tracks.len(), "Importing track list");
    let result = state
        .batch
        .resolve_all(&request.tracks, state.import_concurrency)
        .await;

    store(&state, &request.name, result.into_imported()).await
}

/// Importe une playlist de la plateforme à partir de son URL
#[utoipa::path(
    post,
    path = "/youtube/import/url",
    tag = "import",
    request_body = ImportUrlRequest,
    responses(
        (status = 200, description = "Playlist importée", body = ImportResponse),
        (status = 400, description = "Playlist vide, privée ou illisible", body = ErrorResponse),
    )
)]
pub async fn import_url(
    State(state): State<YoutubeState>,
    Json(request): Json<ImportUrlRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Playlist name is required".to_string()));
    }

    info!(url = %request.url, "Importing platform playlist");
    let entries = match state.client.playlist(&request.url).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(url = %request.url, "Playlist listing failed: {}", e);
            Vec::new()
        }
    };

    if entries.is_empty() {
        return Err(AppError::BadRequest(
            "Could not fetch tracks from URL or playlist is empty/private".to_string(),
        ));
    }

    let tracks = entries
        .into_iter()
        .enumerate()
        .map(|(position, hit)| ImportedTrack::from_hit(hit, position))
        .collect();

    store(&state, &request.name, tracks).await
}

async fn store(
    state: &YoutubeState,
    name: &str,
    tracks: Vec<ImportedTrack>,
) -> Result<Json<ImportResponse>, AppError> {
    let imported_count = tracks.len();
    let playlist_id = state
        .sink
        .store_playlist(name, tracks)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(playlist_id, imported_count, "Import complete");
    Ok(Json(ImportResponse {
        success: true,
        imported_count,
        playlist_id,
    }))
}

/// Statistiques du cache de résolution
#[utoipa::path(
    get,
    path = "/cache/stats",
    tag = "youtube",
    responses(
        (status = 200, description = "Statistiques du cache", body = CacheStats)
    )
)]
pub async fn get_cache_stats(State(state): State<YoutubeState>) -> Json<CacheStats> {
    Json(state.client.cache_stats().await)
}

/// Documentation OpenAPI de l'API Mobify
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mobify API",
        version = "0.1.0",
        description = "Résolution de pistes, recherche, imports et relais audio"
    ),
    paths(get_stream, search, import_tracks, import_url, get_cache_stats),
    components(schemas(
        StreamResponse,
        SearchResponse,
        SearchHit,
        TrackMetadata,
        ImportedTrack,
        ImportTracksRequest,
        ImportUrlRequest,
        ImportResponse,
        ErrorResponse,
        CacheStats,
        MediaIdentifier,
    )),
    tags(
        (name = "youtube", description = "Résolution et recherche"),
        (name = "import", description = "Import de playlists")
    )
)]
pub struct ApiDoc;
