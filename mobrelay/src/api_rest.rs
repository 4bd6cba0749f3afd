//! Endpoint `/audio/{id}`

use crate::error::{RelayError, RelayErrorBody};
use crate::relay::RangeRelay;
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::Response,
    routing::get,
};
use mobyoutube::MediaIdentifier;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct RelayState {
    pub relay: RangeRelay,
}

impl RelayState {
    pub fn new(relay: RangeRelay) -> Self {
        Self { relay }
    }
}

pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/audio/{id}", get(relay_audio))
        .with_state(state)
}

/// Relaie le flux audio d'une piste
///
/// Sans en-tête `Range`, le flux complet est renvoyé (200). Avec une plage
/// que la source honore, la réponse est partielle (206) et porte le
/// `Content-Range` de la source.
#[utoipa::path(
    get,
    path = "/audio/{id}",
    params(
        ("id" = String, Path, description = "Identifiant de la vidéo"),
        ("Range" = Option<String>, Header, description = "Plage d'octets, ex. bytes=0-1023")
    ),
    responses(
        (status = 200, description = "Flux complet"),
        (status = 206, description = "Flux partiel"),
        (status = 400, description = "Identifiant invalide", body = RelayErrorBody),
        (status = 416, description = "Plage non satisfiable", body = RelayErrorBody),
        (status = 502, description = "Source amont injoignable ou en erreur", body = RelayErrorBody),
        (status = 503, description = "Extraction saturée", body = RelayErrorBody),
        (status = 504, description = "Extraction trop longue", body = RelayErrorBody)
    ),
    tag = "audio"
)]
async fn relay_audio(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    let id = MediaIdentifier::parse(&id).map_err(|e| RelayError::InvalidIdentifier(e.to_string()))?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    state.relay.relay(&id, range).await
}

#[derive(OpenApi)]
#[openapi(
    paths(relay_audio),
    components(schemas(RelayErrorBody)),
    tags(
        (name = "audio", description = "Relais audio avec support des plages d'octets")
    ),
    info(
        title = "Mobify audio relay",
        version = "0.1.0",
        description = "Relais HTTP des flux audio résolus"
    )
)]
pub struct ApiDoc;
