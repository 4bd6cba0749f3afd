//! Erreurs du relais audio

use crate::range::unsatisfied_range;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use mobyoutube::ResolutionError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Ni HEAD ni GET `bytes=0-0` n'ont abouti
    #[error("Upstream probe failed: {0}")]
    ProbeFailed(String),

    /// Statut d'erreur reçu à l'ouverture du flux, avant tout envoi au client
    #[error("Upstream answered with status {0}")]
    UpstreamStatus(u16),

    /// Flux amont interrompu après l'envoi des en-têtes
    #[error("Upstream stream aborted: {0}")]
    StreamAborted(String),

    #[error("Range not satisfiable for a resource of {0} bytes")]
    RangeNotSatisfiable(u64),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "bad_request",
            Self::Resolution(e) => e.kind(),
            Self::ProbeFailed(_) => "probe_failed",
            Self::UpstreamStatus(_) => "upstream_status",
            Self::StreamAborted(_) => "stream_aborted",
            Self::RangeNotSatisfiable(_) => "range_not_satisfiable",
            Self::Http(_) => "upstream_http",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Self::Resolution(e) => e.status_code(),
            Self::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::ProbeFailed(_)
            | Self::UpstreamStatus(_)
            | Self::StreamAborted(_)
            | Self::Http(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RelayErrorBody {
    pub error: String,
    pub kind: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = RelayErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        let mut response = (status, Json(body)).into_response();

        if let Self::RangeNotSatisfiable(total) = self {
            let headers = response.headers_mut();
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            if let Ok(value) = HeaderValue::from_str(&unsatisfied_range(total)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}
