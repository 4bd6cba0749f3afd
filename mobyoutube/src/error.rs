//! Gestion des erreurs de résolution

use std::time::Duration;
use thiserror::Error;

/// Type Result personnalisé pour mobyoutube
pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Échecs possibles lors de la résolution d'un identifiant
///
/// Le type est `Clone` : un échec de résolution coalescée est transmis à
/// chacun des appelants en attente.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Identifiant inconnu de la plateforme (vidéo supprimée, privée, ...)
    #[error("Media not found: {0}")]
    NotFound(String),

    /// Réponse anti-automatisation de la plateforme
    #[error("Blocked by upstream: {0}")]
    Blocked(String),

    /// Délai d'attente dépassé
    #[error("Resolution timed out after {0:?}")]
    Timeout(Duration),

    /// Échec transitoire ou inconnu
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
}

impl ResolutionError {
    /// Nom court de la catégorie, utilisé dans les réponses JSON
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Blocked(_) => "blocked",
            Self::Timeout(_) => "timeout",
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// Classe la sortie d'erreur de l'extracteur
    ///
    /// Seule la dernière ligne non vide est conservée dans le message.
    pub fn from_stderr(stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        let message = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("extractor failed without output")
            .to_string();

        const BLOCKED: [&str; 5] = [
            "sign in to confirm",
            "not a bot",
            "http error 403",
            "http error 429",
            "too many requests",
        ];
        const NOT_FOUND: [&str; 6] = [
            "video unavailable",
            "private video",
            "does not exist",
            "has been removed",
            "http error 404",
            "incomplete youtube id",
        ];

        if BLOCKED.iter().any(|p| lower.contains(p)) {
            Self::Blocked(message)
        } else if NOT_FOUND.iter().any(|p| lower.contains(p)) {
            Self::NotFound(message)
        } else {
            Self::Unavailable(message)
        }
    }

    /// Statut HTTP renvoyé au client
    #[cfg(feature = "server")]
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) | Self::Blocked(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_classification() {
        let err = ResolutionError::from_stderr(
            "WARNING: foo\nERROR: [youtube] abc: Video unavailable. This video has been removed\n",
        );
        assert!(matches!(err, ResolutionError::NotFound(_)));

        let err = ResolutionError::from_stderr(
            "ERROR: [youtube] abc: Sign in to confirm you're not a bot",
        );
        assert_eq!(err.kind(), "blocked");

        let err = ResolutionError::from_stderr("ERROR: unable to download webpage: timed out");
        assert_eq!(
            err,
            ResolutionError::Unavailable("ERROR: unable to download webpage: timed out".into())
        );
    }

    #[test]
    fn test_empty_stderr() {
        let err = ResolutionError::from_stderr("  \n");
        assert!(matches!(err, ResolutionError::Unavailable(_)));
    }
}
