//! Structures de données pour les identifiants, les résolutions et les imports

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

/// Longueur maximale acceptée pour un identifiant
const MAX_IDENTIFIER_LEN: usize = 64;

/// Identifiant rejeté à la validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid media identifier: {0:?}")]
pub struct InvalidIdentifier(pub String);

/// Identifiant opaque d'une piste sur la plateforme (ex: `dQw4w9WgXcQ`)
///
/// Seuls les caractères `[A-Za-z0-9_-]` sont acceptés : l'identifiant est
/// transmis tel quel à l'extracteur et sert de clé de cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema), schema(value_type = String, example = "dQw4w9WgXcQ"))]
pub struct MediaIdentifier(String);

impl MediaIdentifier {
    pub fn parse(value: &str) -> Result<Self, InvalidIdentifier> {
        let valid = !value.is_empty()
            && value.len() <= MAX_IDENTIFIER_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidIdentifier(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL de la page de la vidéo
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl FromStr for MediaIdentifier {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MediaIdentifier {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MediaIdentifier> for String {
    fn from(id: MediaIdentifier) -> Self {
        id.0
    }
}

impl fmt::Display for MediaIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Résultat brut d'un appel à l'extracteur pour une vidéo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// URL de diffusion à durée de vie courte
    pub delivery_url: String,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
}

/// Résolution réussie d'un identifiant
///
/// Immuable : un enregistrement périmé est remplacé, jamais modifié.
/// `expires_at = resolved_at + ttl` où `ttl` est la fenêtre de validité du
/// cache, indépendante de l'expiration propre à l'URL de diffusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStream {
    pub identifier: MediaIdentifier,
    pub delivery_url: String,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub resolved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResolvedStream {
    pub fn new(identifier: MediaIdentifier, extraction: Extraction, ttl: Duration) -> Self {
        let resolved_at = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(36_500));
        Self {
            identifier,
            delivery_url: extraction.delivery_url,
            title: extraction.title,
            duration_seconds: extraction.duration_seconds,
            resolved_at,
            expires_at: resolved_at + ttl,
        }
    }

    /// Vérifie si l'enregistrement est périmé
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Résultat de recherche ou entrée de playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct SearchHit {
    pub id: MediaIdentifier,
    pub title: String,
    pub uploader: Option<String>,
    /// Durée en secondes
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
    pub url: String,
}

/// Métadonnées d'une piste fournies par une source d'import
///
/// Si `identifier` est absent, la piste est retrouvée par recherche à partir
/// du titre et de l'artiste.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct TrackMetadata {
    #[serde(default, alias = "id", alias = "video_id")]
    pub identifier: Option<MediaIdentifier>,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "uploader")]
    pub artist: String,
    #[serde(default, alias = "duration")]
    pub duration_seconds: Option<u64>,
    #[serde(default, alias = "thumbnail")]
    pub thumbnail_url: Option<String>,
}

impl TrackMetadata {
    /// Requête de recherche dérivée du titre et de l'artiste
    pub fn search_query(&self) -> Option<String> {
        let query = format!("{} {}", self.title.trim(), self.artist.trim());
        let query = query.trim();
        (!query.is_empty()).then(|| query.to_string())
    }
}

/// Piste prête à être persistée par la couche d'import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ImportedTrack {
    pub video_id: MediaIdentifier,
    pub title: String,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<u64>,
    /// Position dans la playlist d'origine
    pub position: usize,
}

impl ImportedTrack {
    pub fn from_hit(hit: SearchHit, position: usize) -> Self {
        Self {
            video_id: hit.id,
            title: hit.title,
            uploader: hit.uploader,
            thumbnail: hit.thumbnail,
            duration: hit.duration,
            position,
        }
    }
}

/// Résultat positionnel d'une résolution par lot
///
/// `slots[i]` correspond à l'élément `i` de l'entrée ; un slot vide marque
/// un élément ignoré.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    slots: Vec<Option<ImportedTrack>>,
}

impl BatchResult {
    pub fn new(slots: Vec<Option<ImportedTrack>>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ImportedTrack> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn slots(&self) -> &[Option<ImportedTrack>] {
        &self.slots
    }

    /// Nombre de slots remplis
    pub fn imported_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Pistes résolues, dans l'ordre d'entrée
    pub fn into_imported(self) -> Vec<ImportedTrack> {
        self.slots.into_iter().flatten().collect()
    }
}
