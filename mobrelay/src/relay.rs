//! Relais HTTP avec support des plages d'octets
//!
//! Pour chaque requête `/audio/{id}` :
//!
//! 1. l'identifiant est résolu en URL de diffusion (cache du [`YoutubeClient`]) ;
//! 2. la source amont est sondée ([`probe`](crate::probe::probe)) pour
//!    connaître taille, type et support des plages ;
//! 3. une seconde requête amont est ouverte avec la plage normalisée ;
//! 4. statut et en-têtes sont envoyés au client, puis le corps est relayé
//!    par morceaux d'au plus `chunk_size` octets.
//!
//! Une fois les en-têtes partis, une erreur amont ne peut plus changer le
//! statut : le corps est interrompu et le client voit une lecture échouée.
//! Si le client se déconnecte, le corps est abandonné et la requête amont
//! avec lui.

use crate::error::{RelayError, Result};
use crate::probe::{ProbeResult, probe};
use crate::range::{ByteRange, ContentRange, content_range, open_content_range};
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use mobyoutube::{MediaIdentifier, YoutubeClient};
use reqwest::Client;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Paramètres du relais
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub user_agent: String,
    /// Lie les connexions sortantes à `0.0.0.0`, ce qui exclut IPv6
    pub prefer_ipv4: bool,
    /// Délai de la sonde, et de l'ouverture du flux amont
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    pub chunk_size: usize,
    pub cache_control: String,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            prefer_ipv4: false,
            probe_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            chunk_size: 128 * 1024,
            cache_control: "public, max-age=3600".to_string(),
        }
    }
}

/// Relais audio partagé par les handlers
#[derive(Clone)]
pub struct RangeRelay {
    youtube: YoutubeClient,
    http: Client,
    options: Arc<RelayOptions>,
}

impl RangeRelay {
    pub fn new(youtube: YoutubeClient, options: RelayOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(options.user_agent.clone())
            .connect_timeout(options.connect_timeout);
        if options.prefer_ipv4 {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }

        Ok(Self {
            youtube,
            http: builder.build()?,
            options: Arc::new(options),
        })
    }

    /// Relaie le flux audio de `id`, en honorant l'en-tête `Range` du client
    pub async fn relay(&self, id: &MediaIdentifier, range: Option<&str>) -> Result<Response> {
        let stream = self.youtube.resolve(id).await?;
        let url = stream.delivery_url.as_str();

        let probed = probe(&self.http, url, self.options.probe_timeout).await?;
        debug!(
            id = %id,
            total = ?probed.total_length,
            ranges = probed.accepts_ranges,
            "upstream probed"
        );

        let plan = RangePlan::new(range, &probed)?;
        let upstream = self.open(url, plan.header.as_deref()).await?;

        let status = upstream.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            let total = upstream
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(ContentRange::parse)
                .and_then(|r| r.total)
                .or(probed.total_length)
                .unwrap_or(0);
            return Err(RelayError::RangeNotSatisfiable(total));
        }
        if !status.is_success() {
            warn!(id = %id, status = %status, "upstream refused the stream");
            return Err(RelayError::UpstreamStatus(status.as_u16()));
        }

        let range = if plan.header.is_some() && status == StatusCode::PARTIAL_CONTENT {
            let range = plan.content_range(upstream.headers(), &probed);
            if range.is_none() {
                warn!(id = %id, "partial upstream answer without usable range, relaying as 200");
            }
            range
        } else {
            None
        };
        let status = if range.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };
        let headers = self.response_headers(&upstream, &probed, &plan, range);

        info!(id = %id, status = %status, range = ?plan.header, "relaying audio");

        let guard = TransferGuard::new(id.clone());
        let body = relay_body(upstream, self.options.chunk_size, guard);

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    async fn open(&self, url: &str, range: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self.http.get(url);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        // Le délai ne couvre que l'attente des en-têtes
        match tokio::time::timeout(self.options.probe_timeout, request.send()).await {
            Ok(response) => Ok(response?),
            Err(_) => Err(RelayError::StreamAborted(format!(
                "no upstream answer within {:?}",
                self.options.probe_timeout
            ))),
        }
    }

    fn response_headers(
        &self,
        upstream: &reqwest::Response,
        probed: &ProbeResult,
        plan: &RangePlan,
        range: Option<HeaderValue>,
    ) -> HeaderMap {
        let partial = range.is_some();
        let mut headers = HeaderMap::new();
        let upstream_headers = upstream.headers();

        headers.insert(
            header::ACCEPT_RANGES,
            HeaderValue::from_static(if probed.accepts_ranges { "bytes" } else { "none" }),
        );

        let content_type = upstream_headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .or_else(|| {
                probed
                    .content_type
                    .as_deref()
                    .and_then(|v| HeaderValue::from_str(v).ok())
            })
            .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
        headers.insert(header::CONTENT_TYPE, content_type);

        // Réponse complète : seule la longueur annoncée par le flux amont fait foi
        let computed_length = if partial {
            plan.bounds.map(|(start, end)| end - start + 1)
        } else {
            None
        };
        let content_length = upstream_headers
            .get(header::CONTENT_LENGTH)
            .cloned()
            .or_else(|| computed_length.map(HeaderValue::from));
        if let Some(length) = content_length {
            headers.insert(header::CONTENT_LENGTH, length);
        }

        if let Some(range) = range {
            headers.insert(header::CONTENT_RANGE, range);
        }

        if let Ok(cache_control) = HeaderValue::from_str(&self.options.cache_control) {
            headers.insert(header::CACHE_CONTROL, cache_control);
        }

        headers
    }
}

/// Plage transmise à la source amont
#[derive(Debug, Default)]
struct RangePlan {
    /// En-tête `Range` envoyé en amont
    header: Option<String>,
    /// Bornes résolues, quand la taille totale est connue
    bounds: Option<(u64, u64)>,
    /// Premier octet demandé, connu même sans la taille totale
    start: Option<u64>,
}

impl RangePlan {
    fn new(requested: Option<&str>, probed: &ProbeResult) -> Result<Self> {
        // Plage mal formée ou multiple : réponse complète
        let Some(range) = requested.and_then(ByteRange::parse) else {
            return Ok(Self::default());
        };
        if !probed.accepts_ranges {
            return Ok(Self::default());
        }

        match probed.total_length {
            Some(total) => {
                let (start, end) = range
                    .resolve(total)
                    .ok_or(RelayError::RangeNotSatisfiable(total))?;
                Ok(Self {
                    header: Some(ByteRange::Bounded { start, end }.to_header()),
                    bounds: Some((start, end)),
                    start: Some(start),
                })
            }
            None => Ok(Self {
                header: Some(range.to_header()),
                bounds: None,
                start: match range {
                    ByteRange::Bounded { start, .. } | ByteRange::From { start } => Some(start),
                    ByteRange::Suffix { .. } => None,
                },
            }),
        }
    }

    /// `Content-Range` à renvoyer pour une réponse 206 de la source
    ///
    /// Celui de la source d'abord, puis les bornes et la taille sondée, enfin
    /// le premier octet demandé et le `Content-Length` amont (`bytes a-b/*`).
    /// `None` quand la plage servie ne peut pas être décrite.
    fn content_range(&self, upstream: &HeaderMap, probed: &ProbeResult) -> Option<HeaderValue> {
        if let Some(range) = upstream.get(header::CONTENT_RANGE) {
            return Some(range.clone());
        }

        let value = match (self.bounds, probed.total_length) {
            (Some((start, end)), Some(total)) => content_range(start, end, total),
            _ => {
                let start = self.start?;
                let length: u64 = upstream
                    .get(header::CONTENT_LENGTH)?
                    .to_str()
                    .ok()?
                    .trim()
                    .parse()
                    .ok()?;
                let end = start.checked_add(length.checked_sub(1)?)?;
                open_content_range(start, end)
            }
        };
        HeaderValue::from_str(&value).ok()
    }
}

/// Suit un transfert et signale une déconnexion du client
struct TransferGuard {
    id: MediaIdentifier,
    sent: u64,
    finished: bool,
}

impl TransferGuard {
    fn new(id: MediaIdentifier) -> Self {
        Self {
            id,
            sent: 0,
            finished: false,
        }
    }
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                id = %self.id,
                sent = self.sent,
                "client disconnected, upstream transfer cancelled"
            );
        }
    }
}

fn relay_body(
    upstream: reqwest::Response,
    chunk_size: usize,
    guard: TransferGuard,
) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Send + 'static {
    let chunk_size = chunk_size.max(1);

    async_stream::stream! {
        let mut guard = guard;
        let mut upstream = upstream.bytes_stream();

        while let Some(next) = upstream.next().await {
            match next {
                Ok(mut chunk) => {
                    guard.sent += chunk.len() as u64;
                    while chunk.len() > chunk_size {
                        yield Ok(chunk.split_to(chunk_size));
                    }
                    if !chunk.is_empty() {
                        yield Ok(chunk);
                    }
                }
                Err(e) => {
                    let err = RelayError::StreamAborted(e.to_string());
                    warn!(id = %guard.id, sent = guard.sent, "{}", err);
                    guard.finished = true;
                    yield Err(io::Error::other(err));
                    break;
                }
            }
        }

        if !guard.finished {
            guard.finished = true;
            debug!(id = %guard.id, sent = guard.sent, "relay finished");
        }
    }
}
