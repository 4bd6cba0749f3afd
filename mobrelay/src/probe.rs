//! Sonde de la source amont
//!
//! Une requête HEAD suffit en général. Certaines sources la refusent : on
//! retente alors un GET limité au premier octet (`Range: bytes=0-0`) dont le
//! `Content-Range` donne la taille totale.

use crate::error::{RelayError, Result};
use crate::range::ContentRange;
use reqwest::{Client, Response, StatusCode, header};
use std::time::Duration;
use tracing::debug;

/// Ce que la sonde a appris de la ressource amont
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Taille totale en octets, si connue
    pub total_length: Option<u64>,
    pub content_type: Option<String>,
    /// Faux seulement si la source annonce `Accept-Ranges: none`
    pub accepts_ranges: bool,
}

fn header_str(response: &Response, name: header::HeaderName) -> Option<&str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn content_type(response: &Response) -> Option<String> {
    header_str(response, header::CONTENT_TYPE).map(str::to_string)
}

fn accepts_ranges(response: &Response) -> bool {
    header_str(response, header::ACCEPT_RANGES)
        .map(|v| !v.trim().eq_ignore_ascii_case("none"))
        .unwrap_or(true)
}

fn content_length(response: &Response) -> Option<u64> {
    header_str(response, header::CONTENT_LENGTH).and_then(|v| v.trim().parse().ok())
}

impl ProbeResult {
    fn from_head(response: &Response) -> Self {
        Self {
            total_length: content_length(response),
            content_type: content_type(response),
            accepts_ranges: accepts_ranges(response),
        }
    }

    fn from_first_byte(response: &Response) -> Self {
        if response.status() == StatusCode::PARTIAL_CONTENT {
            Self {
                total_length: header_str(response, header::CONTENT_RANGE)
                    .and_then(ContentRange::parse)
                    .and_then(|r| r.total),
                content_type: content_type(response),
                accepts_ranges: true,
            }
        } else {
            // 200 : la source a ignoré la plage et renvoie tout
            Self {
                total_length: content_length(response),
                content_type: content_type(response),
                accepts_ranges: false,
            }
        }
    }
}

/// Sonde `url` : HEAD, puis GET `bytes=0-0` si le HEAD échoue
pub async fn probe(client: &Client, url: &str, timeout: Duration) -> Result<ProbeResult> {
    match client.head(url).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => {
            return Ok(ProbeResult::from_head(&response));
        }
        Ok(response) => {
            debug!(status = %response.status(), "HEAD refused, probing with first byte");
        }
        Err(e) => {
            debug!(error = %e, "HEAD failed, probing with first byte");
        }
    }

    let response = client
        .get(url)
        .header(header::RANGE, "bytes=0-0")
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| RelayError::ProbeFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RelayError::ProbeFailed(format!(
            "upstream answered {}",
            response.status()
        )));
    }

    Ok(ProbeResult::from_first_byte(&response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new()
    }

    #[tokio::test]
    async fn test_head_probe() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("HEAD", "/media")
            .with_status(200)
            .with_header("content-length", "1000")
            .with_header("content-type", "audio/webm")
            .with_header("accept-ranges", "bytes")
            .create_async()
            .await;

        let result = probe(&client(), &format!("{}/media", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.total_length, Some(1000));
        assert_eq!(result.content_type.as_deref(), Some("audio/webm"));
        assert!(result.accepts_ranges);
    }

    #[tokio::test]
    async fn test_head_refused_falls_back_to_first_byte() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("HEAD", "/media")
            .with_status(405)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/media")
            .match_header("range", "bytes=0-0")
            .with_status(206)
            .with_header("content-range", "bytes 0-0/1000")
            .with_header("content-type", "audio/mp4")
            .with_body("x")
            .create_async()
            .await;

        let result = probe(&client(), &format!("{}/media", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        get.assert_async().await;
        assert_eq!(result.total_length, Some(1000));
        assert_eq!(result.content_type.as_deref(), Some("audio/mp4"));
        assert!(result.accepts_ranges);
    }

    #[tokio::test]
    async fn test_probe_fails_when_both_requests_fail() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("HEAD", "/media")
            .with_status(403)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/media")
            .with_status(403)
            .create_async()
            .await;

        let err = probe(&client(), &format!("{}/media", server.url()), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ProbeFailed(_)));
    }
}
