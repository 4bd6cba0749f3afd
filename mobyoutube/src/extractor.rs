//! Frontière avec le mécanisme d'extraction
//!
//! Un [`Extractor`] est bloquant par nature (sous-processus, bibliothèque
//! synchrone). Il n'est jamais appelé directement depuis un handler : le
//! [`Resolver`](crate::Resolver) le fait tourner dans le
//! [`WorkerPool`](crate::WorkerPool).
//!
//! [`YtDlpExtractor`] est l'implémentation fournie, qui pilote l'exécutable
//! `yt-dlp` et lit sa sortie JSON.

use crate::error::{ResolutionError, Result};
use crate::models::{Extraction, MediaIdentifier, SearchHit};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Mécanisme d'extraction bloquant
pub trait Extractor: Send + Sync + 'static {
    /// Résout un identifiant en URL de diffusion audio
    fn extract(&self, id: &MediaIdentifier) -> Result<Extraction>;

    /// Recherche dans le catalogue de la plateforme
    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<SearchHit>>;

    /// Liste les entrées d'une playlist, sans résoudre leurs URLs
    fn playlist(&self, url: &str) -> Result<Vec<SearchHit>>;
}

const DEFAULT_PROGRAM: &str = "yt-dlp";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Extracteur basé sur l'exécutable `yt-dlp`
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
    force_ipv4: bool,
    timeout: Duration,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl YtDlpExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            force_ipv4: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Force IPv4 pour les connexions sortantes du sous-processus uniquement
    pub fn force_ipv4(mut self, enabled: bool) -> Self {
        self.force_ipv4 = enabled;
        self
    }

    /// Délai au-delà duquel le sous-processus est tué
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_args(&self) -> Vec<&'static str> {
        let mut args = vec!["--no-warnings", "--no-progress", "--ignore-config"];
        if self.force_ipv4 {
            args.push("--force-ipv4");
        }
        args
    }

    /// Lance `yt-dlp` et retourne sa sortie standard
    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.program);
        command
            .args(self.base_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = %self.program.display(), ?args, "Running extractor");

        let mut child = command.spawn().map_err(|e| {
            ResolutionError::Unavailable(format!(
                "cannot start {}: {}",
                self.program.display(),
                e
            ))
        })?;

        // Les pipes sont vidés en parallèle pour qu'une sortie volumineuse ne
        // bloque pas le processus enfant
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.timeout)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&stderr);
            let err = ResolutionError::from_stderr(&stderr);
            warn!(kind = err.kind(), "Extractor failed: {}", err);
            Err(err)
        }
    }

    fn run_json<T: for<'de> Deserialize<'de>>(&self, args: &[&str]) -> Result<T> {
        let output = self.run(args)?;
        serde_json::from_slice(&output)
            .map_err(|e| ResolutionError::Unavailable(format!("invalid extractor output: {}", e)))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                warn!("Extractor exceeded {:?}, killing it", timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(ResolutionError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(ResolutionError::Unavailable(format!(
                    "cannot wait for extractor: {}",
                    e
                )));
            }
        }
    }
}

impl Extractor for YtDlpExtractor {
    fn extract(&self, id: &MediaIdentifier) -> Result<Extraction> {
        let url = id.watch_url();
        let video: RawVideo =
            self.run_json(&["-j", "--no-playlist", "-f", "bestaudio/best", "--", &url])?;

        let delivery_url = video
            .url
            .clone()
            .filter(|u| u.starts_with("http"))
            .ok_or_else(|| {
                ResolutionError::Unavailable(format!("no audio delivery URL for {}", id))
            })?;

        Ok(Extraction {
            delivery_url,
            title: video.title.clone(),
            duration_seconds: video.duration_seconds(),
            uploader: video.uploader(),
            thumbnail: video.thumbnail(),
        })
    }

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let target = format!("ytsearch{}:{}", offset.saturating_add(limit), query);
        let listing: RawListing = self.run_json(&["-J", "--flat-playlist", "--", &target])?;

        Ok(listing
            .into_hits()
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn playlist(&self, url: &str) -> Result<Vec<SearchHit>> {
        let listing: RawListing = self.run_json(&["-J", "--flat-playlist", "--", url])?;
        Ok(listing.into_hits())
    }
}

// ============ Sortie JSON de yt-dlp ============

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    id: Option<String>,
    url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<RawThumbnail>>,
}

impl RawVideo {
    fn duration_seconds(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64)
    }

    fn uploader(&self) -> Option<String> {
        self.uploader.clone().or_else(|| self.channel.clone())
    }

    fn thumbnail(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .or_else(|| {
                self.thumbnails
                    .iter()
                    .flatten()
                    .rev()
                    .find_map(|t| t.url.clone())
            })
    }

    fn into_hit(self) -> Option<SearchHit> {
        let id = MediaIdentifier::parse(self.id.as_deref()?).ok()?;
        Some(SearchHit {
            url: id.watch_url(),
            title: self.title.clone().unwrap_or_default(),
            uploader: self.uploader(),
            duration: self.duration_seconds(),
            thumbnail: self.thumbnail(),
            id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawListing {
    #[serde(default)]
    entries: Vec<Option<RawVideo>>,
}

impl RawListing {
    /// Les entrées nulles (vidéos indisponibles) ou sans identifiant valide sont ignorées
    fn into_hits(self) -> Vec<SearchHit> {
        self.entries
            .into_iter()
            .flatten()
            .filter_map(RawVideo::into_hit)
            .collect()
    }
}
