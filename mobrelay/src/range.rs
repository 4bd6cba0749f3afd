//! Parsing des en-têtes `Range` et `Content-Range`
//!
//! Une seule plage est supportée. Un en-tête `Range` mal formé ou
//! multi-plages est ignoré (réponse complète), comme le permet HTTP.

/// Plage d'octets demandée par le client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end` (bornes incluses)
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-suffix` : les `suffix` derniers octets
    Suffix { length: u64 },
}

impl ByteRange {
    /// Parse la valeur d'un en-tête `Range`
    pub fn parse(header: &str) -> Option<Self> {
        let set = header.trim().strip_prefix("bytes=")?.trim();
        if set.contains(',') {
            return None;
        }

        let (start, end) = set.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self::Suffix {
                length: end.parse().ok()?,
            }),
            (false, true) => Some(Self::From {
                start: start.parse().ok()?,
            }),
            (false, false) => {
                let start = start.parse().ok()?;
                let end = end.parse().ok()?;
                (start <= end).then_some(Self::Bounded { start, end })
            }
        }
    }

    /// Bornes effectives `(start, end)` pour une ressource de `total` octets
    ///
    /// `None` si la plage n'est pas satisfiable.
    pub fn resolve(&self, total: u64) -> Option<(u64, u64)> {
        if total == 0 {
            return None;
        }
        let last = total - 1;
        match *self {
            Self::Bounded { start, end } if start <= last => Some((start, end.min(last))),
            Self::From { start } if start <= last => Some((start, last)),
            Self::Suffix { length } if length > 0 => Some((total.saturating_sub(length), last)),
            _ => None,
        }
    }

    /// Valeur d'en-tête `Range` équivalente
    pub fn to_header(&self) -> String {
        match *self {
            Self::Bounded { start, end } => format!("bytes={}-{}", start, end),
            Self::From { start } => format!("bytes={}-", start),
            Self::Suffix { length } => format!("bytes=-{}", length),
        }
    }
}

/// `Content-Range` d'une réponse partielle
pub fn content_range(start: u64, end: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", start, end, total)
}

/// `Content-Range` d'une réponse partielle dont la taille totale est inconnue
pub fn open_content_range(start: u64, end: u64) -> String {
    format!("bytes {}-{}/*", start, end)
}

/// `Content-Range` d'une réponse 416
pub fn unsatisfied_range(total: u64) -> String {
    format!("bytes */{}", total)
}

/// Contenu d'un en-tête `Content-Range`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// Bornes incluses, absentes pour `bytes */total`
    pub range: Option<(u64, u64)>,
    /// Taille totale, absente pour `bytes start-end/*`
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.trim().strip_prefix("bytes")?.trim_start();
        let (range, total) = rest.split_once('/')?;

        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };
        let range = match range.trim() {
            "*" => None,
            r => {
                let (start, end) = r.split_once('-')?;
                Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
            }
        };

        if range.is_none() && total.is_none() {
            return None;
        }
        Some(Self { range, total })
    }

    /// Nombre d'octets couverts par la plage
    pub fn len(&self) -> Option<u64> {
        self.range.map(|(start, end)| end.saturating_sub(start) + 1)
    }
}
