//! Messages SSDP : `M-SEARCH` sortant et réponses `HTTP/1.1 200 OK`.

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::trace;

use super::{SSDP_MULTICAST_ADDR, SSDP_PORT};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SsdpParseError {
    #[error("Empty SSDP message")]
    Empty,

    #[error("Not a search response: {0}")]
    NotAResponse(String),

    #[error("Malformed LOCATION {location:?}: {reason}")]
    BadLocation {
        location: String,
        reason: &'static str,
    },
}

/// `LOCATION` décomposée : là où lire la description du device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpLocation {
    pub host: String,
    pub port: u16,
    /// Chemin absolu, `/` initial compris
    pub path: String,
}

impl SsdpLocation {
    pub fn to_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

/// Réponse à un `M-SEARCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpResult {
    /// `None` quand la réponse ne porte pas de `LOCATION`
    pub location: Option<SsdpLocation>,
    pub cache_control: String,
    pub server: String,
    pub usn: String,
    pub search_target: String,
    pub wakeup: String,
    pub from: Option<SocketAddr>,
}

impl SsdpResult {
    /// `max-age` extrait de `CACHE-CONTROL`, en secondes.
    pub fn max_age(&self) -> Option<u32> {
        let lower = self.cache_control.to_ascii_lowercase();
        let idx = lower.find("max-age")?;
        let after_key = &lower[idx + "max-age".len()..];
        let after_eq = after_key.trim_start().trim_start_matches('=').trim_start();
        let digits: String = after_eq
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// Construit un `M-SEARCH` pour la cible `st`.
pub fn build_msearch(st: &str, mx: u32) -> String {
    let mx = mx.max(1); // MX doit être >= 1
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: PMOCast SSDP Client\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, mx, st
    )
}

/// Parse une réponse de recherche.
///
/// Les en-têtes inconnus sont ignorés. Une `LOCATION` mal formée fait
/// échouer la réponse entière.
pub fn parse_search_response(
    text: &str,
    from: Option<SocketAddr>,
) -> Result<SsdpResult, SsdpParseError> {
    let mut lines = text.lines();
    let first_line = lines.next().map(str::trim).ok_or(SsdpParseError::Empty)?;
    if first_line.is_empty() {
        return Err(SsdpParseError::Empty);
    }
    if !first_line.to_ascii_uppercase().starts_with("HTTP/") {
        return Err(SsdpParseError::NotAResponse(first_line.to_string()));
    }

    let mut headers = parse_headers(lines);
    let mut take = |name: &str| headers.remove(name).unwrap_or_default();

    let location = match take("LOCATION") {
        raw if raw.is_empty() => None,
        raw => Some(parse_location(&raw)?),
    };

    Ok(SsdpResult {
        location,
        cache_control: take("CACHE-CONTROL"),
        server: take("SERVER"),
        usn: take("USN"),
        search_target: take("ST"),
        wakeup: take("WAKEUP"),
        from,
    })
}

/// Décompose une URL `scheme://host:port/path`.
///
/// Le schéma est ignoré ; l'hôte court jusqu'au `:`, le port jusqu'au `/`.
pub fn parse_location(location: &str) -> Result<SsdpLocation, SsdpParseError> {
    let bad = |reason| SsdpParseError::BadLocation {
        location: location.to_string(),
        reason,
    };

    let rest = location
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(location);

    let (host, after_host) = rest.split_once(':').ok_or_else(|| bad("missing port"))?;
    let slash = after_host.find('/').ok_or_else(|| bad("missing path"))?;
    let (port, path) = after_host.split_at(slash);

    if host.is_empty() {
        return Err(bad("empty host"));
    }
    let port = port.parse::<u16>().map_err(|_| bad("invalid port"))?;

    Ok(SsdpLocation {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();

        if line.is_empty() {
            break;
        }

        // Split on first ':' only (values may contain ':')
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_uppercase();
            let value = value.trim().to_string();

            if !name.is_empty() && !value.is_empty() {
                headers.insert(name, value);
            } else {
                trace!("Skipping empty header: '{}'", line);
            }
        } else {
            trace!("Skipping line without colon: '{}'", line);
        }
    }
    headers
}
