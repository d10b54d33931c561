//! Magnet URI parsing and generation.

use std::fmt;

use urlencoding::{decode, encode};

use super::error::{DescriptorError, DescriptorResult};
use super::info_hash::InfoHash;

const PREFIX: &str = "magnet:?";
const BTIH: &str = "urn:btih:";

/// A parsed `magnet:` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    /// `dn` parameter.
    pub display_name: Option<String>,
    /// `tr` parameters, in order.
    pub trackers: Vec<String>,
    /// `ws` parameters, in order.
    pub web_seeds: Vec<String>,
}

impl MagnetLink {
    pub fn new(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            display_name: None,
            trackers: Vec::new(),
            web_seeds: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_tracker(mut self, url: impl Into<String>) -> Self {
        self.trackers.push(url.into());
        self
    }

    pub fn with_web_seed(mut self, url: impl Into<String>) -> Self {
        self.web_seeds.push(url.into());
        self
    }

    /// Whether a string looks like a magnet link.
    pub fn is_magnet(s: &str) -> bool {
        s.as_bytes()
            .get(..PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(PREFIX.as_bytes()))
    }

    /// Parse a magnet URI.
    ///
    /// Only `xt=urn:btih:` topics are accepted; unknown parameters are ignored.
    pub fn parse(uri: &str) -> DescriptorResult<Self> {
        if !Self::is_magnet(uri) {
            return Err(DescriptorError::InvalidMagnet(
                "missing magnet:? prefix".to_string(),
            ));
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers = Vec::new();
        let mut web_seeds = Vec::new();

        for pair in uri[PREFIX.len()..].split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(raw)
                .map_err(|e| DescriptorError::InvalidMagnet(format!("{}: {}", key, e)))?
                .into_owned();
            match key {
                "xt" => {
                    if let Some(hash) = value
                        .get(..BTIH.len())
                        .filter(|p| p.eq_ignore_ascii_case(BTIH))
                        .map(|_| &value[BTIH.len()..])
                    {
                        info_hash = Some(InfoHash::parse(hash)?);
                    }
                }
                "dn" => display_name = Some(value),
                "tr" => trackers.push(value),
                "ws" => web_seeds.push(value),
                _ => {}
            }
        }

        let info_hash = info_hash.ok_or_else(|| {
            DescriptorError::InvalidMagnet("no urn:btih info hash".to_string())
        })?;

        Ok(Self {
            info_hash,
            display_name,
            trackers,
            web_seeds,
        })
    }

    /// Render back to a URI (hex info-hash, parameters percent-encoded).
    pub fn to_uri(&self) -> String {
        let mut uri = format!("{}xt={}{}", PREFIX, BTIH, self.info_hash.to_hex());
        if let Some(name) = &self.display_name {
            uri.push_str("&dn=");
            uri.push_str(&encode(name));
        }
        for tracker in &self.trackers {
            uri.push_str("&tr=");
            uri.push_str(&encode(tracker));
        }
        for seed in &self.web_seeds {
            uri.push_str("&ws=");
            uri.push_str(&encode(seed));
        }
        uri
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}
