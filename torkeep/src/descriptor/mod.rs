//! Download descriptors.
//!
//! A [`Descriptor`] identifies one download: where it comes from (a local
//! `.torrent` file or a magnet link), where its payload is saved, and the
//! content identity that resume state must match before it is trusted.
//!
//! # Example
//!
//! ```ignore
//! use torkeep::descriptor::{Descriptor, Source};
//!
//! let descriptor = Descriptor::open(Source::parse("ubuntu.torrent"), "/srv/downloads")?;
//! println!("{} ({})", descriptor.name(), descriptor.info_hash());
//! println!("{}", descriptor.report());
//! ```

pub mod bencode;
mod error;
mod info_hash;
mod magnet;
mod metainfo;
mod report;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use error::{DescriptorError, DescriptorResult};
pub use info_hash::InfoHash;
pub use magnet::MagnetLink;
pub use metainfo::{FileAttributes, FileEntry, Metainfo, TrackerEntry, WebSeed, WebSeedKind};

#[cfg(test)]
pub(crate) use metainfo::fixtures;

/// Where a download comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A `.torrent` metainfo file on disk.
    TorrentFile(PathBuf),
    /// A `magnet:` URI; metadata is fetched by the engine.
    Magnet(String),
}

impl Source {
    /// Classify a user-supplied locator.
    pub fn parse(locator: &str) -> Self {
        if MagnetLink::is_magnet(locator) {
            Self::Magnet(locator.to_string())
        } else {
            Self::TorrentFile(PathBuf::from(locator))
        }
    }

    /// File name of a torrent file source.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::TorrentFile(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            Self::Magnet(_) => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TorrentFile(path) => write!(f, "{}", path.display()),
            Self::Magnet(uri) => f.write_str(uri),
        }
    }
}

/// Identifying record for one download. Immutable once built.
#[derive(Debug, Clone)]
pub struct Descriptor {
    source: Source,
    save_path: PathBuf,
    info_hash: InfoHash,
    name: String,
    metainfo: Option<Arc<Metainfo>>,
    magnet: MagnetLink,
}

impl Descriptor {
    /// Resolve a source into a descriptor.
    ///
    /// Torrent files are read and parsed; magnet links are parsed in place.
    pub fn open(source: Source, save_path: impl Into<PathBuf>) -> DescriptorResult<Self> {
        let save_path = save_path.into();
        match &source {
            Source::TorrentFile(path) => {
                let metainfo = Metainfo::from_file(path)?;
                Ok(Self {
                    info_hash: metainfo.info_hash,
                    name: metainfo.name.clone(),
                    magnet: metainfo.magnet_link(),
                    metainfo: Some(Arc::new(metainfo)),
                    source,
                    save_path,
                })
            }
            Source::Magnet(uri) => {
                let magnet = MagnetLink::parse(uri)?;
                Ok(Self {
                    info_hash: magnet.info_hash,
                    name: magnet
                        .display_name
                        .clone()
                        .unwrap_or_else(|| magnet.info_hash.to_hex()),
                    magnet,
                    metainfo: None,
                    source,
                    save_path,
                })
            }
        }
    }

    /// Build a descriptor from already-parsed metainfo.
    pub fn from_metainfo(source: Source, metainfo: Metainfo, save_path: impl Into<PathBuf>) -> Self {
        Self {
            info_hash: metainfo.info_hash,
            name: metainfo.name.clone(),
            magnet: metainfo.magnet_link(),
            metainfo: Some(Arc::new(metainfo)),
            source,
            save_path: save_path.into(),
        }
    }

    /// The same download read from another location.
    pub fn relocated(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed metainfo, `None` for magnet sources.
    pub fn metainfo(&self) -> Option<&Arc<Metainfo>> {
        self.metainfo.as_ref()
    }

    pub fn magnet(&self) -> &MagnetLink {
        &self.magnet
    }

    /// Stable name used to key this download's persisted state.
    ///
    /// The torrent file's name for file sources, the hex info-hash for
    /// magnet links.
    pub fn source_name(&self) -> String {
        let raw = self
            .source
            .file_name()
            .unwrap_or_else(|| self.info_hash.to_hex());
        sanitize(&raw)
    }

    /// Human-readable information report.
    pub fn report(&self) -> String {
        report::render(self)
    }
}

/// Keep file-system keys to a conservative character set.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "download".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "c12fe1c06bba254a9dc9f519b335aa7c1367a88a";

    #[test]
    fn test_source_parse() {
        assert!(matches!(
            Source::parse("magnet:?xt=urn:btih:abc"),
            Source::Magnet(_)
        ));
        assert_eq!(
            Source::parse("/tmp/a.torrent"),
            Source::TorrentFile(PathBuf::from("/tmp/a.torrent"))
        );
    }

    #[test]
    fn test_open_torrent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.torrent");
        std::fs::write(&path, fixtures::single_file_torrent("movie.mkv")).unwrap();

        let descriptor = Descriptor::open(Source::TorrentFile(path), "/save").unwrap();
        assert_eq!(descriptor.name(), "movie.mkv");
        assert_eq!(descriptor.source_name(), "movie.torrent");
        assert_eq!(descriptor.save_path(), Path::new("/save"));
        assert!(descriptor.metainfo().is_some());
    }

    #[test]
    fn test_open_missing_file_is_descriptor_error() {
        let err = Descriptor::open(Source::parse("/nonexistent/x.torrent"), "/save").unwrap_err();
        assert!(matches!(err, DescriptorError::ReadFailed { .. }));
    }

    #[test]
    fn test_open_magnet_uses_hash_as_key() {
        let uri = format!("magnet:?xt=urn:btih:{}&dn=Linux%20ISO", HASH);
        let descriptor = Descriptor::open(Source::parse(&uri), "/save").unwrap();
        assert_eq!(descriptor.name(), "Linux ISO");
        assert_eq!(descriptor.source_name(), HASH);
        assert!(descriptor.metainfo().is_none());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b:c.torrent"), "a_b_c.torrent");
        assert_eq!(sanitize(".."), "download");
    }
}
