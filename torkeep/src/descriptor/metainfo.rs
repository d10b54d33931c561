//! `.torrent` metainfo parsing.
//!
//! Extracts what the supervisor and the information report need: identity,
//! piece geometry, file layout, trackers, DHT nodes and web seeds. Piece
//! hashes themselves are left to the transfer engine.

use std::path::Path;

use super::bencode::{dict_entry_span, BencodeValue};
use super::error::{DescriptorError, DescriptorResult};
use super::info_hash::InfoHash;
use super::magnet::MagnetLink;

/// Length of one SHA-1 piece hash in the `pieces` string.
const PIECE_HASH_LEN: usize = 20;

/// One file of a torrent, laid out contiguously with its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the torrent root, `/`-separated.
    pub path: String,
    pub length: u64,
    /// Byte offset of the file within the concatenated torrent data.
    pub offset: u64,
    /// BEP 47 attributes.
    pub attributes: FileAttributes,
    /// BEP 47 symlink target.
    pub symlink: Option<String>,
}

/// BEP 47 file attribute flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttributes {
    pub pad: bool,
    pub executable: bool,
    pub hidden: bool,
    pub symlink: bool,
}

impl FileAttributes {
    fn parse(attr: &str) -> Self {
        Self {
            pad: attr.contains('p'),
            executable: attr.contains('x'),
            hidden: attr.contains('h'),
            symlink: attr.contains('l'),
        }
    }
}

/// An announce URL and its tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerEntry {
    pub tier: usize,
    pub url: String,
}

/// Web seed flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSeedKind {
    /// `url-list` (GetRight style).
    Bep19,
    /// `httpseeds` (Hoffman style).
    Bep17,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSeed {
    pub kind: WebSeedKind,
    pub url: String,
}

/// Parsed `.torrent` file.
#[derive(Debug, Clone)]
pub struct Metainfo {
    pub info_hash: InfoHash,
    pub name: String,
    pub piece_length: u64,
    pub num_pieces: usize,
    pub files: Vec<FileEntry>,
    pub trackers: Vec<TrackerEntry>,
    /// DHT bootstrap nodes as `(host, port)`.
    pub nodes: Vec<(String, i64)>,
    pub web_seeds: Vec<WebSeed>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub creation_date: Option<i64>,
    pub private: bool,
}

impl Metainfo {
    /// Read and parse a `.torrent` file.
    pub fn from_file(path: &Path) -> DescriptorResult<Self> {
        let data = std::fs::read(path).map_err(|source| DescriptorError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data).map_err(|e| match e {
            DescriptorError::Malformed { source, .. } => DescriptorError::Malformed {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse metainfo from raw bytes.
    pub fn from_bytes(data: &[u8]) -> DescriptorResult<Self> {
        let malformed = |source| DescriptorError::Malformed {
            path: Default::default(),
            source,
        };
        let root = BencodeValue::decode(data).map_err(malformed)?;
        let span = dict_entry_span(data, b"info")
            .map_err(malformed)?
            .ok_or_else(|| missing("info"))?;
        let info_hash = InfoHash::of_info_dict(&data[span]);

        let info = root.get("info").ok_or_else(|| missing("info"))?;
        let name = info
            .get("name")
            .and_then(BencodeValue::as_string)
            .ok_or_else(|| missing("info.name"))?;
        let piece_length = info
            .get("piece length")
            .and_then(BencodeValue::as_int)
            .filter(|len| *len > 0)
            .ok_or_else(|| missing("info.piece length"))? as u64;
        let pieces = info
            .get("pieces")
            .and_then(BencodeValue::as_bytes)
            .ok_or_else(|| missing("info.pieces"))?;
        if pieces.len() % PIECE_HASH_LEN != 0 {
            return Err(DescriptorError::InvalidMetainfo(format!(
                "pieces length {} is not a multiple of {}",
                pieces.len(),
                PIECE_HASH_LEN
            )));
        }

        let files = parse_files(info, &name)?;

        Ok(Self {
            info_hash,
            name,
            piece_length,
            num_pieces: pieces.len() / PIECE_HASH_LEN,
            files,
            trackers: parse_trackers(&root),
            nodes: parse_nodes(&root),
            web_seeds: parse_web_seeds(&root),
            comment: root.get("comment").and_then(BencodeValue::as_string),
            created_by: root.get("created by").and_then(BencodeValue::as_string),
            creation_date: root.get("creation date").and_then(BencodeValue::as_int),
            private: info.get("private").and_then(BencodeValue::as_int) == Some(1),
        })
    }

    /// Sum of all file lengths.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    /// First and last piece index touched by file `index`.
    pub fn file_piece_range(&self, index: usize) -> Option<(u64, u64)> {
        let file = self.files.get(index)?;
        let first = file.offset / self.piece_length;
        let last = (file.offset + file.length.saturating_sub(1)) / self.piece_length;
        Some((first, last))
    }

    /// Magnet link carrying this torrent's identity, name and trackers.
    pub fn magnet_link(&self) -> MagnetLink {
        let mut link = MagnetLink::new(self.info_hash).with_display_name(self.name.clone());
        for tracker in &self.trackers {
            link = link.with_tracker(tracker.url.clone());
        }
        for seed in self.web_seeds.iter().filter(|s| s.kind == WebSeedKind::Bep19) {
            link = link.with_web_seed(seed.url.clone());
        }
        link
    }
}

fn missing(field: &str) -> DescriptorError {
    DescriptorError::InvalidMetainfo(format!("missing or invalid field '{}'", field))
}

fn parse_files(info: &BencodeValue, name: &str) -> DescriptorResult<Vec<FileEntry>> {
    if let Some(length) = info.get("length").and_then(BencodeValue::as_int) {
        return Ok(vec![FileEntry {
            path: name.to_string(),
            length: length.max(0) as u64,
            offset: 0,
            attributes: attributes_of(info),
            symlink: None,
        }]);
    }

    let list = info
        .get("files")
        .and_then(BencodeValue::as_list)
        .ok_or_else(|| missing("info.length or info.files"))?;

    let mut files = Vec::with_capacity(list.len());
    let mut offset = 0u64;
    for entry in list {
        let length = entry
            .get("length")
            .and_then(BencodeValue::as_int)
            .filter(|len| *len >= 0)
            .ok_or_else(|| missing("info.files.length"))? as u64;
        let components: Vec<String> = entry
            .get("path")
            .and_then(BencodeValue::as_list)
            .ok_or_else(|| missing("info.files.path"))?
            .iter()
            .filter_map(BencodeValue::as_string)
            .collect();
        if components.is_empty() {
            return Err(missing("info.files.path"));
        }
        let symlink = entry
            .get("symlink path")
            .and_then(BencodeValue::as_list)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(BencodeValue::as_string)
                    .collect::<Vec<_>>()
                    .join("/")
            });

        let mut path = name.to_string();
        for component in &components {
            path.push('/');
            path.push_str(component);
        }

        files.push(FileEntry {
            path,
            length,
            offset,
            attributes: attributes_of(entry),
            symlink,
        });
        offset = offset.checked_add(length).ok_or_else(|| {
            DescriptorError::InvalidMetainfo("total file length overflows".to_string())
        })?;
    }
    Ok(files)
}

fn attributes_of(value: &BencodeValue) -> FileAttributes {
    value
        .get("attr")
        .and_then(BencodeValue::as_string)
        .map(|attr| FileAttributes::parse(&attr))
        .unwrap_or_default()
}

fn parse_trackers(root: &BencodeValue) -> Vec<TrackerEntry> {
    let mut trackers = Vec::new();
    if let Some(tiers) = root.get("announce-list").and_then(BencodeValue::as_list) {
        for (tier, urls) in tiers.iter().enumerate() {
            for url in urls.as_list().unwrap_or_default() {
                if let Some(url) = url.as_string() {
                    trackers.push(TrackerEntry { tier, url });
                }
            }
        }
    }
    if trackers.is_empty() {
        if let Some(url) = root.get("announce").and_then(BencodeValue::as_string) {
            trackers.push(TrackerEntry { tier: 0, url });
        }
    }
    trackers
}

fn parse_nodes(root: &BencodeValue) -> Vec<(String, i64)> {
    root.get("nodes")
        .and_then(BencodeValue::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|node| {
            let pair = node.as_list()?;
            let host = pair.first()?.as_string()?;
            let port = pair.get(1)?.as_int()?;
            Some((host, port))
        })
        .collect()
}

fn parse_web_seeds(root: &BencodeValue) -> Vec<WebSeed> {
    let mut seeds = Vec::new();
    let mut collect = |key: &str, kind: WebSeedKind| match root.get(key) {
        Some(value @ BencodeValue::Bytes(_)) => {
            if let Some(url) = value.as_string() {
                seeds.push(WebSeed { kind, url });
            }
        }
        Some(BencodeValue::List(urls)) => {
            seeds.extend(
                urls.iter()
                    .filter_map(BencodeValue::as_string)
                    .map(|url| WebSeed { kind, url }),
            );
        }
        _ => {}
    };
    collect("url-list", WebSeedKind::Bep19);
    collect("httpseeds", WebSeedKind::Bep17);
    seeds
}

/// Test fixtures shared with the rest of the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::super::bencode::BencodeValue;

    /// A single-file torrent with one tracker, two pieces of 16 KiB.
    pub fn single_file_torrent(name: &str) -> Vec<u8> {
        let info = BencodeValue::dict()
            .insert("length", BencodeValue::integer(20_000))
            .insert("name", BencodeValue::string(name))
            .insert("piece length", BencodeValue::integer(16_384))
            .insert("pieces", BencodeValue::Bytes(vec![0xab; 40]));
        BencodeValue::dict()
            .insert("announce", BencodeValue::string("http://tracker.example/announce"))
            .insert("comment", BencodeValue::string("fixture"))
            .insert("created by", BencodeValue::string("torkeep tests"))
            .insert("info", info)
            .encode()
    }
}
