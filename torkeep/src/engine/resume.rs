//! Resume data: verified progress of one download.
//!
//! Engines hand resume data to the supervisor in checkpoint events and take
//! it back on submit. On disk it is an opaque blob produced by
//! [`TransferEngine::encode_resume`](super::TransferEngine::encode_resume);
//! the default encoding is a bencoded dictionary:
//!
//! ```text
//! d
//!   11:file-format    18:torkeep resume file
//!   12:file-version   i1e
//!   9:info-hash       20:<raw sha1>
//!   4:name            ...
//!   9:save_path       ...
//!   10:num_pieces     i..e
//!   6:pieces          <bitfield, msb first>
//!   10:total_done     i..e
//!   10:total_size     i..e
//!   5:peers           <6 bytes per ipv4 peer>
//! e
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;

use super::error::{EngineError, EngineResult};
use crate::descriptor::bencode::BencodeValue;
use crate::descriptor::InfoHash;

const FILE_FORMAT: &str = "torkeep resume file";
const FILE_VERSION: i64 = 1;

/// Verified progress of one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeData {
    /// Identity the progress belongs to.
    pub info_hash: InfoHash,
    pub name: String,
    pub save_path: PathBuf,
    pub num_pieces: usize,
    /// Piece completion bitmap, most significant bit first.
    pub pieces: Vec<u8>,
    pub total_done: u64,
    pub total_size: u64,
    /// Peer cache.
    pub peers: Vec<SocketAddrV4>,
}

impl ResumeData {
    /// Empty progress for a download with `num_pieces` pieces.
    pub fn new(info_hash: InfoHash, name: impl Into<String>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            info_hash,
            name: name.into(),
            save_path: save_path.into(),
            num_pieces: 0,
            pieces: Vec::new(),
            total_done: 0,
            total_size: 0,
            peers: Vec::new(),
        }
    }

    pub fn with_num_pieces(mut self, num_pieces: usize) -> Self {
        self.num_pieces = num_pieces;
        self.pieces = vec![0; num_pieces.div_ceil(8)];
        self
    }

    pub fn with_total_size(mut self, total_size: u64) -> Self {
        self.total_size = total_size;
        self
    }

    pub fn has_piece(&self, index: usize) -> bool {
        index < self.num_pieces
            && self
                .pieces
                .get(index / 8)
                .is_some_and(|byte| byte & (0x80 >> (index % 8)) != 0)
    }

    pub fn set_piece(&mut self, index: usize) {
        if index < self.num_pieces {
            if let Some(byte) = self.pieces.get_mut(index / 8) {
                *byte |= 0x80 >> (index % 8);
            }
        }
    }

    /// Number of pieces marked complete.
    pub fn pieces_done(&self) -> usize {
        (0..self.num_pieces).filter(|i| self.has_piece(*i)).count()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut peers = Vec::with_capacity(self.peers.len() * 6);
        for peer in &self.peers {
            peers.extend_from_slice(&peer.ip().octets());
            peers.extend_from_slice(&peer.port().to_be_bytes());
        }
        BencodeValue::dict()
            .insert("file-format", BencodeValue::string(FILE_FORMAT))
            .insert("file-version", BencodeValue::integer(FILE_VERSION))
            .insert(
                "info-hash",
                BencodeValue::Bytes(self.info_hash.as_bytes().to_vec()),
            )
            .insert("name", BencodeValue::string(&self.name))
            .insert(
                "save_path",
                BencodeValue::string(&self.save_path.to_string_lossy()),
            )
            .insert("num_pieces", BencodeValue::integer(self.num_pieces as i64))
            .insert("pieces", BencodeValue::Bytes(self.pieces.clone()))
            .insert("total_done", BencodeValue::integer(self.total_done as i64))
            .insert("total_size", BencodeValue::integer(self.total_size as i64))
            .insert("peers", BencodeValue::Bytes(peers))
            .encode()
    }

    pub fn decode(blob: &[u8]) -> EngineResult<Self> {
        let invalid = |msg: &str| EngineError::InvalidResume(msg.to_string());

        let root = BencodeValue::decode(blob).map_err(|e| EngineError::InvalidResume(e.to_string()))?;
        if root.get("file-format").and_then(BencodeValue::as_string).as_deref() != Some(FILE_FORMAT) {
            return Err(invalid("unrecognised file format"));
        }
        match root.get("file-version").and_then(BencodeValue::as_int) {
            Some(FILE_VERSION) => {}
            other => {
                return Err(EngineError::InvalidResume(format!(
                    "unsupported file version {:?}",
                    other
                )))
            }
        }

        let info_hash = root
            .get("info-hash")
            .and_then(BencodeValue::as_bytes)
            .and_then(InfoHash::from_slice)
            .ok_or_else(|| invalid("missing info-hash"))?;
        let num_pieces = root
            .get("num_pieces")
            .and_then(BencodeValue::as_int)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| invalid("missing num_pieces"))?;
        let pieces = root
            .get("pieces")
            .and_then(BencodeValue::as_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        if pieces.len() != num_pieces.div_ceil(8) {
            return Err(invalid("piece bitmap does not match num_pieces"));
        }
        let peers = root
            .get("peers")
            .and_then(BencodeValue::as_bytes)
            .unwrap_or_default()
            .chunks_exact(6)
            .map(|c| {
                SocketAddrV4::new(
                    Ipv4Addr::new(c[0], c[1], c[2], c[3]),
                    u16::from_be_bytes([c[4], c[5]]),
                )
            })
            .collect();
        let non_negative = |key: &str| {
            root.get(key)
                .and_then(BencodeValue::as_int)
                .map(|n| n.max(0) as u64)
                .unwrap_or(0)
        };

        Ok(Self {
            info_hash,
            name: root
                .get("name")
                .and_then(BencodeValue::as_string)
                .unwrap_or_default(),
            save_path: root
                .get("save_path")
                .and_then(BencodeValue::as_string)
                .map(PathBuf::from)
                .unwrap_or_default(),
            num_pieces,
            pieces,
            total_done: non_negative("total_done"),
            total_size: non_negative("total_size"),
            peers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> InfoHash {
        InfoHash::new([byte; 20])
    }

    #[test]
    fn test_piece_bitmap() {
        let mut data = ResumeData::new(hash(1), "x", "/save").with_num_pieces(10);
        assert_eq!(data.pieces.len(), 2);
        data.set_piece(0);
        data.set_piece(9);
        data.set_piece(10); // out of range, ignored
        assert!(data.has_piece(0));
        assert!(data.has_piece(9));
        assert!(!data.has_piece(1));
        assert_eq!(data.pieces_done(), 2);
        assert_eq!(data.pieces, vec![0x80, 0x40]);
    }

    #[test]
    fn test_encode_decode_preserves_identity_and_progress() {
        let mut data = ResumeData::new(hash(9), "movie", "/downloads")
            .with_num_pieces(3)
            .with_total_size(3000);
        data.set_piece(1);
        data.total_done = 1000;
        data.peers.push(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 6881));

        let decoded = ResumeData::decode(&data.encode()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_rejects_foreign_format() {
        let blob = BencodeValue::dict()
            .insert("file-format", BencodeValue::string("libtorrent resume file"))
            .encode();
        let err = ResumeData::decode(&blob).unwrap_err();
        assert!(matches!(err, EngineError::InvalidResume(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        let blob = ResumeData::new(hash(1), "x", "/s").encode();
        assert!(ResumeData::decode(&blob[..blob.len() / 2]).is_err());
    }

    #[test]
    fn test_decode_rejects_bitmap_mismatch() {
        let mut data = ResumeData::new(hash(1), "x", "/s").with_num_pieces(16);
        data.pieces.pop();
        assert!(ResumeData::decode(&data.encode()).is_err());
    }
}
