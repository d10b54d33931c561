//! Plain-text torrent information report.

use std::fmt::Write;

use super::metainfo::WebSeedKind;
use super::Descriptor;

/// Render the information report for a descriptor.
///
/// Magnet sources only know their identity until the engine has fetched the
/// metadata, so their report is shorter.
pub(super) fn render(descriptor: &Descriptor) -> String {
    let mut out = String::new();
    let Some(meta) = descriptor.metainfo() else {
        let _ = writeln!(out, "info hash: {}", descriptor.info_hash());
        let _ = writeln!(out, "name: {}", descriptor.name());
        let _ = writeln!(out, "magnet link: {}", descriptor.magnet());
        if !descriptor.magnet().trackers.is_empty() {
            out.push_str("trackers:\n");
            for url in &descriptor.magnet().trackers {
                let _ = writeln!(out, " 0: {}", url);
            }
        }
        out.push_str("metadata: not yet available\n");
        return out;
    };

    if !meta.nodes.is_empty() {
        out.push_str("nodes:\n");
        for (host, port) in &meta.nodes {
            let _ = writeln!(out, "{}: {}", host, port);
        }
    }
    if !meta.trackers.is_empty() {
        out.push_str("trackers:\n");
        for tracker in &meta.trackers {
            let _ = writeln!(out, "{:2}: {}", tracker.tier, tracker.url);
        }
    }

    let _ = writeln!(out, "number of pieces: {}", meta.num_pieces);
    let _ = writeln!(out, "piece length: {}", meta.piece_length);
    let _ = writeln!(out, "info hash: {}", meta.info_hash);
    let _ = writeln!(out, "comment: {}", meta.comment.as_deref().unwrap_or(""));
    let _ = writeln!(out, "created by: {}", meta.created_by.as_deref().unwrap_or(""));
    let _ = writeln!(out, "magnet link: {}", descriptor.magnet());
    let _ = writeln!(out, "name: {}", meta.name);
    let _ = writeln!(out, "number of files: {}", meta.files.len());
    out.push_str("files:\n");
    for (index, file) in meta.files.iter().enumerate() {
        // pad files are an artifact of piece alignment
        if file.attributes.pad {
            continue;
        }
        let (first, last) = meta.file_piece_range(index).unwrap_or((0, 0));
        let flag = |set: bool, c: char| if set { c } else { '-' };
        let _ = write!(
            out,
            " {:8x} {:11} {}{}{}{} [ {:5}, {:5} ] {}",
            file.offset,
            file.length,
            flag(file.attributes.pad, 'p'),
            flag(file.attributes.executable, 'x'),
            flag(file.attributes.hidden, 'h'),
            flag(file.attributes.symlink, 'l'),
            first,
            last,
            file.path,
        );
        if let Some(target) = file.symlink.as_deref().filter(|_| file.attributes.symlink) {
            let _ = write!(out, " -> {}", target);
        }
        out.push('\n');
    }

    out.push_str("web seeds:\n");
    for seed in &meta.web_seeds {
        let kind = match seed.kind {
            WebSeedKind::Bep19 => "BEP19",
            WebSeedKind::Bep17 => "BEP17",
        };
        let _ = writeln!(out, "{} {}", kind, seed.url);
    }
    out
}
