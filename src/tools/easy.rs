//! Marks songs with few distinct chords as easy

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    archive::{error::ArchiveError, scan::scan_dir},
    domain::{chordpro::distinct_chords, entry::EASY_EXTENSION},
};

#[derive(Debug)]
pub struct EasySong {
    pub path: PathBuf,
    pub chords: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct EasyReport {
    pub analyzed: usize,
    pub easy: Vec<EasySong>,
    pub created: Vec<PathBuf>,
    pub already_marked: Vec<PathBuf>,
    pub errors: Vec<PathBuf>,
}

/// Creates an `.easy` marker next to every ChordPro sheet below `root` that
/// uses between one and `max_chords` distinct chords.
pub fn mark_easy_songs(
    root: &Path,
    max_chords: usize,
    dry_run: bool,
) -> Result<EasyReport, ArchiveError> {
    let mut sheets = scan_dir(root, false)?
        .into_iter()
        .filter(|f| f.is_chordpro())
        .collect::<Vec<_>>();
    sheets.sort();

    let mut report = EasyReport {
        analyzed: sheets.len(),
        ..Default::default()
    };

    for sheet in sheets {
        let content = match fs::read_to_string(&sheet.path) {
            Ok(c) => c,
            Err(err) => {
                warn!("error reading {}: {err}", sheet.path.to_string_lossy());
                report.errors.push(sheet.path);
                continue;
            }
        };

        let chords = distinct_chords(&content);
        if chords.is_empty() || chords.len() > max_chords {
            continue;
        }

        let marker = sheet.path.with_extension(EASY_EXTENSION);
        if marker.exists() {
            report.already_marked.push(sheet.path.clone());
        } else if dry_run {
            report.created.push(marker);
        } else {
            match fs::write(&marker, b"") {
                Ok(()) => {
                    info!(
                        "Created .easy marker for: {} ({} chords: {})",
                        sheet.stem,
                        chords.len(),
                        chords.iter().cloned().collect::<Vec<_>>().join(", ")
                    );
                    report.created.push(marker);
                }
                Err(err) => {
                    warn!("error creating {}: {err}", marker.to_string_lossy());
                    report.errors.push(sheet.path.clone());
                }
            }
        }

        report.easy.push(EasySong {
            path: sheet.path,
            chords,
        });
    }

    Ok(report)
}
