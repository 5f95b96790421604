//! Generation of the song archive page

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;

use crate::archive::{
    classify::{
        Classification, FilterMode, Markers, TitleGroup, VersionSet, classify, group_by_title,
    },
    error::ArchiveError,
    render::{PageOptions, render_page},
    scan::ScanSnapshot,
    timestamps::{CommitHistory, TimestampResolver},
};

pub mod classify;
pub mod error;
pub mod render;
pub mod scan;
pub mod timestamps;

/// Everything known about one scan of the archive
#[derive(Debug)]
pub struct ArchiveIndex {
    pub snapshot: ScanSnapshot,
    pub markers: Markers,
    pub classification: Classification,
    pub groups: Vec<TitleGroup>,
}

impl ArchiveIndex {
    pub fn build(
        root: &Path,
        follow_symlinks: bool,
        mode: FilterMode,
        history: &dyn CommitHistory,
    ) -> Result<Self, ArchiveError> {
        let snapshot = ScanSnapshot::scan(root, follow_symlinks)?;
        info!("Found {} archive files", snapshot.files.len());

        let markers = Markers::collect(&snapshot.files);
        let resolver = TimestampResolver::new(history, &snapshot.root);
        let classification = classify(&snapshot.files, &markers, mode, &resolver);
        let groups = group_by_title(&snapshot.files);

        Ok(Self {
            snapshot,
            markers,
            classification,
            groups,
        })
    }

    pub fn report(&self) -> ArchiveReport<'_> {
        let groups = self
            .groups
            .iter()
            .map(|group| GroupReport {
                key: &group.key,
                title: &group.title,
                easy: group.is_easy(&self.markers),
                has_hidden_versions: group.has_hidden_versions(&self.classification),
                files: group
                    .links()
                    .into_iter()
                    .map(|f| FileReport {
                        path: &f.path,
                        extension: &f.extension,
                        hidden_by_hide: self.classification.hidden_by_hide.contains(&f.path),
                        hidden_by_timestamp: self
                            .classification
                            .hidden_by_timestamp
                            .contains(&f.path),
                        hidden: self.classification.is_hidden(f),
                    })
                    .collect(),
            })
            .collect();

        ArchiveReport {
            mode: self.classification.mode,
            scanned_at: self.snapshot.observed_at.to_rfc3339(),
            files: self.snapshot.files.len(),
            groups,
            version_sets: &self.classification.version_sets,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArchiveReport<'a> {
    pub mode: FilterMode,
    pub scanned_at: String,
    pub files: usize,
    pub groups: Vec<GroupReport<'a>>,
    pub version_sets: &'a [VersionSet],
}

#[derive(Debug, Serialize)]
pub struct GroupReport<'a> {
    pub key: &'a str,
    pub title: &'a str,
    pub easy: bool,
    pub has_hidden_versions: bool,
    pub files: Vec<FileReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FileReport<'a> {
    pub path: &'a Path,
    pub extension: &'a str,
    pub hidden_by_hide: bool,
    pub hidden_by_timestamp: bool,
    pub hidden: bool,
}

/// Inputs of one archive page generation
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub music_dir: PathBuf,
    pub output: PathBuf,
    pub header_template: PathBuf,
    pub intro: bool,
    pub mode: FilterMode,
    pub follow_symlinks: bool,
}

#[derive(Debug)]
pub struct GenerateSummary {
    pub files: usize,
    pub rows: usize,
    pub hidden: usize,
    pub skipped_links: Vec<PathBuf>,
}

/// Scans the archive and writes the page in one go.
///
/// The output file is only touched after every row has been rendered.
pub fn generate(
    request: &GenerateRequest,
    history: &dyn CommitHistory,
    now: DateTime<Local>,
) -> Result<GenerateSummary, ArchiveError> {
    let header = std::fs::read_to_string(&request.header_template).map_err(|source| {
        ArchiveError::HeaderTemplate {
            path: request.header_template.clone(),
            source,
        }
    })?;

    let index = ArchiveIndex::build(
        &request.music_dir,
        request.follow_symlinks,
        request.mode,
        history,
    )?;

    let options = PageOptions {
        header: &header,
        intro: request.intro,
        mode: request.mode,
        generated_at: now,
    };
    let page = render_page(
        &index.groups,
        &index.markers,
        &index.classification,
        &options,
    );

    std::fs::write(&request.output, &page.html).map_err(|source| ArchiveError::Output {
        path: request.output.clone(),
        source,
    })?;

    Ok(GenerateSummary {
        files: index.snapshot.files.len(),
        rows: page.rows,
        hidden: index.classification.effective_hidden.len(),
        skipped_links: page.skipped_links,
    })
}
