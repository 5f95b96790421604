//! Decides which archive files are shown by default

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashSet},
    path::PathBuf,
};

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    archive::timestamps::{SecondsSinceUnix, TimestampResolver},
    domain::entry::{EASY_EXTENSION, FileEntry, HIDE_EXTENSION, MarkerKey},
};

/// Which files are hidden by default in the generated page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Show every file
    None,
    /// Hide files that have a `.hide` marker
    Hidden,
    /// Hide marked files and all but the newest version of each file
    #[default]
    Timestamp,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::None => "none",
            FilterMode::Hidden => "hidden",
            FilterMode::Timestamp => "timestamp",
        }
    }
}

/// `.hide` and `.easy` markers of one scan
#[derive(Debug, Default)]
pub struct Markers {
    pub hide: HashSet<MarkerKey>,
    pub easy: HashSet<MarkerKey>,
}

impl Markers {
    pub fn collect(files: &[FileEntry]) -> Self {
        let mut markers = Self::default();
        for file in files {
            match file.extension.as_str() {
                HIDE_EXTENSION => {
                    markers.hide.insert(file.marker_key());
                }
                EASY_EXTENSION => {
                    markers.easy.insert(file.marker_key());
                }
                _ => {}
            }
        }
        markers
    }

    pub fn is_hidden(&self, file: &FileEntry) -> bool {
        self.hide.contains(&file.marker_key())
    }

    pub fn is_easy(&self, file: &FileEntry) -> bool {
        self.easy.contains(&file.marker_key())
    }
}

/// Files of one title sharing an extension, newest first
#[derive(Debug, Clone, Serialize)]
pub struct VersionSet {
    pub title_key: String,
    pub extension: String,
    pub ranked: Vec<(PathBuf, SecondsSinceUnix)>,
}

impl VersionSet {
    pub fn kept(&self) -> Option<&PathBuf> {
        self.ranked.first().map(|(path, _)| path)
    }
}

#[derive(Debug, Default)]
pub struct Classification {
    pub mode: FilterMode,
    pub hidden_by_hide: BTreeSet<PathBuf>,
    pub hidden_by_timestamp: BTreeSet<PathBuf>,
    /// Files not shown until the reader asks for all versions
    pub effective_hidden: BTreeSet<PathBuf>,
    pub version_sets: Vec<VersionSet>,
}

impl Classification {
    pub fn is_hidden(&self, file: &FileEntry) -> bool {
        self.effective_hidden.contains(&file.path)
    }
}

/// Groups link files by (title key, extension), keeping only groups with
/// more than one member.
pub fn duplicate_sets(files: &[FileEntry]) -> BTreeMap<(String, String), Vec<&FileEntry>> {
    let mut by_key: BTreeMap<(String, String), Vec<&FileEntry>> = BTreeMap::new();
    for file in files.iter().filter(|f| !f.is_marker()) {
        by_key
            .entry((file.title_key(), file.extension.clone()))
            .or_default()
            .push(file);
    }
    by_key.retain(|_, set| set.len() > 1);
    by_key
}

pub fn classify(
    files: &[FileEntry],
    markers: &Markers,
    mode: FilterMode,
    resolver: &TimestampResolver,
) -> Classification {
    let hidden_by_hide: BTreeSet<PathBuf> = files
        .iter()
        .filter(|f| !f.is_marker() && markers.is_hidden(f))
        .map(|f| f.path.clone())
        .collect();

    let duplicates = duplicate_sets(files);
    let needing_timestamps = duplicates
        .values()
        .flatten()
        .map(|f| f.path.clone())
        .collect::<Vec<_>>();

    let timestamps = if needing_timestamps.is_empty() {
        Default::default()
    } else {
        info!(
            "Fetching git timestamps for {} files with duplicates...",
            needing_timestamps.len()
        );
        resolver.resolve(&needing_timestamps)
    };

    let mut hidden_by_timestamp = BTreeSet::new();
    let mut version_sets = Vec::new();
    for ((title_key, extension), set) in duplicates {
        let mut ranked = set
            .into_iter()
            .map(|f| (f.path.clone(), timestamps.get(&f.path).copied().unwrap_or(0)))
            .collect::<Vec<_>>();
        ranked.sort_by(|(pa, ta), (pb, tb)| (Reverse(ta), pa).cmp(&(Reverse(tb), pb)));

        info!("Multiple versions found for {title_key}.{extension}:");
        for (i, (path, ts)) in ranked.iter().enumerate() {
            let marker = if i == 0 { "* KEPT" } else { "  ignored" };
            info!("  {marker}: {} (timestamp: {ts})", path.to_string_lossy());
        }

        hidden_by_timestamp.extend(ranked.iter().skip(1).map(|(p, _)| p.clone()));
        version_sets.push(VersionSet {
            title_key,
            extension,
            ranked,
        });
    }

    let effective_hidden = match mode {
        FilterMode::None => BTreeSet::new(),
        FilterMode::Hidden => hidden_by_hide.clone(),
        FilterMode::Timestamp => &hidden_by_hide | &hidden_by_timestamp,
    };

    Classification {
        mode,
        hidden_by_hide,
        hidden_by_timestamp,
        effective_hidden,
        version_sets,
    }
}

/// All files sharing one title key; the unit rendered as a table row
#[derive(Debug, Clone)]
pub struct TitleGroup {
    pub key: String,
    /// Stem of the first file seen, in path order
    pub title: String,
    pub files: Vec<FileEntry>,
}

impl TitleGroup {
    /// Files rendered as links, ordered by extension then path
    pub fn links(&self) -> Vec<&FileEntry> {
        let mut links = self
            .files
            .iter()
            .filter(|f| !f.is_marker())
            .collect::<Vec<_>>();
        links.sort_by_key(|f| f.link_sort_key());
        links
    }

    pub fn is_easy(&self, markers: &Markers) -> bool {
        self.files.iter().any(|f| markers.is_easy(f))
    }

    pub fn has_hidden_versions(&self, classification: &Classification) -> bool {
        self.files
            .iter()
            .any(|f| !f.is_marker() && classification.is_hidden(f))
    }
}

/// Partitions files into title groups sorted by title key.
pub fn group_by_title(files: &[FileEntry]) -> Vec<TitleGroup> {
    let mut ordered = files.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|f| (f.display_path().to_lowercase(), f.path.clone()));

    let mut groups: BTreeMap<String, TitleGroup> = BTreeMap::new();
    for file in ordered {
        let key = file.title_key();
        groups
            .entry(key.clone())
            .or_insert_with(|| TitleGroup {
                key,
                title: file.stem.clone(),
                files: Vec::new(),
            })
            .files
            .push(file.clone());
    }

    groups.into_values().collect()
}
