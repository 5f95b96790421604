use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::title::normalize;

pub const HIDE_EXTENSION: &str = "hide";
pub const EASY_EXTENSION: &str = "easy";
pub const URL_EXTENSION: &str = "urltxt";
pub const CHORDPRO_EXTENSIONS: &[&str] = &["chopro", "cho"];

/// Extensions picked up by the archive scan
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    "pdf",
    "chopro",
    "cho",
    "mscz",
    URL_EXTENSION,
    HIDE_EXTENSION,
    EASY_EXTENSION,
];

/// Lowercased extension of a path, without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// A file found by the archive scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub stem: String,
    pub extension: String,
    pub parent: PathBuf,
}

impl FileEntry {
    /// Returns `None` for paths without a usable file name
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let stem = path.file_stem()?.to_string_lossy().into_owned();
        let extension = extension_of(&path).unwrap_or_default();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Some(Self {
            path,
            stem,
            extension,
            parent,
        })
    }

    pub fn title_key(&self) -> String {
        normalize(&self.stem)
    }

    pub fn is_marker(&self) -> bool {
        self.extension == HIDE_EXTENSION || self.extension == EASY_EXTENSION
    }

    pub fn is_chordpro(&self) -> bool {
        CHORDPRO_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn marker_key(&self) -> MarkerKey {
        MarkerKey {
            parent: self.parent.clone(),
            stem_key: self.title_key(),
        }
    }

    /// Path with forward slashes, as used in links and for sorting
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    /// Key used to order links inside a row
    pub fn link_sort_key(&self) -> (String, String) {
        (self.extension.clone(), self.display_path().to_lowercase())
    }
}

/// Identifies the siblings a marker file applies to: same folder, same stem
/// regardless of case, punctuation or extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerKey {
    pub parent: PathBuf,
    pub stem_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_from_path_splits_components() {
        let entry = FileEntry::from_path(PathBuf::from("music/2024/The Boxer.PDF")).unwrap();
        assert_eq!(entry.stem, "The Boxer");
        assert_eq!(entry.extension, "pdf");
        assert_eq!(entry.parent, PathBuf::from("music/2024"));
        assert_eq!(entry.title_key(), "boxer");
    }

    #[test]
    fn markers_match_across_case_and_extension() {
        let song = FileEntry::from_path(PathBuf::from("m/Let It Be.chopro")).unwrap();
        let hide = FileEntry::from_path(PathBuf::from("m/let it be.hide")).unwrap();
        assert!(hide.is_marker());
        assert!(!song.is_marker());
        assert_eq!(song.marker_key(), hide.marker_key());
    }

    #[test]
    fn markers_do_not_match_other_folders() {
        let song = FileEntry::from_path(PathBuf::from("a/Song.pdf")).unwrap();
        let hide = FileEntry::from_path(PathBuf::from("b/Song.hide")).unwrap();
        assert_ne!(song.marker_key(), hide.marker_key());
    }
}
