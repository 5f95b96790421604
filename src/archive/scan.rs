//! Module to scan the song archive in the file system

use chrono::{DateTime, Local};
use log::warn;
use walkdir::WalkDir;

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    archive::error::ArchiveError,
    domain::entry::{ARCHIVE_EXTENSIONS, FileEntry, extension_of},
};

pub fn is_archive_file(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| ARCHIVE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

#[derive(Debug)]
pub struct ScanSnapshot {
    pub root: PathBuf,
    pub observed_at: DateTime<Local>,
    pub files: Vec<FileEntry>,
}

impl ScanSnapshot {
    pub fn scan(root: &Path, follow_symlinks: bool) -> Result<Self, ArchiveError> {
        let observed_at = Local::now();
        let files = scan_dir(root, follow_symlinks)?;
        Ok(Self {
            root: root.to_path_buf(),
            observed_at,
            files,
        })
    }
}

/// Recursively collects every archive file below `root`, in no particular order.
///
/// Entries that cannot be read are logged and skipped. `walkdir` reports
/// symlink loops as errors, so a cycle is skipped the same way. Symlinks to
/// files are kept even when directory links are not followed.
pub fn scan_dir(root: &Path, follow_symlinks: bool) -> Result<Vec<FileEntry>, ArchiveError> {
    if !root.is_dir() {
        return Err(ArchiveError::RootNotFound(root.to_path_buf()));
    }
    let root_str = root.to_string_lossy();

    let files = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("error while scanning dir {root_str}, skipping an entry: {err}");
                None
            }
        })
        .filter(|e| {
            e.file_type().is_file()
                || (e.path_is_symlink() && fs::metadata(e.path()).is_ok_and(|m| m.is_file()))
        })
        .map(|e| e.into_path())
        .filter(|path| is_archive_file(path))
        .filter_map(FileEntry::from_path)
        .collect();

    Ok(files)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn scan_finds_archive_files_only() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let sheet = root.join("Jambalaya.chopro");
        let pdf = root.join("Jambalaya.PDF");
        let hide = root.join("Jambalaya.hide");
        let notes = root.join("notes.txt");

        fs::write(&sheet, b"{title: Jambalaya}").unwrap();
        fs::write(&pdf, b"%PDF").unwrap();
        fs::write(&hide, b"").unwrap();
        fs::write(&notes, b"ignore me").unwrap();

        let files = scan_dir(root, false).unwrap();

        assert_eq!(files.len(), 3);
        let paths: Vec<_> = files.iter().map(|f| f.path.as_path()).collect();
        assert!(paths.contains(&sheet.as_path()));
        assert!(paths.contains(&pdf.as_path()));
        assert!(paths.contains(&hide.as_path()));
        assert!(!paths.contains(&notes.as_path()));
    }

    #[test]
    fn scan_descends_into_subfolders() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("2024").join("Fall");
        fs::create_dir_all(&nested).unwrap();
        let song = nested.join("Blue Moon.cho");
        fs::write(&song, b"[C]Blue moon").unwrap();

        let snapshot = ScanSnapshot::scan(tmp.path(), false).unwrap();

        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].path, song);
        assert_eq!(snapshot.files[0].extension, "cho");
        assert_eq!(snapshot.root, tmp.path());
    }

    #[test]
    fn folder_named_like_a_song_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("odd.pdf")).unwrap();

        let files = scan_dir(tmp.path(), false).unwrap();

        assert!(files.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = scan_dir(&missing, false).unwrap_err();

        assert!(matches!(err, ArchiveError::RootNotFound(p) if p == missing));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_song_file_is_kept() -> anyhow::Result<()> {
        let outside = TempDir::new()?;
        let target = outside.path().join("Real.pdf");
        fs::write(&target, b"%PDF")?;

        let tmp = TempDir::new()?;
        let link = tmp.path().join("Linked.pdf");
        std::os::unix::fs::symlink(&target, &link)?;
        std::os::unix::fs::symlink(
            outside.path().join("gone.pdf"),
            tmp.path().join("Dangling.pdf"),
        )?;

        let files = scan_dir(tmp.path(), false)?;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, link);
        assert_eq!(files[0].stem, "Linked");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subfolder_does_not_stop_the_scan() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new()?;
        let locked = tmp.path().join("locked");
        fs::create_dir_all(&locked)?;
        fs::write(locked.join("Secret.pdf"), b"%PDF")?;
        let song = tmp.path().join("Open.pdf");
        fs::write(&song, b"%PDF")?;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

        let scanned = scan_dir(tmp.path(), false);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        let files = scanned?;
        assert!(files.iter().any(|f| f.path == song));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_scanned_once() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let songs = tmp.path().join("songs");
        fs::create_dir_all(&songs)?;
        fs::write(songs.join("Loop.chopro"), b"[C]")?;
        std::os::unix::fs::symlink(tmp.path(), songs.join("back"))?;

        let files = scan_dir(tmp.path(), true)?;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, songs.join("Loop.chopro"));
        Ok(())
    }
}
