//! Links songs to their most recent video recording
//!
//! The recording history is an HTML page made of `<h2>` date headings, each
//! followed by table rows. Cell 0 of a row links to the moment in the video,
//! cell 2 links to the song sheet that was played. Songs are matched by the
//! file stem of that song link.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    archive::{error::ArchiveError, scan::scan_dir},
    domain::{chordpro::title_directive, entry::URL_EXTENSION},
};

static NODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>|<tr[^>]*>(.*?)</tr>").unwrap());
static CELL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").unwrap());
static HREF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#).unwrap());
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static SHEET_EXT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(pdf|chopro|cho)$").unwrap());
static QUALIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*\((live|version|easy|easier|scroll|inline|with.*|in [A-G][b#]?|key .*?)\)\s*$",
    )
    .unwrap()
});

/// First line of sidecars written by this tool
pub const MANAGED_PREFIX: &str = "# Most recent recording:";

const DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Clone, PartialEq, Eq)]
enum HistoryNode {
    DateHeading(String),
    Row(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// `None` when the heading is not a date like "November 4, 2025"
    pub date: Option<NaiveDate>,
    pub date_label: String,
    pub link: String,
}

/// Lowercased song file stem -> recordings, most recent first
pub type RecordingIndex = HashMap<String, Vec<Recording>>;

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn text_of(fragment: &str) -> String {
    let text = TAG_REGEX.replace_all(fragment, "");
    decode_entities(text.trim())
}

fn first_href(fragment: &str) -> Option<String> {
    HREF_REGEX
        .captures(fragment)
        .map(|c| decode_entities(c[1].trim()))
        .filter(|href| !href.is_empty())
}

fn nodes(html: &str) -> impl Iterator<Item = HistoryNode> + '_ {
    NODE_REGEX.captures_iter(html).map(|c| match (c.get(1), c.get(2)) {
        (Some(heading), _) => HistoryNode::DateHeading(text_of(heading.as_str())),
        (_, row) => HistoryNode::Row(
            CELL_REGEX
                .captures_iter(row.map(|m| m.as_str()).unwrap_or_default())
                .map(|cell| cell[1].to_string())
                .collect(),
        ),
    })
}

/// Key of a song link: the decoded file name of the href without its
/// query, fragment and song-sheet extension, lowercased.
pub fn song_key(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let base = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(base)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| base.to_string());
    let key = SHEET_EXT_REGEX.replace(&decoded, "").trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

pub fn parse_history(html: &str) -> RecordingIndex {
    let (_, mut index) = nodes(html).fold(
        (None::<(Option<NaiveDate>, String)>, RecordingIndex::new()),
        |(current, mut index), node| match node {
            HistoryNode::DateHeading(label) => {
                let date = NaiveDate::parse_from_str(&label, DATE_FORMAT).ok();
                (Some((date, label)), index)
            }
            HistoryNode::Row(cells) => {
                if let (Some((date, label)), true) = (&current, cells.len() >= 3) {
                    let link = first_href(&cells[0]);
                    let key = first_href(&cells[2]).and_then(|href| song_key(&href));
                    if let (Some(link), Some(key)) = (link, key) {
                        index.entry(key).or_default().push(Recording {
                            date: *date,
                            date_label: label.clone(),
                            link,
                        });
                    }
                }
                (current, index)
            }
        },
    );

    for recordings in index.values_mut() {
        // stable: same-day recordings keep page order; undated ones go last
        recordings.sort_by_key(|r| Reverse(r.date));
    }
    index
}

/// Title key used to allow one recording sidecar per song
pub fn recording_title_key(title: &str) -> String {
    let title = SHEET_EXT_REGEX.replace(title.trim(), "");
    let title = QUALIFIER_REGEX.replace(&title, "");
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, PartialEq, Eq)]
pub enum SidecarState {
    Missing,
    /// Written by this tool; holds the first line
    Managed(String),
    /// Written by hand, never modified
    Manual,
}

pub fn sidecar_state(path: &Path) -> SidecarState {
    if !path.exists() {
        return SidecarState::Missing;
    }
    match fs::read_to_string(path) {
        Ok(contents) => {
            let first = contents.lines().next().unwrap_or_default().trim();
            if first.starts_with(MANAGED_PREFIX) {
                SidecarState::Managed(first.to_string())
            } else {
                SidecarState::Manual
            }
        }
        Err(err) => {
            warn!("could not read {}: {err}", path.to_string_lossy());
            SidecarState::Manual
        }
    }
}

fn sidecar_contents(recording: &Recording) -> String {
    format!(
        "{MANAGED_PREFIX} {}\n{}\n",
        recording.date_label, recording.link
    )
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub songs: usize,
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub unchanged: usize,
    pub removed_stale: Vec<PathBuf>,
    pub removed_duplicates: Vec<PathBuf>,
    /// Managed sidecars sharing a file stem with a newer one
    pub removed_stem_duplicates: Vec<PathBuf>,
    pub without_recording: usize,
}

struct Candidate {
    sheet: PathBuf,
    recording: Recording,
}

fn remove_managed(path: &Path, dry_run: bool) -> bool {
    if !matches!(sidecar_state(path), SidecarState::Managed(_)) {
        return false;
    }
    if dry_run {
        return true;
    }
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to remove {}: {err}", path.to_string_lossy());
            false
        }
    }
}

/// Writes one `.urltxt` sidecar per song title pointing at its most recent
/// recording and removes sidecars this tool wrote that no longer apply.
pub fn sync_recording_links(
    chordpro_dir: &Path,
    index: &RecordingIndex,
    dry_run: bool,
) -> Result<SyncReport, ArchiveError> {
    let mut sheets = scan_dir(chordpro_dir, false)?
        .into_iter()
        .filter(|f| f.extension == "chopro")
        .collect::<Vec<_>>();
    sheets.sort();

    let mut report = SyncReport {
        songs: sheets.len(),
        ..Default::default()
    };
    let mut by_title: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

    for sheet in sheets {
        let title = match fs::read_to_string(&sheet.path) {
            Ok(content) => title_directive(&content).unwrap_or_else(|| sheet.stem.clone()),
            Err(err) => {
                warn!("could not read {}: {err}", sheet.path.to_string_lossy());
                sheet.stem.clone()
            }
        };

        match index.get(&sheet.stem.to_lowercase()).and_then(|r| r.first()) {
            Some(recording) => by_title
                .entry(recording_title_key(&title))
                .or_default()
                .push(Candidate {
                    sheet: sheet.path,
                    recording: recording.clone(),
                }),
            None => {
                report.without_recording += 1;
                let sidecar = sheet.path.with_extension("urltxt");
                if remove_managed(&sidecar, dry_run) {
                    info!("REMOVED (stale): {}", sidecar.to_string_lossy());
                    report.removed_stale.push(sidecar);
                }
            }
        }
    }

    for (title, mut candidates) in by_title {
        candidates.sort_by(|a, b| {
            (Reverse(a.recording.date), &a.sheet).cmp(&(Reverse(b.recording.date), &b.sheet))
        });

        let winner = &candidates[0];
        let sidecar = winner.sheet.with_extension("urltxt");
        let contents = sidecar_contents(&winner.recording);
        let expected_first = contents.lines().next().unwrap_or_default();

        let action = match sidecar_state(&sidecar) {
            SidecarState::Missing => Some(true),
            SidecarState::Managed(first) if first != expected_first => Some(false),
            SidecarState::Managed(_) | SidecarState::Manual => None,
        };

        match action {
            Some(is_new) => {
                if !dry_run {
                    fs::write(&sidecar, contents).map_err(|source| ArchiveError::Output {
                        path: sidecar.clone(),
                        source,
                    })?;
                }
                let verb = if is_new { "CREATED" } else { "UPDATED" };
                info!(
                    "{verb} ({title}): {} -> {}",
                    sidecar.to_string_lossy(),
                    winner.recording.date_label
                );
                if is_new {
                    report.created.push(sidecar);
                } else {
                    report.updated.push(sidecar);
                }
            }
            None => report.unchanged += 1,
        }

        for duplicate in &candidates[1..] {
            let sidecar = duplicate.sheet.with_extension("urltxt");
            if remove_managed(&sidecar, dry_run) {
                info!("REMOVED (duplicate title): {}", sidecar.to_string_lossy());
                report.removed_duplicates.push(sidecar);
            }
        }
    }

    let removed = report
        .removed_stale
        .iter()
        .chain(&report.removed_duplicates)
        .cloned()
        .collect::<HashSet<_>>();
    report.removed_stem_duplicates = remove_stem_duplicates(chordpro_dir, &removed, dry_run)?;

    Ok(report)
}

/// Recording date written in the first line of a managed sidecar
fn managed_date(first_line: &str) -> Option<NaiveDate> {
    let label = first_line.strip_prefix(MANAGED_PREFIX)?.trim();
    NaiveDate::parse_from_str(label, DATE_FORMAT).ok()
}

/// Removes managed sidecars that share a file stem, keeping the newest
/// recording date (ties go to the first path).
fn remove_stem_duplicates(
    chordpro_dir: &Path,
    already_removed: &HashSet<PathBuf>,
    dry_run: bool,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut by_stem: BTreeMap<String, Vec<(Option<NaiveDate>, PathBuf)>> = BTreeMap::new();
    for file in scan_dir(chordpro_dir, false)? {
        if file.extension != URL_EXTENSION || already_removed.contains(&file.path) {
            continue;
        }
        if let SidecarState::Managed(first) = sidecar_state(&file.path) {
            by_stem
                .entry(file.stem.trim().to_lowercase())
                .or_default()
                .push((managed_date(&first), file.path));
        }
    }

    let mut removed = Vec::new();
    for mut sidecars in by_stem.into_values() {
        sidecars.sort_by(|a, b| (Reverse(a.0), &a.1).cmp(&(Reverse(b.0), &b.1)));
        for (_, path) in sidecars.into_iter().skip(1) {
            if remove_managed(&path, dry_run) {
                info!("REMOVED (duplicate stem): {}", path.to_string_lossy());
                removed.push(path);
            }
        }
    }
    Ok(removed)
}
