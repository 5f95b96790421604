//! Timestamps used to decide which duplicate version of a song is the newest

use std::{
    collections::HashMap,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::mpsc,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use log::{debug, warn};

use crate::archive::error::HistoryError;

pub type SecondsSinceUnix = i64;

/// One commit of the history, files relative to the scanned folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub time: SecondsSinceUnix,
    pub files: Vec<String>,
}

/// Source of commit history, newest commit first.
pub trait CommitHistory {
    fn commits(&self) -> Result<Vec<Commit>, HistoryError>;
}

/// History read from `git log`, run once for the whole scan.
pub struct GitHistory {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitHistory {
    pub fn new(workdir: &Path, timeout: Duration) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }

    fn run_log(&self) -> Result<String, HistoryError> {
        let mut child = Command::new("git")
            .args([
                "-c",
                "core.quotePath=false",
                "log",
                "--name-only",
                "--relative",
                "--pretty=format:%ct",
            ])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(HistoryError::Io(std::io::Error::other("git stdout not captured")));
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let res = stdout.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(res);
        });

        let output = match rx.recv_timeout(self.timeout) {
            Ok(res) => res?,
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HistoryError::Timeout(self.timeout));
            }
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(HistoryError::Status(status));
        }

        String::from_utf8(output).map_err(|_| HistoryError::Encoding)
    }
}

impl CommitHistory for GitHistory {
    fn commits(&self) -> Result<Vec<Commit>, HistoryError> {
        let log = self.run_log()?;
        Ok(parse_log(&log))
    }
}

/// Used when history lookups are turned off: every file falls back to mtime.
pub struct NoHistory;

impl CommitHistory for NoHistory {
    fn commits(&self) -> Result<Vec<Commit>, HistoryError> {
        Ok(Vec::new())
    }
}

/// Parses `git log --name-only --pretty=format:%ct` output.
///
/// Each commit is a line of digits followed by the files it touched.
pub fn parse_log(output: &str) -> Vec<Commit> {
    let mut commits: Vec<Commit> = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(time) = line.parse() {
                commits.push(Commit {
                    time,
                    files: Vec::new(),
                });
                continue;
            }
        }
        if let Some(commit) = commits.last_mut() {
            commit.files.push(line.to_string());
        }
    }

    commits
}

/// converts time to number of seconds since unix_epoch
pub fn system_time_to_i64(time: SystemTime) -> anyhow::Result<SecondsSinceUnix> {
    i64::try_from(
        time.duration_since(UNIX_EPOCH)
            .with_context(|| "failed to get unix timestamp")?
            .as_secs(),
    )
    .with_context(|| "failed to get modification time in seconds")
}

/// Last modification time of a file, or 0 when it cannot be read
pub fn modified_time(path: &Path) -> SecondsSinceUnix {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(anyhow::Error::from)
        .and_then(system_time_to_i64);

    match modified {
        Ok(secs) => secs,
        Err(err) => {
            warn!(
                "could not read modification time of {}: {err:#}",
                path.to_string_lossy()
            );
            0
        }
    }
}

/// Resolves timestamps of files relative to a scanned root
pub struct TimestampResolver<'a> {
    history: &'a dyn CommitHistory,
    root: &'a Path,
}

impl<'a> TimestampResolver<'a> {
    pub fn new(history: &'a dyn CommitHistory, root: &'a Path) -> Self {
        Self { history, root }
    }

    /// Returns a timestamp for every requested path.
    ///
    /// The most recent commit touching a path wins. Paths that never appear
    /// in history, or every path when the history query fails, use mtime.
    pub fn resolve(&self, paths: &[PathBuf]) -> HashMap<PathBuf, SecondsSinceUnix> {
        let mut timestamps = HashMap::new();
        if paths.is_empty() {
            return timestamps;
        }

        let relative: HashMap<String, &PathBuf> = paths
            .iter()
            .filter_map(|p| {
                let rel = p.strip_prefix(self.root).ok()?;
                Some((rel.to_string_lossy().replace('\\', "/"), p))
            })
            .collect();

        match self.history.commits() {
            Ok(commits) => {
                for commit in commits {
                    for file in &commit.files {
                        if let Some(path) = relative.get(file) {
                            timestamps.entry((*path).clone()).or_insert(commit.time);
                        }
                    }
                }
            }
            Err(err) => {
                warn!("error getting git timestamps, using file modification times: {err}")
            }
        }

        for path in paths {
            if !timestamps.contains_key(path) {
                debug!("{} not in history, using mtime", path.to_string_lossy());
                timestamps.insert(path.clone(), modified_time(path));
            }
        }

        timestamps
    }
}
