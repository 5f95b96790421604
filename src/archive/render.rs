//! HTML rendering of the archive table

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::warn;

use crate::{
    archive::{
        classify::{Classification, FilterMode, Markers, TitleGroup},
        error::ArchiveError,
    },
    domain::entry::{FileEntry, URL_EXTENSION},
};

/// Format of the `?v=` cache-busting parameter
pub const VERSION_STAMP_FORMAT: &str = "%Y.%m.%d.%H.%M.%S";

const INTRO: &str = include_str!("../../html/intro.html");
const SEARCH_CONTROLS: &str = include_str!("../../html/search_controls.html");
const SHOW_ALL_VERSIONS: &str = include_str!("../../html/show_all_versions.html");
const SEARCH_SCRIPT: &str = include_str!("../../html/search_script.html");

pub struct PageOptions<'a> {
    pub header: &'a str,
    pub intro: bool,
    pub mode: FilterMode,
    pub generated_at: DateTime<Local>,
}

impl PageOptions<'_> {
    fn version_stamp(&self) -> String {
        self.generated_at.format(VERSION_STAMP_FORMAT).to_string()
    }
}

#[derive(Debug)]
pub struct RenderedPage {
    pub html: String,
    pub rows: usize,
    /// Sidecars whose link was left out of their row
    pub skipped_links: Vec<PathBuf>,
}

/// Label and target of a `.urltxt` sidecar
#[derive(Debug, PartialEq, Eq)]
pub struct UrlLink {
    pub label: String,
    pub url: String,
}

/// Reads a `.urltxt` sidecar: label on the first line, URL on the second.
pub fn read_url_sidecar(path: &Path) -> Result<UrlLink, ArchiveError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ArchiveError::Sidecar {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines = contents.lines().map(str::trim);

    let label = lines.next().unwrap_or_default();
    let url = lines
        .next()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ArchiveError::MalformedSidecar(path.to_path_buf()))?;

    let label = match label.trim_start_matches('#').trim() {
        "" => url,
        label => label,
    };
    Ok(UrlLink {
        label: label.to_string(),
        url: url.to_string(),
    })
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encodes every path segment, keeping the separators
fn href_for(file: &FileEntry) -> String {
    file.display_path()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn render_link(file: &FileEntry, hidden: bool, stamp: &str) -> Result<String, ArchiveError> {
    let class = if hidden {
        r#" class="additional-version""#
    } else {
        ""
    };
    let ext = &file.extension;

    let link = if ext == URL_EXTENSION {
        let link = read_url_sidecar(&file.path)?;
        format!(
            "<a href=\"{}\" target=\"_blank\"{class}>{}</a><br>\n",
            escape_html(&link.url),
            escape_html(&link.label)
        )
    } else if file.is_chordpro() {
        format!(
            " <a href=\"{}?v={stamp}\" download=\"{}.{ext}\" target=\"_blank\"{class}>.{ext}</a><br>\n",
            href_for(file),
            escape_html(&file.stem)
        )
    } else {
        format!(
            "  <a href=\"{}?v={stamp}\" target=\"_blank\"{class}>.{ext}</a><br>\n",
            href_for(file)
        )
    };
    Ok(link)
}

/// Renders one table row.
///
/// A `.urltxt` sidecar that cannot be read is logged and its link left out;
/// the other links of the row are still written.
pub fn render_row(
    number: usize,
    group: &TitleGroup,
    markers: &Markers,
    classification: &Classification,
    stamp: &str,
    skipped: &mut Vec<PathBuf>,
) -> String {
    let mut classes = Vec::new();
    if group.is_easy(markers) {
        classes.push("easy-song");
    }
    if group.has_hidden_versions(classification) {
        classes.push("hidden-version");
    }
    let class_attr = if classes.is_empty() {
        String::new()
    } else {
        format!(r#" class="{}""#, classes.join(" "))
    };

    let mut row = format!(
        "<tr{class_attr}>  <td>{number}</td>  <td>{}</td>\n<td>",
        escape_html(&group.title)
    );
    for file in group.links() {
        match render_link(file, classification.is_hidden(file), stamp) {
            Ok(link) => row.push_str(&link),
            Err(err) => {
                warn!("skipping link in row {}: {err}", group.title);
                skipped.push(file.path.clone());
            }
        }
    }
    row.push_str("</td></tr>\n");
    row
}

/// Renders the whole archive page.
///
/// Groups are expected in title key order. Groups made only of marker files
/// have no row.
pub fn render_page(
    groups: &[TitleGroup],
    markers: &Markers,
    classification: &Classification,
    options: &PageOptions,
) -> RenderedPage {
    let stamp = options.version_stamp();
    let mut html = String::from(options.header);

    html.push_str("<section class=\"archive card\">\n");
    if options.intro {
        html.push_str(INTRO);
    }
    let show_all = if options.mode == FilterMode::None {
        ""
    } else {
        SHOW_ALL_VERSIONS
    };
    html.push_str(&SEARCH_CONTROLS.replace("{{SHOW_ALL_VERSIONS}}", show_all));

    html.push_str("<table id=\"dataTable\">");
    html.push_str("<thead>\n");
    html.push_str("<tr><th>#</th><th>Song Title</th><th>Downloads</th></tr>\n");
    html.push_str("</thead>\n");
    html.push_str("<tbody>\n");

    let mut rows = 0;
    let mut skipped_links = Vec::new();
    for group in groups.iter().filter(|g| !g.links().is_empty()) {
        rows += 1;
        html.push_str(&render_row(
            rows,
            group,
            markers,
            classification,
            &stamp,
            &mut skipped_links,
        ));
    }

    html.push_str("</tbody>");
    html.push_str("</table>\n");
    html.push_str("</section>\n");
    html.push_str(&SEARCH_SCRIPT.replace("{{FILTER_MODE}}", options.mode.as_str()));
    html.push_str("</div>\n</div>\n</body>\n");

    RenderedPage {
        html,
        rows,
        skipped_links,
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::archive::{
        classify::{classify, group_by_title},
        error::HistoryError,
        timestamps::{Commit, CommitHistory, TimestampResolver},
    };

    struct FixedHistory(Vec<Commit>);

    impl CommitHistory for FixedHistory {
        fn commits(&self) -> Result<Vec<Commit>, HistoryError> {
            Ok(self.0.clone())
        }
    }

    fn frozen_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 4, 19, 30, 5).unwrap()
    }

    fn touch(root: &Path, rel: &str, contents: &str) -> FileEntry {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        FileEntry::from_path(path).unwrap()
    }

    fn render(
        root: &Path,
        files: &[FileEntry],
        mode: FilterMode,
        history: &dyn CommitHistory,
    ) -> RenderedPage {
        let markers = Markers::collect(files);
        let resolver = TimestampResolver::new(history, root);
        let classification = classify(files, &markers, mode, &resolver);
        let groups = group_by_title(files);
        let options = PageOptions {
            header: "<html><body><div><div>\n",
            intro: false,
            mode,
            generated_at: frozen_clock(),
        };
        render_page(&groups, &markers, &classification, &options)
    }

    fn row_containing<'a>(html: &'a str, needle: &str) -> &'a str {
        html.lines()
            .find(|l| l.contains(needle))
            .unwrap_or_default()
    }

    #[test]
    fn rows_are_sorted_and_numbered() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "Banana.pdf", ""),
            touch(tmp.path(), "apple pie.pdf", ""),
            touch(tmp.path(), "apple.pdf", ""),
        ];

        let page = render(tmp.path(), &files, FilterMode::None, &FixedHistory(vec![]));

        let apple = page.html.find("<td>apple</td>").unwrap();
        let pie = page.html.find("<td>apple pie</td>").unwrap();
        let banana = page.html.find("<td>Banana</td>").unwrap();
        assert!(apple < pie && pie < banana);
        assert!(page.html.contains("<td>3</td>  <td>Banana</td>"));
        assert_eq!(page.rows, 3);
    }

    #[test]
    fn links_carry_version_stamp_and_download_name() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "Blue Moon.chopro", "[C]Blue moon"),
            touch(tmp.path(), "Blue Moon.pdf", ""),
        ];

        let page = render(tmp.path(), &files, FilterMode::Timestamp, &FixedHistory(vec![]));

        let root = tmp
            .path()
            .to_string_lossy()
            .split('/')
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        assert!(page.html.contains(&format!(
            " <a href=\"{root}/Blue%20Moon.chopro?v=2025.11.04.19.30.05\" download=\"Blue Moon.chopro\" target=\"_blank\">.chopro</a><br>\n"
        )));
        assert!(page.html.contains(&format!(
            "  <a href=\"{root}/Blue%20Moon.pdf?v=2025.11.04.19.30.05\" target=\"_blank\">.pdf</a><br>\n"
        )));
        let chopro = page.html.find(".chopro</a>").unwrap();
        let pdf = page.html.find(".pdf</a>").unwrap();
        assert!(chopro < pdf);
    }

    #[test]
    fn url_sidecar_renders_its_label_and_target() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "Jambalaya.pdf", ""),
            touch(
                tmp.path(),
                "Jambalaya.urltxt",
                "# Most recent recording: November 4, 2025\nhttps://youtu.be/abc?t=61\n",
            ),
        ];

        let page = render(tmp.path(), &files, FilterMode::Timestamp, &FixedHistory(vec![]));

        assert!(page.html.contains(
            "<a href=\"https://youtu.be/abc?t=61\" target=\"_blank\">Most recent recording: November 4, 2025</a><br>\n"
        ));
        assert!(!page.html.contains("Jambalaya.urltxt"));
    }

    #[test]
    fn broken_sidecar_drops_only_its_link() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "Apple.pdf", ""),
            touch(tmp.path(), "Jambalaya.chopro", "[C]"),
            touch(tmp.path(), "Jambalaya.pdf", ""),
            touch(tmp.path(), "Jambalaya.urltxt", "only a label\n"),
            touch(tmp.path(), "Cherry.pdf", ""),
        ];

        let page = render(tmp.path(), &files, FilterMode::Timestamp, &FixedHistory(vec![]));

        assert_eq!(page.rows, 3);
        assert_eq!(page.skipped_links, vec![tmp.path().join("Jambalaya.urltxt")]);
        let row = row_containing(&page.html, "<td>Jambalaya</td>");
        assert!(row.starts_with("<tr>  <td>3</td>"));
        assert!(page.html.contains("Jambalaya.pdf?v="));
        assert!(page.html.contains("Jambalaya.chopro?v="));
        assert!(!page.html.contains("only a label"));
        assert!(page.html.contains("<td>2</td>  <td>Cherry</td>"));
        assert!(page.html.ends_with("</body>\n"));
    }

    #[test]
    fn hrefs_encode_reserved_characters() {
        let tmp = TempDir::new().unwrap();
        let files = vec![touch(tmp.path(), "Rock & Roll #2?.pdf", "")];

        let page = render(tmp.path(), &files, FilterMode::None, &FixedHistory(vec![]));

        assert!(page.html.contains("/Rock%20%26%20Roll%20%232%3F.pdf?v=2025.11.04.19.30.05\""));
        assert!(page.html.contains("<td>Rock &amp; Roll #2?</td>"));
    }

    #[test]
    fn superseded_version_is_present_but_marked() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "2020/Song.chopro", "[C]old"),
            touch(tmp.path(), "2024/Song.chopro", "[C]new"),
        ];
        let history = FixedHistory(vec![
            Commit {
                time: 2000,
                files: vec!["2024/Song.chopro".into()],
            },
            Commit {
                time: 1000,
                files: vec!["2020/Song.chopro".into()],
            },
        ]);

        let page = render(tmp.path(), &files, FilterMode::Timestamp, &history);

        assert!(page.html.contains("<tr class=\"hidden-version\">"));
        let old = row_containing(&page.html, "2020/Song.chopro");
        let new = row_containing(&page.html, "2024/Song.chopro");
        assert!(old.contains("class=\"additional-version\""));
        assert!(!new.contains("additional-version"));
        assert!(page.html.contains("const defaultFilterMethod = 'timestamp';"));
        assert!(page.html.contains("id=\"showAllVersions\""));
    }

    #[test]
    fn none_mode_marks_nothing_and_has_no_toggle() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "X.chopro", ""),
            touch(tmp.path(), "X.pdf", ""),
            touch(tmp.path(), "X.hide", ""),
        ];

        let page = render(tmp.path(), &files, FilterMode::None, &FixedHistory(vec![]));

        assert!(!page.html.contains("additional-version\""));
        assert!(!page.html.contains("hidden-version"));
        assert!(!page.html.contains("id=\"showAllVersions\""));
        assert!(!page.html.contains(".hide"));
    }

    #[test]
    fn easy_marker_tags_row() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "Ode to Joy.chopro", ""),
            touch(tmp.path(), "ode to joy.easy", ""),
            touch(tmp.path(), "Hard Song.pdf", ""),
        ];

        let page = render(tmp.path(), &files, FilterMode::Timestamp, &FixedHistory(vec![]));

        assert!(page.html.contains("<tr class=\"easy-song\">  <td>2</td>  <td>Ode to Joy</td>"));
        assert!(page.html.contains("<tr>  <td>1</td>  <td>Hard Song</td>"));
        assert!(!page.html.contains(".easy"));
    }

    #[test]
    fn orphan_marker_has_no_row() {
        let tmp = TempDir::new().unwrap();
        let files = vec![touch(tmp.path(), "Gone.hide", "")];

        let page = render(tmp.path(), &files, FilterMode::Timestamp, &FixedHistory(vec![]));

        assert_eq!(page.rows, 0);
        assert!(page.skipped_links.is_empty());
    }

    #[test]
    fn rendering_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            touch(tmp.path(), "a/The Boxer.pdf", ""),
            touch(tmp.path(), "b/Boxer.pdf", ""),
            touch(tmp.path(), "Boxer.chopro", ""),
        ];
        let history = FixedHistory(vec![Commit {
            time: 10,
            files: vec!["a/The Boxer.pdf".into(), "b/Boxer.pdf".into()],
        }]);

        let first = render(tmp.path(), &files, FilterMode::Timestamp, &history);
        let mut reversed = files.clone();
        reversed.reverse();
        let second = render(tmp.path(), &reversed, FilterMode::Timestamp, &history);

        assert_eq!(first.html, second.html);
        assert!(first.html.contains("<td>The Boxer</td>"));
    }

    #[test]
    fn titles_are_escaped() {
        assert_eq!(escape_html("Rock & Roll <Live>"), "Rock &amp; Roll &lt;Live&gt;");
    }

    #[test]
    fn sidecar_without_url_is_malformed() {
        let tmp = TempDir::new().unwrap();
        let entry = touch(tmp.path(), "Only.urltxt", "label\n\n");

        let err = read_url_sidecar(&entry.path).unwrap_err();

        assert!(matches!(err, ArchiveError::MalformedSidecar(_)));
    }
}
