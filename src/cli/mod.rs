use anyhow::{Context, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    archive::{
        self, ArchiveIndex, GenerateRequest,
        classify::FilterMode,
        scan::scan_dir,
        timestamps::{CommitHistory, GitHistory, NoHistory},
    },
    config::{self, Config},
    tools::{easy, encoding, pdf, recordings},
};

#[derive(Parser)]
#[command(name = "songdeck")]
#[command(version = "0.1")]
#[command(about = "Maintenance tools for a song sheet archive website")]
pub struct Cli {
    /// Path to an optional config TOML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the archive HTML page
    Generate {
        /// Folder containing the song files
        music_dir: PathBuf,
        /// HTML file to write
        output: PathBuf,
        /// Include the introduction text
        #[arg(long, overrides_with = "no_intro")]
        intro: bool,
        /// Leave out the introduction text
        #[arg(long)]
        no_intro: bool,
        /// Which files are hidden by default
        #[arg(long, value_enum)]
        filter: Option<FilterMode>,
        /// Render ChordPro sheets that have no PDF yet before generating
        #[arg(long)]
        gen_pdf: bool,
        /// Render every ChordPro sheet to PDF, replacing existing ones
        #[arg(long)]
        force_pdf: bool,
    },
    /// Show how files are grouped and which are hidden
    Classify {
        music_dir: PathBuf,
        #[arg(long, value_enum)]
        filter: Option<FilterMode>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create .easy markers for songs with few chords
    Easy {
        dir: PathBuf,
        /// Most distinct chords an easy song may use
        #[arg(long)]
        max_chords: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Create .urltxt links to the most recent recording of each song
    Recordings {
        /// Recording history HTML page
        history: PathBuf,
        /// Folder containing the ChordPro files
        chordpro_dir: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Convert song sheets to clean UTF-8
    Repair {
        /// Files to repair; every .chopro in the configured song folder when empty
        files: Vec<PathBuf>,
    },
}

fn history_for(cfg: &config::HistoryConfig, root: &Path) -> Box<dyn CommitHistory> {
    if cfg.enabled {
        Box::new(GitHistory::new(root, Duration::from_secs(cfg.timeout_secs)))
    } else {
        Box::new(NoHistory)
    }
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            music_dir,
            output,
            intro,
            no_intro,
            filter,
            gen_pdf,
            force_pdf,
        } => {
            if gen_pdf || force_pdf {
                let report = pdf::generate_pdfs(
                    &music_dir,
                    &cfg.pdf,
                    cfg.archive.follow_symlinks,
                    force_pdf,
                )?;
                info!(
                    "PDFs generated: {}, already present: {}, failed: {}",
                    report.generated.len(),
                    report.up_to_date,
                    report.failed.len()
                );
            }

            let mode = filter.unwrap_or(cfg.archive.filter);
            let intro = match (intro, no_intro) {
                (_, true) => false,
                (true, _) => true,
                _ => cfg.archive.intro,
            };
            info!("Generating Music List (this takes a few seconds)");
            info!("Using filter method: {}", mode.as_str());

            let request = GenerateRequest {
                music_dir,
                output,
                header_template: cfg.archive.header_template.clone(),
                intro,
                mode,
                follow_symlinks: cfg.archive.follow_symlinks,
            };
            let history = history_for(&cfg.history, &request.music_dir);
            let summary = archive::generate(&request, history.as_ref(), Local::now())
                .context("failed to generate archive page")?;

            for path in &summary.skipped_links {
                warn!("link left out: {}", path.to_string_lossy());
            }
            info!(
                "Done! {} songs from {} files, {} hidden by default",
                summary.rows, summary.files, summary.hidden
            );
        }

        Commands::Classify {
            music_dir,
            filter,
            json,
        } => {
            let mode = filter.unwrap_or(cfg.archive.filter);
            let history = history_for(&cfg.history, &music_dir);
            let index = ArchiveIndex::build(
                &music_dir,
                cfg.archive.follow_symlinks,
                mode,
                history.as_ref(),
            )?;
            let report = index.report();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for group in &report.groups {
                    let mut flags = Vec::new();
                    if group.easy {
                        flags.push("easy");
                    }
                    if group.has_hidden_versions {
                        flags.push("hidden versions");
                    }
                    if flags.is_empty() {
                        println!("{}", group.title);
                    } else {
                        println!("{} [{}]", group.title, flags.join(", "));
                    }
                    for file in &group.files {
                        let state = if file.hidden { "hidden " } else { "" };
                        println!("    - {state}{}", file.path.to_string_lossy());
                    }
                }
                for set in report.version_sets {
                    if let Some(kept) = set.kept() {
                        println!(
                            "{}.{}: {} versions, keeping {}",
                            set.title_key,
                            set.extension,
                            set.ranked.len(),
                            kept.to_string_lossy()
                        );
                    }
                }
            }
        }

        Commands::Easy {
            dir,
            max_chords,
            dry_run,
        } => {
            let max_chords = max_chords.unwrap_or(cfg.easy.max_chords);
            let report = easy::mark_easy_songs(&dir, max_chords, dry_run)?;

            println!("Total ChordPro files analyzed: {}", report.analyzed);
            println!(
                "Songs with {max_chords} or fewer chords: {}",
                report.easy.len()
            );
            println!("Already had .easy markers: {}", report.already_marked.len());
            println!("New .easy markers created: {}", report.created.len());
            for song in &report.easy {
                let chords = song.chords.iter().cloned().collect::<Vec<_>>();
                println!(
                    "    - {} ({})",
                    song.path.to_string_lossy(),
                    chords.join(", ")
                );
            }
            if !report.errors.is_empty() {
                bail!("{} files could not be processed", report.errors.len());
            }
        }

        Commands::Recordings {
            history,
            chordpro_dir,
            dry_run,
        } => {
            let html = std::fs::read_to_string(&history).with_context(|| {
                format!("failed to read recording history {}", history.display())
            })?;
            let index = recordings::parse_history(&html);
            info!("Found recordings for {} different songs", index.len());
            if index.is_empty() {
                bail!("no recordings found in {}", history.display());
            }

            let report = recordings::sync_recording_links(&chordpro_dir, &index, dry_run)?;

            println!("ChordPro files processed: {}", report.songs);
            println!("New .urltxt files created: {}", report.created.len());
            println!("Existing .urltxt files updated: {}", report.updated.len());
            println!("Already up-to-date .urltxt files: {}", report.unchanged);
            println!("Songs without recordings: {}", report.without_recording);
            println!("Stale .urltxt removed: {}", report.removed_stale.len());
            println!(
                "Duplicate title .urltxt removed: {}",
                report.removed_duplicates.len()
            );
            println!(
                "Duplicate stem .urltxt removed: {}",
                report.removed_stem_duplicates.len()
            );
        }

        Commands::Repair { files } => {
            let files = if files.is_empty() {
                let mut found = scan_dir(&cfg.repair.song_dir, false)?
                    .into_iter()
                    .filter(|f| f.extension == "chopro")
                    .map(|f| f.path)
                    .collect::<Vec<_>>();
                found.sort();
                found
            } else {
                files
            };

            let mut failed = 0;
            for file in &files {
                if let Err(err) = encoding::repair_file(file) {
                    warn!("{err}");
                    failed += 1;
                }
            }
            println!(
                "Successfully processed {}/{} files",
                files.len() - failed,
                files.len()
            );
            if failed > 0 {
                bail!("{failed} files could not be repaired");
            }
        }
    }

    Ok(())
}
