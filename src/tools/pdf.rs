//! Renders ChordPro sheets to PDF with an external `chordpro` command

use std::{
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use log::{info, warn};
use thiserror::Error;

use crate::{
    archive::{error::ArchiveError, scan::scan_dir},
    config::PdfConfig,
};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("no PDF command configured")]
    EmptyCommand,

    #[error("failed to run {program} for {}: {source}", path.to_string_lossy())]
    Spawn {
        program: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status} for {}", path.to_string_lossy())]
    Status {
        program: String,
        path: PathBuf,
        status: ExitStatus,
    },
}

#[derive(Debug, Default)]
pub struct PdfReport {
    pub generated: Vec<PathBuf>,
    /// Sheets that already had a PDF next to them
    pub up_to_date: usize,
    pub failed: Vec<PdfError>,
}

/// Runs the configured command with the sheet path appended.
pub fn render_pdf(cfg: &PdfConfig, sheet: &Path) -> Result<(), PdfError> {
    let (program, args) = cfg.command.split_first().ok_or(PdfError::EmptyCommand)?;

    let output = Command::new(program)
        .args(args)
        .arg(sheet)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| PdfError::Spawn {
            program: program.clone(),
            path: sheet.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("{program}: {}", stderr.trim());
        }
        return Err(PdfError::Status {
            program: program.clone(),
            path: sheet.to_path_buf(),
            status: output.status,
        });
    }
    Ok(())
}

/// Renders every ChordPro sheet below `root` that has no PDF next to it, or
/// every sheet when `force` is set. A sheet that fails is logged and the rest
/// are still rendered.
pub fn generate_pdfs(
    root: &Path,
    cfg: &PdfConfig,
    follow_symlinks: bool,
    force: bool,
) -> Result<PdfReport, ArchiveError> {
    let mut sheets = scan_dir(root, follow_symlinks)?
        .into_iter()
        .filter(|f| f.is_chordpro())
        .map(|f| f.path)
        .collect::<Vec<_>>();
    sheets.sort();

    let mut report = PdfReport::default();
    for sheet in sheets {
        let pdf = sheet.with_extension("pdf");
        if pdf.exists() && !force {
            report.up_to_date += 1;
            continue;
        }

        info!("Generating {}", pdf.to_string_lossy());
        match render_pdf(cfg, &sheet) {
            Ok(()) => report.generated.push(pdf),
            Err(err) => {
                warn!("{err}");
                report.failed.push(err);
            }
        }
    }
    Ok(report)
}
