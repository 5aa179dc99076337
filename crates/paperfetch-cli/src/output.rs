use std::io::Write;
use std::path::Path;

use owo_colors::OwoColorize;
use paperfetch_core::{DriverEvent, FetchOutcome, ItemStatus, Resolution, RunSummary};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print what the run is about to do.
pub fn print_run_header(
    w: &mut dyn Write,
    proceedings_url: &str,
    catalog_len: usize,
    liked: usize,
    dest_dir: &Path,
    dry_run: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(
        w,
        "Found {} papers in the proceedings at {}",
        catalog_len, proceedings_url
    )?;
    writeln!(w, "You liked {} items", liked)?;
    let target = if dry_run {
        "(dry run, nothing will be downloaded)".to_string()
    } else {
        format!("Saving papers to {}", dest_dir.display())
    };
    if color.enabled() {
        writeln!(w, "{}", target.dimmed())?;
    } else {
        writeln!(w, "{}", target)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print a real-time progress event.
pub fn print_event(w: &mut dyn Write, event: &DriverEvent, color: ColorMode) -> std::io::Result<()> {
    match event {
        DriverEvent::Skipped {
            index,
            total,
            id,
            reason,
        } => {
            let msg = format!("[{}/{}] skipping {}: {}", index + 1, total, id, reason);
            if color.enabled() {
                writeln!(w, "{}", msg.dimmed())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
        DriverEvent::Resolved {
            index,
            total,
            title,
            resolution,
            ..
        } => {
            writeln!(
                w,
                "[{}/{}] \"{}\" -> #{} \"{}\"",
                index + 1,
                total,
                truncate(title, 60),
                resolution.best_entry.external_id,
                truncate(&resolution.best_entry.title, 60)
            )?;
            print_resolution_warnings(w, title, resolution, color)?;
        }
        DriverEvent::Fetched { outcome, .. } => match outcome {
            FetchOutcome::Written { path, bytes } => {
                let msg = format!("saved {} ({} bytes)", path.display(), bytes);
                if color.enabled() {
                    writeln!(w, "      {} {}", "->".green(), msg)?;
                } else {
                    writeln!(w, "      -> {}", msg)?;
                }
            }
            FetchOutcome::SkippedExisting { path } => {
                let msg = format!("already have {}", path.display());
                if color.enabled() {
                    writeln!(w, "      -> {}", msg.dimmed())?;
                } else {
                    writeln!(w, "      -> {}", msg)?;
                }
            }
            FetchOutcome::Failed { reason, .. } => {
                if color.enabled() {
                    writeln!(w, "      {} {}", "FAILED:".red(), reason)?;
                } else {
                    writeln!(w, "      FAILED: {}", reason)?;
                }
            }
        },
    }
    Ok(())
}

fn print_resolution_warnings(
    w: &mut dyn Write,
    title: &str,
    resolution: &Resolution,
    color: ColorMode,
) -> std::io::Result<()> {
    if resolution.is_confident() {
        return Ok(());
    }
    let best = &resolution.best_entry;
    if resolution.is_low_confidence {
        let msg = format!(
            "low-confidence match for \"{}\": best is \"{}\" with score {:.2}",
            title,
            best.title,
            resolution.clamped_best_score()
        );
        warn(w, &msg, color)?;
    }
    if let (true, Some(runner_up)) = (resolution.is_ambiguous, &resolution.runner_up) {
        let msg = format!(
            "ambiguous match for \"{}\": \"{}\" (#{}, {:.2}) vs \"{}\" (#{}, {:.2})",
            title,
            best.title,
            best.external_id,
            resolution.best_score,
            runner_up.entry.title,
            runner_up.entry.external_id,
            runner_up.score
        );
        warn(w, &msg, color)?;
    }
    Ok(())
}

fn warn(w: &mut dyn Write, msg: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "      {} {}", "WARNING:".yellow(), msg)
    } else {
        writeln!(w, "      WARNING: {}", msg)
    }
}

/// List every download that failed, so they can be fetched by hand.
pub fn print_failures(
    w: &mut dyn Write,
    summary: &RunSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    let failures: Vec<_> = summary
        .items
        .iter()
        .filter_map(|item| match &item.status {
            ItemStatus::Resolved {
                resolution,
                outcome: Some(FetchOutcome::Failed { reason, .. }),
            } => Some((resolution, reason)),
            _ => None,
        })
        .collect();
    if failures.is_empty() {
        return Ok(());
    }

    if color.enabled() {
        writeln!(w, "{}", "Failed downloads:".red().bold())?;
    } else {
        writeln!(w, "Failed downloads:")?;
    }
    for (resolution, reason) in failures {
        writeln!(
            w,
            "  #{} \"{}\"",
            resolution.best_entry.external_id, resolution.best_entry.title
        )?;
        writeln!(w, "      {}", reason)?;
    }
    writeln!(w)?;
    Ok(())
}

pub fn print_summary(
    w: &mut dyn Write,
    summary: &RunSummary,
    dry_run: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Liked items: {}", summary.liked)?;
    if summary.skipped() > 0 {
        let msg = format!(
            "Skipped: {} (no metadata: {}, no title: {}, no abstract: {}, unresolvable: {})",
            summary.skipped(),
            summary.missing_metadata,
            summary.no_title,
            summary.empty_abstract,
            summary.unresolvable
        );
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w, "  Matched: {}", summary.resolved)?;
    if summary.low_confidence > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Low-confidence matches:".yellow(), summary.low_confidence)?;
        } else {
            writeln!(w, "  Low-confidence matches: {}", summary.low_confidence)?;
        }
    }
    if summary.ambiguous > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Ambiguous matches:".yellow(), summary.ambiguous)?;
        } else {
            writeln!(w, "  Ambiguous matches: {}", summary.ambiguous)?;
        }
    }
    writeln!(w)?;

    if !dry_run {
        if color.enabled() {
            writeln!(w, "  {} {}", "Downloaded:".green(), summary.written)?;
        } else {
            writeln!(w, "  Downloaded: {}", summary.written)?;
        }
        writeln!(w, "  Already present: {}", summary.skipped_existing)?;
        if summary.failed > 0 {
            if color.enabled() {
                writeln!(w, "  {} {}", "Failed:".red(), summary.failed)?;
            } else {
                writeln!(w, "  Failed: {}", summary.failed)?;
            }
        }
    }
    if summary.cancelled {
        if color.enabled() {
            writeln!(w, "  {}", "Interrupted before all items were processed".yellow())?;
        } else {
            writeln!(w, "  Interrupted before all items were processed")?;
        }
    }

    writeln!(w)?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
