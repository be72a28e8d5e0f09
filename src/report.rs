//! Report formatting.
//!
//! Pure functions from a report and an OutputFormat to a String.
//! No I/O, no side effects.

use humansize::{BINARY, format_size};
use serde::Serialize;

use crate::types::{
    CompareReport, DedupeReport, Disposal, FlattenReport, OutputFormat, SyncOutcome,
};

const RULE: &str = "============================================================";

/// Format a dedupe report for output.
pub fn format_dedupe(report: &DedupeReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => dedupe_human(report),
        OutputFormat::Json => to_json(report),
    }
}

/// Format a compare report for output.
pub fn format_compare(report: &CompareReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => compare_human(report),
        OutputFormat::Json => to_json(report),
    }
}

/// Format a flatten report (human only).
pub fn format_flatten(report: &FlattenReport) -> String {
    let prefix = if report.dry_run { "[Dry Run] " } else { "" };
    let verb = if report.dry_run { "Would move" } else { "Moved" };

    let mut out = String::new();
    for m in &report.moves {
        out.push_str(&format!(
            "{}{}: {} → {}\n",
            prefix,
            verb,
            m.from.display(),
            m.to.display()
        ));
    }
    for (path, error) in &report.failures {
        out.push_str(&format!("Error moving {}: {}\n", path.display(), error));
    }

    out.push_str("\n--- Summary ---\n");
    out.push_str(&format!(
        "{}Total files processed: {}\n",
        prefix,
        report.moves.len()
    ));
    if report.dry_run {
        out.push_str(&format!("Filename conflicts simulated: {}\n", report.conflicts()));
    } else {
        out.push_str(&format!("Renamed on conflict: {}\n", report.conflicts()));
    }
    if !report.failures.is_empty() {
        out.push_str(&format!("Failed: {}\n", report.failures.len()));
    }
    out
}

// ============================================================================
// HUMAN FORMAT
// ============================================================================

fn dedupe_human(report: &DedupeReport) -> String {
    let mut out = String::new();

    if report.groups.is_empty() {
        out.push_str("No duplicate images found.\n");
    }

    for group in &report.groups {
        out.push_str(&format!("\nDuplicate images found for hash {}:\n", group.hash));
        out.push_str(&format!(" - [KEEP] {}\n", group.keeper.display()));
        for dup in &group.redundant {
            out.push_str(&format!(" - [DUPLICATE] {}\n", dup.path.display()));
            match &dup.disposal {
                Disposal::Reported => {}
                Disposal::Moved { to } => {
                    out.push_str(&format!("    ↳ Moved to: {}\n", to.display()))
                }
                Disposal::WouldMove { to } => {
                    out.push_str(&format!("    ↳ [DRY RUN] Would move to: {}\n", to.display()))
                }
                Disposal::Deleted => out.push_str("    ↳ Deleted\n"),
                Disposal::WouldDelete => out.push_str("    ↳ [DRY RUN] Would delete\n"),
                Disposal::Failed { error } => out.push_str(&format!("    ✗ {}\n", error)),
            }
        }
    }

    out.push_str(&format_skipped(&report.skipped));

    let redundant: usize = report.groups.iter().map(|g| g.redundant.len()).sum();
    let failed = report
        .groups
        .iter()
        .flat_map(|g| &g.redundant)
        .filter(|r| matches!(r.disposal, Disposal::Failed { .. }))
        .count();

    out.push_str("\n=== Summary ===\n");
    out.push_str(&format!("Images indexed:     {}\n", report.images_indexed));
    out.push_str(&format!("Duplicate groups:   {}\n", report.groups.len()));
    out.push_str(&format!("Redundant files:    {}\n", redundant));
    if failed > 0 {
        out.push_str(&format!("Failed:             {}\n", failed));
    }
    if !report.skipped.is_empty() {
        out.push_str(&format!("Skipped (errors):   {}\n", report.skipped.len()));
    }
    out.push_str(&format!(
        "Space recoverable:  {}\n",
        format_size(report.bytes_recoverable, BINARY)
    ));
    if report.dry_run {
        out.push_str("\n[NOTE] This was a dry run. No files were changed.\n");
    }

    out
}

fn compare_human(report: &CompareReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", RULE));

    if report.items.is_empty() {
        out.push_str("✅ Success: Target contains all images found in Source.\n");
    } else {
        out.push_str(&format!(
            "Found {} images in Source missing from Target.\n",
            report.items.len()
        ));
        for record in &report.items {
            let rel = record.item.relative.display();
            match &record.outcome {
                SyncOutcome::Missing => out.push_str(&format!("📍 Missing: {}\n", rel)),
                SyncOutcome::WouldCopy => {
                    out.push_str(&format!("[DRY RUN] Would copy: {}\n", rel))
                }
                SyncOutcome::Copied => out.push_str(&format!("🚀 Copied: {}\n", rel)),
                SyncOutcome::Conflict => out.push_str(&format!(
                    "⚠ Not copied, destination exists: {}\n",
                    rel
                )),
                SyncOutcome::Failed { error } => {
                    out.push_str(&format!("✗ Could not copy {}: {}\n", rel, error))
                }
            }
        }
    }

    out.push_str(&format_skipped(&report.skipped));

    out.push_str(&format!(
        "\nIndexed: {} in source, {} in target\n",
        report.source_indexed, report.target_indexed
    ));
    if report.dry_run {
        out.push_str("\n[NOTE] This was a dry run. No files were actually copied.\n");
    }
    out.push_str(RULE);
    out.push('\n');
    out
}

fn format_skipped(skipped: &[(std::path::PathBuf, String)]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n=== Skipped (could not decode) ===\n");
    for (path, error) in skipped {
        out.push_str(&format!("  {} - {}\n", path.display(), error));
    }
    out
}

// ============================================================================
// JSON FORMAT
// ============================================================================

fn to_json<T: Serialize>(report: &T) -> String {
    // Paths serialize lossily, so every report field is representable.
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| panic!("Failed to serialize report to JSON: {}", e))
}

// ============================================================================
// TESTS
// ============================================================================
