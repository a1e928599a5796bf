use std::fmt::Write;

use mod_sync::SyncReport;

/// Render a report as the plain-text summary printed by `mod-sync sync`.
pub fn render_report(report: &SyncReport) -> String {
    let mut out = String::new();
    let summary = report.summary();

    let _ = writeln!(out, "Synced: {}", summary.synced);
    for synced in &report.synced {
        let _ = writeln!(
            out,
            "  {}  {}  [{}]",
            synced.package,
            synced.version.display_name(),
            synced.backend
        );
    }

    let _ = writeln!(out, "Failed: {}", summary.failed);
    for failed in &report.failed {
        let backend = failed.backend.as_deref().unwrap_or("-");
        let _ = writeln!(out, "  {}  [{}] {}", failed.package, backend, failed.reason);
    }

    let _ = writeln!(out, "Conflicts: {}", summary.conflicts);
    for conflict in &report.conflicts {
        let names: Vec<&str> = conflict.packages.iter().map(|p| p.as_str()).collect();
        let _ = writeln!(out, "  {}: {}", names.join(", "), conflict.reason);
    }

    out
}
