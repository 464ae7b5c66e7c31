//! Display formatting for CLI output
//!
//! Provides human-readable summaries of each pipeline phase, printed to
//! stdout. Structured logs go to stderr through `tracing`.

use chartrelay_core::{ChartRef, DetectedCharts};
use chartrelay_release::{
    DeleteSummary, IndexSummary, ItemFailure, PublishSummary, RegistrySummary, RunReport,
};
use chartrelay_repo::CommitInfo;
use console::style;

/// Affected charts grouped by kind
pub fn print_detected(detected: &DetectedCharts) {
    if detected.is_empty() {
        println!("{} No chart changes detected", style("→").blue().bold());
        return;
    }

    print_chart_group("Application charts", &detected.application);
    print_chart_group("Library charts", &detected.library);
    print_chart_group("Deleted charts", &detected.deleted);
}

fn print_chart_group(title: &str, charts: &[ChartRef]) {
    if charts.is_empty() {
        return;
    }
    println!("{} ({}):", style(title).bold(), charts.len());
    for chart in charts {
        println!("  {} {}", style("•").dim(), chart.directory.display());
    }
}

pub fn print_publish(summary: &PublishSummary) {
    println!(
        "{} {} published, {} already released{}",
        style("Releases").cyan().bold(),
        style(summary.published).green(),
        summary.skipped,
        failed_suffix(summary.failed())
    );
    if summary.drifted > 0 {
        println!(
            "  {} {} existing release(s) differ from the local package",
            style("⚠").yellow(),
            summary.drifted
        );
    }
    print_failures(&summary.failures);
}

pub fn print_delete(summary: &DeleteSummary) {
    if summary.deleted == 0 && summary.failures.is_empty() {
        return;
    }
    println!(
        "{} {} chart(s), {} release(s) removed{}",
        style("Deleted").cyan().bold(),
        summary.deleted,
        summary.releases,
        failed_suffix(summary.failed())
    );
    print_failures(&summary.failures);
}

pub fn print_index(summary: &IndexSummary) {
    println!(
        "{} {} chart(s), {} version(s), {} without releases{}",
        style("Indexed").cyan().bold(),
        summary.indexed,
        summary.entries,
        summary.skipped,
        failed_suffix(summary.failed())
    );
    for path in &summary.written {
        println!("  {} {}", style("wrote").dim(), path.display());
    }
    print_failures(&summary.failures);
}

pub fn print_registry(summary: &RegistrySummary) {
    if summary.disabled {
        println!("{} disabled", style("Registry").cyan().bold());
        return;
    }
    if summary.unauthenticated {
        println!(
            "{} {} login failed, nothing pushed",
            style("Registry").cyan().bold(),
            style("⚠").yellow()
        );
        return;
    }
    println!(
        "{} {} pushed, {} already present{}",
        style("Registry").cyan().bold(),
        style(summary.pushed).green(),
        summary.skipped,
        failed_suffix(summary.failed())
    );
    print_failures(&summary.failures);
}

pub fn print_commit(commit: Option<&CommitInfo>) {
    match commit {
        Some(commit) => println!(
            "{} {}{}",
            style("Committed").cyan().bold(),
            commit.oid,
            commit
                .url
                .as_deref()
                .map(|u| format!(" ({})", u))
                .unwrap_or_default()
        ),
        None => println!(
            "{} generated files unchanged, nothing to commit",
            style("→").blue().bold()
        ),
    }
}

pub fn print_report(report: &RunReport) {
    print_detected(&report.detected);
    println!();
    print_delete(&report.deleted);
    print_publish(&report.published);
    print_index(&report.index);
    print_registry(&report.registry);
    print_commit(report.commit.as_ref());
}

fn print_failures(failures: &[ItemFailure]) {
    for failure in failures {
        println!(
            "  {} {} [{}]: {}",
            style("✗").red().bold(),
            style(&failure.chart).bold(),
            failure.stage,
            failure.message
        );
    }
}

fn failed_suffix(failed: usize) -> String {
    if failed == 0 {
        String::new()
    } else {
        format!(", {}", style(format!("{} failed", failed)).red())
    }
}
