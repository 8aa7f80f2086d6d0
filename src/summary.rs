//! Human-readable end-of-run report.

use console::style;

use crate::runner::RunSummary;

/// Print the run summary to stdout.
///
/// Suppressed entirely in quiet mode; exit codes and logs still carry the
/// outcome.
pub fn print_summary(summary: &RunSummary, quiet: bool) {
    if quiet {
        return;
    }

    if summary.nothing_to_rerun() {
        println!("{}", style("Nothing to rerun: the rerun cache is empty.").green());
        return;
    }

    let elapsed = format_duration(summary.elapsed);
    if summary.all_passed() {
        println!(
            "{} ({} specifications in {elapsed})",
            style("All specifications passed").green().bold(),
            summary.total,
        );
        return;
    }

    println!(
        "{} ({} of {} specifications failed in {elapsed})",
        style("Run failed").red().bold(),
        summary.failed(),
        summary.total,
    );
    for spec in &summary.failed_specs {
        println!("  {} {spec}", style("✗").red());
    }
    println!("Re-run just the failures with --rerun.");
}

fn format_duration(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    if total_secs >= 60 {
        format!("{}m {:02}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
