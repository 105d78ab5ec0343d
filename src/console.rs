//! Console output: colored status lines, the startup countdown, and the
//! per-host report blocks.

use std::io::{self, Write};
use std::time::Duration;

use colored::Colorize;
use tokio::time::sleep;

use crate::monitor::ReportLine;

/// Print a section heading.
pub fn heading(text: &str) {
    println!("{}", text.magenta());
}

/// Print an error message to stderr.
pub fn error(msg: &str) {
    eprintln!("{}", format!("ERROR: {}", msg).red());
}

/// Clear the screen and home the cursor.
pub fn clear() {
    print!("\x1b[2J\x1b[1;1H");
    let _ = io::stdout().flush();
}

/// Count down in place before the first cycle, overwriting each digit with
/// a backspace. Gives the user a moment to read any startup warnings.
pub async fn countdown(seconds: u64) {
    print!("Starting in .. ");

    for n in (1..=seconds).rev() {
        if n != seconds {
            print!("\x08");
        }
        print!("{}", n);
        let _ = io::stdout().flush();
        sleep(Duration::from_secs(1)).await;
    }
    println!();
}

/// Render one host's report block.
///
/// A failed probe shows `--` for the latency while the aggregates keep
/// their last known values.
pub fn format_report(line: &ReportLine) -> String {
    let error_line = if line.failed {
        format!("{}\n", "LAST PING - ERROR".red())
    } else {
        String::new()
    };

    format!(
        "> {}\n{}\nLatency : {}\nAverage : {}\n    Min : {}\n    Max : {}",
        line.name,
        error_line,
        fmt_ms(line.latency_ms),
        fmt_ms(line.stats.map(|s| s.average)),
        fmt_ms(line.stats.map(|s| s.minimum)),
        fmt_ms(line.stats.map(|s| s.maximum)),
    )
}

/// Print one host's report block followed by a separating blank line.
pub fn write_report(line: &ReportLine) {
    println!("{}", format_report(line));
    println!();
}

fn fmt_ms(value: Option<u64>) -> String {
    match value {
        Some(ms) => format!("{}ms", ms),
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::HostStats;

    #[test]
    fn report_shows_all_figures_for_a_healthy_host() {
        let line = ReportLine {
            name: "Gateway".to_string(),
            failed: false,
            latency_ms: Some(12),
            stats: Some(HostStats {
                average: 12,
                minimum: 10,
                maximum: 15,
            }),
        };

        assert_eq!(
            format_report(&line),
            "> Gateway\n\nLatency : 12ms\nAverage : 12ms\n    Min : 10ms\n    Max : 15ms"
        );
    }

    #[test]
    fn report_marks_a_failed_probe_and_keeps_aggregates() {
        let line = ReportLine {
            name: "Gateway".to_string(),
            failed: true,
            latency_ms: None,
            stats: Some(HostStats {
                average: 20,
                minimum: 10,
                maximum: 30,
            }),
        };

        let out = format_report(&line);
        assert!(out.contains("LAST PING - ERROR"));
        assert!(out.contains("Latency : --"));
        assert!(out.contains("Average : 20ms"));
        assert!(out.contains("    Min : 10ms"));
        assert!(out.contains("    Max : 30ms"));
    }

    #[test]
    fn report_without_history_shows_placeholders() {
        let line = ReportLine {
            name: "Fresh".to_string(),
            failed: true,
            latency_ms: None,
            stats: None,
        };

        let out = format_report(&line);
        assert!(out.contains("Latency : --"));
        assert!(out.contains("Average : --"));
        assert!(out.contains("    Min : --"));
        assert!(out.contains("    Max : --"));
    }
}
