//! End-of-crawl report formatting

use crate::crawler::CrawlReport;
use std::fmt::Write;

/// Formats a crawl report for the terminal
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Report ===\n");
    let _ = writeln!(out, "Product: {} ({})", report.title, report.product_id);
    let _ = writeln!(out, "Stopped: {}", report.reason);
    let _ = writeln!(
        out,
        "Elapsed: {:.1} minutes",
        report.elapsed.as_secs_f64() / 60.0
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Attempted: {}", report.pages_attempted);
    let _ = writeln!(out, "  With reviews: {}", report.pages_succeeded);
    let _ = writeln!(out, "  Empty: {}", report.pages_empty);
    let _ = writeln!(out, "  Skipped: {}", report.pages_failed);
    if !report.failed_pages.is_empty() {
        let pages: Vec<String> = report.failed_pages.iter().map(|p| p.to_string()).collect();
        let _ = writeln!(out, "  Skipped page numbers: {}", pages.join(", "));
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Reviews:");
    let _ = writeln!(out, "  Extracted: {}", report.records_extracted);
    let _ = writeln!(out, "  Persisted: {}", report.records_persisted);
    if report.persist_failures > 0 {
        let _ = writeln!(out, "  Failed to persist: {}", report.persist_failures);
    }
    let _ = writeln!(out);

    let total = report.requests_ok + report.requests_failed;
    let success_rate = if total > 0 {
        report.requests_ok as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        out,
        "Requests: {} ok, {} failed ({:.1}% success), {} cooldowns",
        report.requests_ok, report.requests_failed, success_rate, report.cooldowns
    );

    if !report.proxies.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Proxies ({}):", report.proxies.len());
        let mut proxies: Vec<_> = report.proxies.iter().collect();
        proxies.sort_by(|a, b| b.score.total_cmp(&a.score));
        for proxy in proxies {
            let latency = proxy
                .average_latency
                .map(|l| format!("{:.2}s", l.as_secs_f64()))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  {} ok={} failed={} latency={} score={:.2}{}",
                proxy.address,
                proxy.successes,
                proxy.failures,
                latency,
                proxy.score,
                if proxy.quarantined { " [quarantined]" } else { "" }
            );
        }
    }

    out
}

/// Prints a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
