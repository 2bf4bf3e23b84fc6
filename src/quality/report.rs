use super::tracker::DataQualityMetrics;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

fn reliability_badge(reliability: f64) -> &'static str {
    if reliability >= 0.9 {
        "🟢"
    } else if reliability >= 0.7 {
        "🟡"
    } else {
        "🔴"
    }
}

pub fn format_metrics(source: &str, metrics: &DataQualityMetrics) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} Data Quality: {} (as of {})\n",
        reliability_badge(metrics.source_reliability),
        source,
        metrics.timestamp.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    ));
    output.push_str(RULE);

    output.push_str("⏱️  Timeliness:\n");
    output.push_str(&format!("   • Average Latency:      {:.2} ms\n", metrics.average_latency_ms));
    output.push_str(&format!("   • Max Latency:          {:.2} ms\n", metrics.max_latency_ms));
    output.push_str(&format!("   • Latency StdDev:       {:.2} ms\n\n", metrics.latency_std_dev_ms));

    output.push_str("📦 Completeness:\n");
    output.push_str(&format!("   • Data Completeness:    {:.2}%\n", metrics.data_completeness));
    output.push_str(&format!("   • Missing Data Rate:    {:.2}%\n\n", metrics.missing_data_rate));

    output.push_str("🎯 Accuracy:\n");
    output.push_str(&format!("   • Price Accuracy:       {:.2}%\n", metrics.price_accuracy));
    output.push_str(&format!("   • Volume Accuracy:      {:.2}%\n", metrics.volume_accuracy));
    output.push_str(&format!("   • Order Book Accuracy:  {:.2}%\n\n", metrics.order_book_accuracy));

    output.push_str("🔧 Reliability:\n");
    output.push_str(&format!(
        "   • Source Reliability:   {:.2}%\n",
        metrics.source_reliability * 100.0
    ));
    output.push_str(&format!("   • Total Data Points:    {}\n", metrics.total_data_points));
    output.push_str(&format!("   • Valid Data Points:    {}\n", metrics.valid_data_points));
    output.push_str(&format!("   • Rejected Data Points: {}\n", metrics.rejected_data_points));

    output
}

pub fn format_summary(latest: &[(String, DataQualityMetrics)]) -> String {
    let mut output = String::new();

    output.push_str("\n╔══════════════════════════════════════════════════════════════════════╗\n");
    output.push_str("║                  DATA QUALITY SUMMARY REPORT                         ║\n");
    output.push_str("╚══════════════════════════════════════════════════════════════════════╝\n\n");

    if latest.is_empty() {
        output.push_str("No sources have reported data yet.\n");
        return output;
    }

    output.push_str(&format!("📊 Sources: {}\n\n", latest.len()));

    for (source, metrics) in latest {
        output.push_str(&format_metrics(source, metrics));
        output.push('\n');
    }

    output.push_str(RULE);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_contains_figures() {
        let metrics = DataQualityMetrics {
            average_latency_ms: 12.346,
            data_completeness: 80.0,
            missing_data_rate: 20.0,
            source_reliability: 0.5,
            total_data_points: 10,
            valid_data_points: 8,
            rejected_data_points: 2,
            ..Default::default()
        };

        let report = format_metrics("Binance", &metrics);
        assert!(report.contains("Binance"));
        assert!(report.contains("12.35 ms"));
        assert!(report.contains("Data Completeness:    80.00%"));
        assert!(report.contains("Missing Data Rate:    20.00%"));
        assert!(report.contains("Source Reliability:   50.00%"));
        assert!(report.contains("Rejected Data Points: 2"));
        assert!(report.starts_with("🔴"));
    }

    #[test]
    fn test_summary_lists_each_source() {
        let rows = vec![
            ("Binance".to_string(), DataQualityMetrics::default()),
            ("Coinbase".to_string(), DataQualityMetrics::default()),
        ];
        let summary = format_summary(&rows);
        assert!(summary.contains("DATA QUALITY SUMMARY REPORT"));
        assert!(summary.contains("Sources: 2"));
        assert!(summary.find("Binance").unwrap() < summary.find("Coinbase").unwrap());
    }

    #[test]
    fn test_empty_summary() {
        assert!(format_summary(&[]).contains("No sources have reported data yet."));
    }
}
