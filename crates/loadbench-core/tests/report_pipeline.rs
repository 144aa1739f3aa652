//! End-to-end post-processing: raw counters and a JTL file in, reports out.

use loadbench_core::jmeter::{discover_plans, Artifacts};
use loadbench_core::profiling::clean_counter_csv;
use loadbench_core::{PerfSummary, ReportFormat, ResultWriter, RunStats, SuccessCriteria};
use std::path::Path;
use tempfile::TempDir;

const RAW_COUNTERS: &str = "\
\"(PDH-CSV 4.0)\",\"\\\\H\\Processor(_Total)\\% Processor Time\",\"\\\\H\\Memory\\Available MBytes\",\"\\\\H\\Memory\\% Committed Bytes In Use\",\"\\\\H\\PhysicalDisk(_Total)\\Disk Reads/sec\",\"\\\\H\\PhysicalDisk(_Total)\\Disk Writes/sec\",\"\\\\H\\Network Interface(eth0)\\Bytes Total/sec\",\"\\\\H\\Process(dotnet)\\% Processor Time\",\"\\\\H\\Process(dotnet)\\Working Set - Private\"

\"01/15/2025 10:00:00.000\",\"40\",\"4000\",\"30\",\"3\",\"4\",\"1000\",\"20\",\"52428800\"
\"01/15/2025 10:00:01.000\",\"60\",\"3900\",\"32\",\"5\",\"6\",\"3000\",\"30\",\"104857600\"
";

fn write_jtl(path: &Path) {
    let mut jtl = String::from("timeStamp,elapsed,label,responseCode,responseMessage,success,bytes\n");
    for i in 0..20_i64 {
        let label = if i % 2 == 0 { "GET Authors" } else { "GET Books" };
        jtl.push_str(&format!("{},{},{label},200,OK,true,256\n", 1_700_000_000_000 + i * 100, 20 + i));
    }
    std::fs::write(path, jtl).unwrap();
}

#[test]
fn test_counters_and_jtl_produce_reports() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("performance_raw.csv");
    let clean = dir.path().join("performance_clean.csv");
    std::fs::write(&raw, RAW_COUNTERS).unwrap();

    clean_counter_csv(&raw, &clean).unwrap();
    let perf = PerfSummary::from_csv(&clean).unwrap();
    assert_eq!(perf.samples, 2);
    assert_eq!(perf.cpu_total.avg, 50.0);
    assert_eq!(perf.target_memory_mb.peak, 100.0);
    assert_eq!(perf.duration_secs, Some(1.0));

    let plan = dir.path().join("authors.jmx");
    std::fs::write(&plan, "<jmeterTestPlan/>").unwrap();
    assert_eq!(discover_plans(dir.path()).unwrap(), vec![plan.clone()]);

    let artifacts = Artifacts::for_plan(&plan, &dir.path().join("results"));
    std::fs::create_dir_all(artifacts.results.parent().unwrap()).unwrap();
    write_jtl(&artifacts.results);
    let stats = RunStats::from_file(&artifacts.results).unwrap();
    assert_eq!(stats.overall.samples, 20);
    assert_eq!(stats.by_label.len(), 2);

    let criteria = SuccessCriteria {
        max_cpu_percent: Some(45.0),
        ..SuccessCriteria::default()
    };
    let writer = ResultWriter::new("authors", stats, Some(perf), criteria);
    assert!(!writer.passes());
    assert!(writer.failure_summary().contains("CPU average 50.0%"));

    let report = dir.path().join("results").join("authors_report.md");
    writer.write_report(&report, ReportFormat::Markdown).unwrap();
    let text = std::fs::read_to_string(report).unwrap();
    assert!(text.contains("**Status**: ❌ FAILED"));
    assert!(text.contains("Target process memory"));
}
