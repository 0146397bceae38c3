//! Verify command implementation.

use offsetlog_core::{verify, LogConfig, ScanEnd, ScanReport};
use offsetlog_storage::FileBackend;
use std::path::Path;

/// Runs the verify command.
///
/// Reads every frame and checks its checksum without modifying the file.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("log file not found: {}", path.display()).into());
    }

    println!("Verifying log at {}", path.display());
    println!();

    let backend = FileBackend::open(path)?;
    let report = verify(&backend, &LogConfig::default())?;
    print_report(&report);

    println!();
    match report.end {
        ScanEnd::Corrupt { .. } => {
            println!("✗ Log verification failed");
            Err("verification failed".into())
        }
        _ => {
            println!("✓ Log verification passed");
            Ok(())
        }
    }
}

fn print_report(report: &ScanReport) {
    println!("  Records:    {}", report.records);
    println!("  Valid end:  {}", report.valid_end);
    println!("  File size:  {}", report.size);

    match &report.end {
        ScanEnd::Clean => println!("  Status:     clean"),
        ScanEnd::TornTail {
            offset,
            needed,
            available,
        } => {
            println!(
                "  Status:     torn tail at {offset} ({available} of {needed} bytes, {} trailing)",
                report.trailing_bytes()
            );
            println!("              the next open will truncate it");
        }
        ScanEnd::Corrupt { offset, reason } => {
            println!("  Status:     corrupt frame at {offset}: {reason}");
        }
    }
}
