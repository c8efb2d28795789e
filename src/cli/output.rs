//! Plain-text rendering for scan records

use crate::model::ScanRecord;

/// Full record dump, one field per line, findings indented underneath.
pub fn print_record(record: &ScanRecord) {
    println!("scan      {}", record.id);
    println!("target    {}", record.target);
    println!("kind      {}", record.kind);
    println!("state     {}", record.state);
    println!("created   {}", record.created_at.to_rfc3339());
    if let Some(started) = record.started_at {
        println!("started   {}", started.to_rfc3339());
    }
    if let Some(finished) = record.finished_at {
        println!("finished  {}", finished.to_rfc3339());
    }
    if let Some(error) = &record.error {
        println!("error     {error}");
    }
    println!("findings  {}", record.findings.len());
    for finding in &record.findings {
        println!("  [{}] {}", finding.severity, finding.description);
    }
}

/// One-line summary for listings.
pub fn print_record_line(record: &ScanRecord) {
    println!(
        "{}  {:<9}  {:>3} findings  {}  {}",
        record.id,
        record.state.as_str(),
        record.findings.len(),
        record.created_at.to_rfc3339(),
        record.target
    );
}
