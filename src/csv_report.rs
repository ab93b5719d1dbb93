//! Flat CSV export of every test in a run.

use crate::error::Result;
use crate::format::BuildInfo;
use crate::junit::Suite;
use std::io::Write;

pub const CSV_HEADER: [&str; 8] = [
    "BuildId",
    "Timestamp",
    "Classname",
    "Name",
    "Duration",
    "Status",
    "JobName",
    "BuildTag",
];

/// Writes one row per test, child suites before the suite's own tests.
/// Duration is in whole milliseconds.
pub fn write_csv<W: Write>(out: W, suites: &[Suite], build: &BuildInfo) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for suite in suites {
        write_suite(&mut writer, suite, build)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_suite<W: Write>(writer: &mut csv::Writer<W>, suite: &Suite, build: &BuildInfo) -> Result<()> {
    for child in &suite.suites {
        write_suite(writer, child, build)?;
    }
    for test in &suite.tests {
        let duration = test.duration.as_millis().to_string();
        writer.write_record([
            build.build_id.as_str(),
            build.timestamp.as_str(),
            test.classname.as_str(),
            test.name.as_str(),
            duration.as_str(),
            test.status.as_str(),
            build.job_name.as_str(),
            build.build_tag.as_str(),
        ])?;
    }
    Ok(())
}
