//! Wall-clock timing of build steps.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Timer {
    times: RefCell<HashMap<String, Duration>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` and records how long it took under `descr`, even on error.
    pub fn time<T>(&self, descr: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        self.record(descr, start.elapsed());
        result
    }

    pub fn record(&self, descr: &str, elapsed: Duration) {
        self.times.borrow_mut().insert(descr.to_string(), elapsed);
    }

    /// One `<duration> <description>` line per step, slowest first.
    pub fn report(&self) -> String {
        let times = self.times.borrow();
        let mut entries: Vec<(&String, &Duration)> = times.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        entries
            .into_iter()
            .map(|(descr, elapsed)| format!("{} {descr}", format_duration(*elapsed)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn report_to_file(&self, outfile: &Path) -> Result<()> {
        std::fs::write(outfile, self.report())
            .with_context(|| format!("Failed to write {}", outfile.display()))
    }
}

/// `H:MM:SS`, or `N day(s), H:MM:SS` past a day.
fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => hms,
        1 => format!("1 day, {hms}"),
        n => format!("{n} days, {hms}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_millis(3_725_900)), "1:02:05");
        assert_eq!(format_duration(Duration::from_secs(86_400 + 61)), "1 day, 0:01:01");
        assert_eq!(format_duration(Duration::from_secs(2 * 86_400)), "2 days, 0:00:00");
    }

    #[test]
    fn test_report_sorted_slowest_first() {
        let timer = Timer::new();
        timer.record("stage1", Duration::from_secs(600));
        timer.record("stage2", Duration::from_secs(3600));
        timer.record("libxml2_linux", Duration::from_secs(5));
        assert_eq!(
            timer.report(),
            "1:00:00 stage2\n0:10:00 stage1\n0:00:05 libxml2_linux"
        );
    }

    #[test]
    fn test_time_records_failures() {
        let timer = Timer::new();
        let result: Result<()> = timer.time("broken", || bail!("boom"));
        assert!(result.is_err());
        assert!(timer.report().ends_with(" broken"));

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("build_times.txt");
        timer.report_to_file(&file).unwrap();
        assert_eq!(std::fs::read_to_string(file).unwrap(), "0:00:00 broken");
    }
}
