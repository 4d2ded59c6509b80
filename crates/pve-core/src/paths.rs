//! File layout conventions under the configured state directory.
//!
//! Pure string functions with no filesystem access. These define the canonical
//! names of the baseline, drift reports, state backups and execution records.

pub const BASELINE: &str = "baseline.json";

pub const DRIFT_REPORTS_DIR: &str = "drift_reports";

pub const BACKUPS_DIR: &str = "backups";

pub const EXECUTIONS_DIR: &str = "executions";

pub fn drift_report(slug: &str) -> String {
    format!("drift_report_{slug}.json")
}

pub fn state_backup(slug: &str) -> String {
    format!("state_backup_{slug}.json")
}

pub fn execution(id: &str) -> String {
    format!("{id}.json")
}

/// Sortable UTC timestamp used in document names, e.g. `20261017_093012_118`.
pub fn timestamp_slug(ts: jiff::Timestamp) -> String {
    ts.strftime("%Y%m%d_%H%M%S_%3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_sortable_and_millisecond_precise() {
        let ts: jiff::Timestamp = "2026-10-17T09:30:12.118Z".parse().unwrap();
        assert_eq!(timestamp_slug(ts), "20261017_093012_118");
        assert_eq!(
            drift_report(&timestamp_slug(ts)),
            "drift_report_20261017_093012_118.json"
        );
    }
}
