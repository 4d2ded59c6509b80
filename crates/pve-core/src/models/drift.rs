use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::ResourceCategory;

/// Coarse urgency ranking of a drift record. Ordered: `Low < Critical`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute of one resource whose live value differs from the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub resource_type: ResourceCategory,
    pub resource_id: String,
    /// Tracked attribute name, e.g. "memory", "role:PVEAdmin", "existence"
    pub attribute: String,
    pub expected_value: Value,
    pub actual_value: Value,
    pub severity: Severity,
    pub detected_at: jiff::Timestamp,
    pub remediation_required: bool,
}

impl DriftRecord {
    /// HIGH and CRITICAL drift starts out flagged for human follow-up.
    pub fn new(
        resource_type: ResourceCategory,
        resource_id: impl Into<String>,
        attribute: impl Into<String>,
        expected_value: Value,
        actual_value: Value,
        severity: Severity,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            attribute: attribute.into(),
            expected_value,
            actual_value,
            severity,
            detected_at: jiff::Timestamp::now(),
            remediation_required: severity >= Severity::High,
        }
    }

    /// Identity of the divergence, ignoring when it was observed.
    pub fn same_divergence(&self, other: &DriftRecord) -> bool {
        self.resource_type == other.resource_type
            && self.resource_id == other.resource_id
            && self.attribute == other.attribute
            && self.expected_value == other.expected_value
            && self.actual_value == other.actual_value
            && self.severity == other.severity
    }
}

/// Per-severity record counts. Every level is always present when serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
}

impl SeveritySummary {
    pub fn from_records(records: &[DriftRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            *summary.slot(record.severity) += 1;
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    fn slot(&mut self, severity: Severity) -> &mut usize {
        match severity {
            Severity::Low => &mut self.low,
            Severity::Medium => &mut self.medium,
            Severity::High => &mut self.high,
            Severity::Critical => &mut self.critical,
        }
    }
}

/// Audit document written once per detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: jiff::Timestamp,
    pub total_drifts: usize,
    pub by_severity: SeveritySummary,
    pub records: Vec<DriftRecord>,
}

impl DriftReport {
    pub fn new(records: Vec<DriftRecord>) -> Self {
        Self {
            generated_at: jiff::Timestamp::now(),
            total_drifts: records.len(),
            by_severity: SeveritySummary::from_records(&records),
            records,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.by_severity.critical > 0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(severity: Severity) -> DriftRecord {
        DriftRecord::new(
            ResourceCategory::Vm,
            "100",
            "memory",
            json!(2048),
            json!(4096),
            severity,
        )
    }

    #[test]
    fn only_high_and_critical_start_flagged() {
        assert!(!record(Severity::Low).remediation_required);
        assert!(!record(Severity::Medium).remediation_required);
        assert!(record(Severity::High).remediation_required);
        assert!(record(Severity::Critical).remediation_required);
    }

    #[test]
    fn report_histogram_counts_every_level() {
        let report = DriftReport::new(vec![
            record(Severity::High),
            record(Severity::High),
            record(Severity::Critical),
        ]);
        assert_eq!(report.total_drifts, 3);
        assert_eq!(report.by_severity.count(Severity::High), 2);
        assert_eq!(report.by_severity.count(Severity::Low), 0);
        assert!(report.has_critical());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["by_severity"]["LOW"], 0);
        assert_eq!(json["by_severity"]["CRITICAL"], 1);
        assert_eq!(json["records"][0]["severity"], "HIGH");
        assert_eq!(json["records"][0]["resource_type"], "vm");
    }

    #[test]
    fn divergence_identity_ignores_detection_time() {
        let a = record(Severity::High);
        let mut b = record(Severity::High);
        b.detected_at = a.detected_at + jiff::SignedDuration::from_secs(60);
        assert!(a.same_divergence(&b));
        assert_ne!(a, b);
    }
}
