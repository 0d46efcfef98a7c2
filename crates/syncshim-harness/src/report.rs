//! Report generation for conformance results.

use serde::{Deserialize, Serialize};

/// Result of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    /// Scenario name.
    pub scenario: String,
    /// Primary ABI entry point exercised.
    pub symbol: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    /// Code returned by `symbol` during the run.
    pub result_code: i32,
    /// Wall-clock time for the scenario.
    pub latency_ns: u64,
}

/// Aggregate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<CaseResult>,
}

impl ConformanceSummary {
    /// Build a summary from a list of results.
    #[must_use]
    pub fn from_results(results: Vec<CaseResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// A conformance report for one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub title: String,
    /// Primitive backend the library was built with.
    pub backend: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    pub run_id: String,
    pub summary: ConformanceSummary,
}

impl ConformanceReport {
    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Backend: {}\n", self.backend));
        out.push_str(&format!("- Run: {}\n", self.run_id));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Scenario | Symbol | Status | Actual |\n");
        out.push_str("|----------|--------|--------|--------|\n");
        for r in &self.summary.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| {} | `{}` | {} | {} |\n",
                r.scenario, r.symbol, status, r.actual
            ));
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str, passed: bool) -> CaseResult {
        CaseResult {
            scenario: name.to_string(),
            symbol: "shim_mtx_lock".to_string(),
            passed,
            expected: "4000".to_string(),
            actual: if passed { "4000" } else { "3999" }.to_string(),
            result_code: 0,
            latency_ns: 10,
        }
    }

    #[test]
    fn summary_counts() {
        let summary = ConformanceSummary::from_results(vec![case("a", true), case("b", false)]);
        assert_eq!((summary.total, summary.passed, summary.failed), (2, 1, 1));
        assert!(!summary.all_passed());
    }

    #[test]
    fn markdown_lists_each_scenario() {
        let report = ConformanceReport {
            title: "syncshim conformance".to_string(),
            backend: "native".to_string(),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            run_id: "run-1".to_string(),
            summary: ConformanceSummary::from_results(vec![case("a", true), case("b", false)]),
        };
        let md = report.to_markdown();
        assert!(md.contains("| a | `shim_mtx_lock` | PASS | 4000 |"));
        assert!(md.contains("| b | `shim_mtx_lock` | FAIL | 3999 |"));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["summary"]["failed"], 1);
    }
}
