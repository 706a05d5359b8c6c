//! Reports built from the results of a completed analysis.

use serde::Serialize;
use serde_json::Value;

use crate::analysis::{Analysis, AnalysisStatus, PARAM_ANALYSIS_RESULTS};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Report format version.
pub const REPORT_VERSION: &str = "1.0";

/// Summary used when the results carry no market overview.
pub const NO_SUMMARY: &str = "No summary available";

/// Result sections rendered in order, keyed by their field in the results.
const SECTIONS: [(&str, &str); 6] = [
    ("market_overview", "Market overview"),
    ("competitive_analysis", "Competitive analysis"),
    ("trends", "Trends"),
    ("opportunities", "Opportunities"),
    ("risks", "Risks"),
    ("recommendations", "Recommendations"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// `report_{analysis_id}_{YYYYmmdd_HHMMSS}`.
    pub id: String,
    pub analysis_id: DbId,
    pub generated_at: Timestamp,
    pub title: String,
    pub topic: String,
    pub summary: String,
    pub key_findings: Vec<String>,
    pub sections: Vec<ReportSection>,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub heading: String,
    pub content: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub analysis_completed_at: Timestamp,
    pub version: &'static str,
}

impl Report {
    /// Build the report for `analysis`.
    ///
    /// Only completed analyses have reports; anything else is a
    /// [`CoreError::Conflict`].
    pub fn build(analysis: &Analysis, now: Timestamp) -> Result<Self, CoreError> {
        if analysis.status != AnalysisStatus::Completed {
            return Err(CoreError::Conflict(format!(
                "Analysis {} is {}; reports are only available for completed analyses",
                analysis.id, analysis.status
            )));
        }
        let results = analysis
            .parameters
            .get(PARAM_ANALYSIS_RESULTS)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "Completed analysis {} has no analysis results",
                    analysis.id
                ))
            })?;

        let sections = SECTIONS
            .iter()
            .filter_map(|(key, heading)| {
                results
                    .get(*key)
                    .filter(|v| !v.is_null())
                    .map(|content| ReportSection {
                        heading: (*heading).to_string(),
                        content: content.clone(),
                    })
            })
            .collect();

        Ok(Self {
            id: format!("report_{}_{}", analysis.id, now.format("%Y%m%d_%H%M%S")),
            analysis_id: analysis.id,
            generated_at: now,
            title: analysis.title.clone(),
            topic: analysis.topic.clone(),
            summary: summary(results.get("market_overview")),
            key_findings: key_findings(results.get("key_insights")),
            sections,
            metadata: ReportMetadata {
                analysis_completed_at: analysis.updated_at,
                version: REPORT_VERSION,
            },
        })
    }
}

/// `market_overview` is either a plain string or an object with `summary`.
fn summary(overview: Option<&Value>) -> String {
    match overview {
        Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
        Some(Value::Object(map)) => map
            .get("summary")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(NO_SUMMARY)
            .to_string(),
        _ => NO_SUMMARY.to_string(),
    }
}

fn key_findings(insights: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = insights else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::analysis::{NewAnalysis, PARAM_RESEARCH_DATA};

    fn completed_with(results: Value) -> Analysis {
        let mut a = Analysis::from_new(3, NewAnalysis::from_topic("heat pumps"), Utc::now());
        a.advance(AnalysisStatus::Researching).unwrap();
        a.append_parameter(PARAM_RESEARCH_DATA, json!("notes")).unwrap();
        a.advance(AnalysisStatus::Analyzing).unwrap();
        a.append_parameter(PARAM_ANALYSIS_RESULTS, results).unwrap();
        a.advance(AnalysisStatus::Completed).unwrap();
        a
    }

    #[test]
    fn report_collects_summary_findings_and_sections() {
        let analysis = completed_with(json!({
            "market_overview": {"summary": "Demand doubled since 2020", "growth_rate": "12%"},
            "key_insights": ["Subsidies drive adoption", {"title": "Installer shortage"}],
            "trends": [{"name": "Cold-climate units"}],
            "risks": [],
        }));
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();

        let report = Report::build(&analysis, now).unwrap();

        assert_eq!(report.id, "report_3_20260301_093005");
        assert_eq!(report.summary, "Demand doubled since 2020");
        assert_eq!(report.key_findings.len(), 2);
        assert_eq!(report.key_findings[0], "Subsidies drive adoption");
        let headings: Vec<_> = report.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Market overview", "Trends", "Risks"]);
        assert_eq!(report.metadata.analysis_completed_at, analysis.updated_at);
        assert_eq!(report.metadata.version, REPORT_VERSION);
    }

    #[test]
    fn plain_string_overview_is_the_summary() {
        let report = Report::build(&completed_with(json!({"market_overview": "growing"})), Utc::now())
            .unwrap();
        assert_eq!(report.summary, "growing");
        assert!(report.key_findings.is_empty());
    }

    #[test]
    fn missing_overview_falls_back() {
        let report = Report::build(&completed_with(json!({"risks": []})), Utc::now()).unwrap();
        assert_eq!(report.summary, NO_SUMMARY);
    }

    #[test]
    fn unfinished_analysis_has_no_report() {
        let mut a = Analysis::from_new(4, NewAnalysis::from_topic("tidal"), Utc::now());
        assert_matches!(Report::build(&a, Utc::now()), Err(CoreError::Conflict(_)));

        a.advance(AnalysisStatus::Researching).unwrap();
        a.fail("provider down").unwrap();
        assert_matches!(Report::build(&a, Utc::now()), Err(CoreError::Conflict(msg)) if msg.contains("failed"));
    }
}
