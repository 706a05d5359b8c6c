//! The analysis job record and its pipeline state machine.
//!
//! An [`Analysis`] is created in [`AnalysisStatus::Pending`] with progress
//! `0.0` and is only ever moved forward through [`Analysis::advance`]:
//!
//! ```text
//! pending -> researching -> analyzing -> completed
//!                 |              |
//!                 +--> failed <--+
//! ```
//!
//! Progress is tied to the status: every successful transition sets the
//! value from [`AnalysisStatus::progress`], while a transition to `failed`
//! keeps the last value reached.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Progress of a freshly created record.
pub const PROGRESS_PENDING: f64 = 0.0;

/// Progress while the research phase is running.
pub const PROGRESS_RESEARCHING: f64 = 0.25;

/// Progress while the synthesis phase is running.
pub const PROGRESS_ANALYZING: f64 = 0.5;

/// Progress of a completed record.
pub const PROGRESS_COMPLETED: f64 = 1.0;

/// Parameter key holding the text returned by the research phase.
pub const PARAM_RESEARCH_DATA: &str = "research_data";

/// Parameter key holding the structured result of the synthesis phase.
pub const PARAM_ANALYSIS_RESULTS: &str = "analysis_results";

/// Parameter key holding the message of the error that failed the run.
pub const PARAM_ERROR: &str = "error";

/// Keys written by the pipeline. Callers may not supply them as input.
pub const RESERVED_PARAMETER_KEYS: [&str; 3] =
    [PARAM_RESEARCH_DATA, PARAM_ANALYSIS_RESULTS, PARAM_ERROR];

/// Maximum length of a research topic.
const MAX_TOPIC_LEN: usize = 500;

/// Maximum length of a title.
const MAX_TITLE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// AnalysisStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Researching,
    Analyzing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// Lowercase name used in the database and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Researching => "researching",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Progress value a record takes on when it enters this status.
    ///
    /// `None` for `failed`, which keeps the last value reached.
    pub fn progress(self) -> Option<f64> {
        match self {
            Self::Pending => Some(PROGRESS_PENDING),
            Self::Researching => Some(PROGRESS_RESEARCHING),
            Self::Analyzing => Some(PROGRESS_ANALYZING),
            Self::Completed => Some(PROGRESS_COMPLETED),
            Self::Failed => None,
        }
    }

    /// Whether `self -> next` is an edge of the pipeline state machine.
    ///
    /// `pending -> failed` is taken only when a run cannot persist its
    /// first transition.
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        use AnalysisStatus::*;
        matches!(
            (self, next),
            (Pending, Researching)
                | (Pending, Failed)
                | (Researching, Analyzing)
                | (Researching, Failed)
                | (Analyzing, Completed)
                | (Analyzing, Failed)
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "researching" => Ok(Self::Researching),
            "analyzing" => Ok(Self::Analyzing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown analysis status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// A persisted analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub topic: String,
    /// Input options plus the keys appended by the pipeline.
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub status: AnalysisStatus,
    pub progress: f64,
    pub owner_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Analysis {
    /// Build the initial record for `input` under a store-assigned `id`.
    pub fn from_new(id: DbId, input: NewAnalysis, now: Timestamp) -> Self {
        let title = input.title.unwrap_or_else(|| input.topic.clone());
        Self {
            id,
            title,
            description: input.description,
            topic: input.topic,
            parameters: input.parameters,
            status: AnalysisStatus::Pending,
            progress: PROGRESS_PENDING,
            owner_id: input.owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`. Called on every mutation.
    ///
    /// Never moves the timestamp backwards, so `updated_at >= created_at`
    /// holds even with a coarse clock.
    pub fn touch(&mut self) {
        let now = chrono::Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Move to `next`, updating progress per the state machine.
    pub fn advance(&mut self, next: AnalysisStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Validation(format!(
                "Invalid transition for analysis {}: {} -> {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        if let Some(progress) = next.progress() {
            self.progress = self.progress.max(progress);
        }
        self.touch();
        Ok(())
    }

    /// Append a result key to `parameters`.
    ///
    /// Existing keys are never overwritten.
    pub fn append_parameter(
        &mut self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), CoreError> {
        if self.parameters.contains_key(key) {
            return Err(CoreError::Conflict(format!(
                "Parameter '{key}' is already set on analysis {}",
                self.id
            )));
        }
        self.parameters.insert(key.to_string(), value);
        self.touch();
        Ok(())
    }

    /// Record `message` under `parameters.error` and move to `failed`.
    ///
    /// A record that is already terminal is left untouched.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        if !self.status.can_transition_to(AnalysisStatus::Failed) {
            return Err(CoreError::Validation(format!(
                "Analysis {} is already {}",
                self.id, self.status
            )));
        }
        self.parameters
            .insert(PARAM_ERROR.to_string(), message.into().into());
        self.advance(AnalysisStatus::Failed)
    }

    /// The failure message, if the run failed.
    pub fn error_message(&self) -> Option<&str> {
        self.parameters.get(PARAM_ERROR).and_then(|v| v.as_str())
    }

    /// Option value `focus_areas` as a list of strings.
    pub fn focus_areas(&self) -> Vec<String> {
        self.parameters
            .get("focus_areas")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input for creating a new analysis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAnalysis {
    pub topic: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub owner_id: Option<DbId>,
}

impl NewAnalysis {
    /// Shorthand for a topic with no options.
    pub fn from_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Check the input before it is persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(CoreError::Validation("Topic must not be empty".into()));
        }
        if topic.len() > MAX_TOPIC_LEN {
            return Err(CoreError::Validation(format!(
                "Topic must be at most {MAX_TOPIC_LEN} characters"
            )));
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(key) = RESERVED_PARAMETER_KEYS
            .iter()
            .find(|k| self.parameters.contains_key(**k))
        {
            return Err(CoreError::Validation(format!(
                "Parameter '{key}' is reserved for pipeline results"
            )));
        }
        Ok(())
    }
}

/// Editable descriptive fields of an analysis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnalysis {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateAnalysis {
    /// Apply the provided fields to `analysis`.
    pub fn apply(self, analysis: &mut Analysis) -> Result<(), CoreError> {
        if let Some(title) = self.title {
            validate_title(&title)?;
            analysis.title = title;
        }
        if let Some(description) = self.description {
            analysis.description = Some(description);
        }
        analysis.touch();
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation("Title must not be empty".into()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
