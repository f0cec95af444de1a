//! Findings recorded against an audit run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Area an issue was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FormInput,
    ApiConnection,
    Environment,
    Build,
}

/// Issue severity. Declaration order is sort order: critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::FormInput => "form_input",
            IssueKind::ApiConnection => "api_connection",
            IssueKind::Environment => "environment",
            IssueKind::Build => "build",
        }
    }
}

impl IssueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueSeverity::Critical => "critical",
            IssueSeverity::High => "high",
            IssueSeverity::Medium => "medium",
            IssueSeverity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIssue {
    pub id: Uuid,
    pub run_id: Uuid,
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl DetectedIssue {
    /// Materialize a finding for a run
    pub fn from_finding(run_id: Uuid, finding: IssueFinding) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            kind: finding.kind,
            severity: finding.severity,
            title: finding.title,
            description: finding.description,
            file_path: finding.file_path,
            line_number: finding.line_number,
            recommendation: finding.recommendation,
            is_resolved: false,
            created_at: Utc::now(),
        }
    }
}

/// An issue found by a step, before it is attached to a run
#[derive(Debug, Clone, PartialEq)]
pub struct IssueFinding {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub title: String,
    pub description: String,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub recommendation: Option<String>,
}

impl IssueFinding {
    /// Parse one `grep -n` match line (`path:line:text`) into a blocked-input finding.
    ///
    /// Lines without a `:` are not matches and yield `None`.
    pub fn blocked_input(match_line: &str) -> Option<Self> {
        let (file_path, rest) = match_line.split_once(':')?;
        let (line_number, description) = match rest.split_once(':') {
            Some((line, text)) => match line.trim().parse::<u32>() {
                Ok(n) => (Some(n), text),
                Err(_) => (None, rest),
            },
            None => (None, rest),
        };

        Some(Self {
            kind: IssueKind::FormInput,
            severity: IssueSeverity::Critical,
            title: "Form Input Blocked".to_string(),
            description: description.trim().to_string(),
            file_path: Some(file_path.to_string()),
            line_number,
            recommendation: Some(
                "Remove disabled or readonly attributes from form inputs".to_string(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_input_parses_grep_line() {
        let finding =
            IssueFinding::blocked_input("./client/src/kundali-form.tsx:42:  <input disabled />")
                .unwrap();

        assert_eq!(
            finding.file_path.as_deref(),
            Some("./client/src/kundali-form.tsx")
        );
        assert_eq!(finding.line_number, Some(42));
        assert_eq!(finding.description, "<input disabled />");
        assert_eq!(finding.severity, IssueSeverity::Critical);
        assert_eq!(finding.kind, IssueKind::FormInput);
    }

    #[test]
    fn test_blocked_input_without_line_number() {
        let finding = IssueFinding::blocked_input("src/a.tsx: readonly value").unwrap();
        assert_eq!(finding.line_number, None);
        assert_eq!(finding.description, "readonly value");
    }

    #[test]
    fn test_blocked_input_ignores_header_lines() {
        assert!(IssueFinding::blocked_input("Readonly attributes found").is_none());
    }

    #[test]
    fn test_severity_orders_critical_first() {
        let mut severities = vec![
            IssueSeverity::Low,
            IssueSeverity::Critical,
            IssueSeverity::Medium,
            IssueSeverity::High,
        ];
        severities.sort();
        assert_eq!(
            severities,
            vec![
                IssueSeverity::Critical,
                IssueSeverity::High,
                IssueSeverity::Medium,
                IssueSeverity::Low
            ]
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&IssueKind::FormInput).unwrap();
        assert_eq!(json, "\"form_input\"");
    }
}
