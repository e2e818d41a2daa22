//! Core data model shared by discovery, the runner, and the proposer

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::RouteConfig;
use crate::error::{Error, Result};

// ============================================================================
// Routes
// ============================================================================

/// A single testable endpoint produced by route discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredRoute {
    /// Normalized URL path, `/` for the root
    pub path: String,

    /// Originating file, empty for routes declared only in config
    #[serde(default)]
    pub source_file: PathBuf,

    pub config: RouteConfig,

    /// True while the path still holds an unresolved `[segment]`
    pub is_dynamic: bool,
}

impl DiscoveredRoute {
    pub fn is_config_only(&self) -> bool {
        self.source_file.as_os_str().is_empty()
    }
}

// ============================================================================
// Evidence
// ============================================================================

/// One captured browser snapshot of a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub route: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Serialized page markup
    pub dom_snapshot: String,

    #[serde(default)]
    pub console_errors: Vec<String>,

    #[serde(default)]
    pub page_errors: Vec<String>,

    #[serde(default)]
    pub network_errors: Vec<String>,

    #[serde(default)]
    pub screenshot_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,

    #[serde(default)]
    pub timestamp: String,
}

impl Evidence {
    /// Parse evidence JSON, rejecting documents without `route` or `domSnapshot`
    pub fn from_json(json: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::InvalidEvidence {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::EvidenceNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, path)
    }
}

/// Evidence file name for a route: every `/` becomes `_`
pub fn evidence_file_name(route: &str) -> String {
    format!("{}.json", route.replace('/', "_"))
}

/// Proposal file name for an evidence file: `<stem>.proposal.json`
pub fn proposal_file_name(evidence_file: &Path) -> String {
    let stem = evidence_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}.proposal.json", stem)
}

// ============================================================================
// Proposals
// ============================================================================

/// A suggested follow-up interaction.
///
/// Each kind carries only the fields it uses; JSON puts the kind in `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProposedStep {
    Click {
        selector: String,
        description: String,
    },
    Type {
        selector: String,
        text: String,
        description: String,
    },
    ExpectText {
        text: String,
        description: String,
    },
    ExpectVisible {
        selector: String,
        description: String,
    },
    Wait {
        timeout: u64,
        description: String,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        description: String,
    },
}

impl ProposedStep {
    pub fn action(&self) -> &'static str {
        match self {
            ProposedStep::Click { .. } => "click",
            ProposedStep::Type { .. } => "type",
            ProposedStep::ExpectText { .. } => "expect_text",
            ProposedStep::ExpectVisible { .. } => "expect_visible",
            ProposedStep::Wait { .. } => "wait",
            ProposedStep::Scroll { .. } => "scroll",
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            ProposedStep::Click { selector, .. }
            | ProposedStep::Type { selector, .. }
            | ProposedStep::ExpectVisible { selector, .. } => Some(selector),
            ProposedStep::Scroll { selector, .. } => selector.as_deref(),
            ProposedStep::ExpectText { .. } | ProposedStep::Wait { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ProposedStep::Type { text, .. } | ProposedStep::ExpectText { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Option<u64> {
        match self {
            ProposedStep::Wait { timeout, .. } => Some(*timeout),
            _ => None,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ProposedStep::Click { description, .. }
            | ProposedStep::Type { description, .. }
            | ProposedStep::ExpectText { description, .. }
            | ProposedStep::ExpectVisible { description, .. }
            | ProposedStep::Wait { description, .. }
            | ProposedStep::Scroll { description, .. } => description,
        }
    }
}

/// Conditions that lower trust in a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    ConsoleErrorsPresent,
    RequiredFieldsPresent,
    NoTestIds,
    NetworkErrorsPresent,
}

impl RiskFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFlag::ConsoleErrorsPresent => "console_errors_present",
            RiskFlag::RequiredFieldsPresent => "required_fields_present",
            RiskFlag::NoTestIds => "no_test_ids",
            RiskFlag::NetworkErrorsPresent => "network_errors_present",
        }
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic output for one piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub route: String,
    pub rationale: Vec<String>,
    pub steps: Vec<ProposedStep>,
    pub risk_flags: Vec<RiskFlag>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_requires_dom_snapshot() {
        let err = Evidence::from_json(r#"{"route": "/", "consoleErrors": []}"#, Path::new("e.json"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEvidence { .. }));
        assert!(err.to_string().contains("domSnapshot"));
    }

    #[test]
    fn test_evidence_optional_fields_default() {
        let evidence = Evidence::from_json(
            r#"{"route": "/about", "domSnapshot": "<main></main>"}"#,
            Path::new("e.json"),
        )
        .unwrap();
        assert!(evidence.console_errors.is_empty());
        assert!(evidence.network_errors.is_empty());
        assert_eq!(evidence.diff_summary, None);
    }

    #[test]
    fn test_missing_evidence_file() {
        let err = Evidence::from_file(Path::new("/nonexistent/evidence.json")).unwrap_err();
        assert!(matches!(err, Error::EvidenceNotFound(_)));
    }

    #[test]
    fn test_step_json_shape() {
        let step = ProposedStep::Wait {
            timeout: 2000,
            description: "Wait for loading to complete".to_string(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "wait",
                "timeout": 2000,
                "description": "Wait for loading to complete"
            })
        );
        assert_eq!(step.timeout(), Some(2000));
        assert_eq!(step.selector(), None);
    }

    #[test]
    fn test_proposal_uses_camel_case_and_snake_flags() {
        let proposal = Proposal {
            route: "/".to_string(),
            rationale: vec![],
            steps: vec![],
            risk_flags: vec![RiskFlag::NoTestIds],
            confidence: 0.1,
        };
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["riskFlags"], serde_json::json!(["no_test_ids"]));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(evidence_file_name("/"), "_.json");
        assert_eq!(evidence_file_name("/items/42"), "_items_42.json");
        assert_eq!(proposal_file_name(Path::new("ev/_items_42.json")), "_items_42.proposal.json");
    }
}
