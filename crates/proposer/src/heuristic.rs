//! Rule-based proposer: fold the detector battery into a [`Proposal`]

use tracing::debug;

use autosmoke_common::{Evidence, Proposal, ProposedStep, RiskFlag};

use crate::detectors::{Finding, Inspection, StepEdit, DETECTORS};
use crate::Proposer;

/// Confidence before any detector runs, and after the fallback reset
pub const BASE_CONFIDENCE: f64 = 0.1;

/// Upper bound on reported confidence. There is no lower bound.
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Characters of the diff summary quoted in the rationale
pub const DIFF_PREVIEW_CHARS: usize = 100;

const DIFF_BONUS: f64 = 0.2;

const FALLBACK_SELECTOR: &str = r#"main, .main-content, [data-testid="main"], body > div:first-child"#;

/// Running accumulator for one proposal
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    rationale: Vec<String>,
    steps: Vec<ProposedStep>,
    risk_flags: Vec<RiskFlag>,
    confidence: f64,
}

impl Default for Scorecard {
    fn default() -> Self {
        Self {
            rationale: Vec::new(),
            steps: Vec::new(),
            risk_flags: Vec::new(),
            confidence: BASE_CONFIDENCE,
        }
    }
}

impl Scorecard {
    /// Fold one finding in
    pub fn apply(&mut self, finding: Finding) {
        self.rationale.extend(finding.rationale);
        for edit in finding.steps {
            match edit {
                StepEdit::Append(step) => self.steps.push(step),
                StepEdit::Prepend(step) => self.steps.insert(0, step),
            }
        }
        for flag in finding.risk_flags {
            if !self.risk_flags.contains(&flag) {
                self.risk_flags.push(flag);
            }
        }
        self.confidence += finding.delta;
    }

    /// With no proposed interaction, fall back to a visibility check and
    /// discard every confidence delta accumulated so far.
    pub fn apply_fallback(&mut self) {
        if !self.steps.is_empty() {
            return;
        }
        self.rationale
            .push("No clear interactions detected, suggesting basic visibility check".to_string());
        self.steps.push(ProposedStep::ExpectVisible {
            selector: FALLBACK_SELECTOR.to_string(),
            description: "Verify main content is visible".to_string(),
        });
        self.confidence = BASE_CONFIDENCE;
    }

    pub fn apply_diff(&mut self, diff_summary: Option<&str>) {
        let Some(diff) = diff_summary.filter(|d| !d.is_empty()) else {
            return;
        };
        let preview: String = diff.chars().take(DIFF_PREVIEW_CHARS).collect();
        self.rationale.push(format!("Git diff detected: {}...", preview));
        self.confidence += DIFF_BONUS;
    }

    /// Accumulated confidence, capped above at 1.0 and left unclamped below
    pub fn confidence(&self) -> f64 {
        self.confidence.min(MAX_CONFIDENCE)
    }

    pub fn steps(&self) -> &[ProposedStep] {
        &self.steps
    }

    pub fn into_proposal(self, route: &str) -> Proposal {
        let confidence = self.confidence();
        Proposal {
            route: route.to_string(),
            rationale: self.rationale,
            steps: self.steps,
            risk_flags: self.risk_flags,
            confidence,
        }
    }
}

/// The default proposer: a deterministic rule engine with no I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicProposer;

impl HeuristicProposer {
    pub fn new() -> Self {
        Self
    }
}

impl Proposer for HeuristicProposer {
    fn propose(&self, evidence: &Evidence) -> Proposal {
        let inspection = Inspection::new(evidence);
        let mut card = Scorecard::default();

        for (name, detector) in DETECTORS {
            let finding = detector(&inspection);
            if !finding.is_empty() {
                debug!(route = %evidence.route, detector = name, delta = finding.delta, "detector fired");
            }
            card.apply(finding);
        }

        card.apply_fallback();
        card.apply_diff(evidence.diff_summary.as_deref());
        card.into_proposal(&evidence.route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(delta: f64, flags: Vec<RiskFlag>) -> Finding {
        Finding {
            rationale: vec![format!("delta {delta}")],
            steps: vec![],
            risk_flags: flags,
            delta,
        }
    }

    #[test]
    fn test_accumulator_is_not_floored() {
        let mut card = Scorecard::default();
        card.apply(finding(-0.2, vec![RiskFlag::NetworkErrorsPresent]));
        assert!((card.confidence() - (-0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_accumulator_is_capped() {
        let mut card = Scorecard::default();
        for _ in 0..5 {
            card.apply(finding(0.5, vec![]));
        }
        assert_eq!(card.confidence(), 1.0);
    }

    #[test]
    fn test_fallback_resets_confidence() {
        let mut card = Scorecard::default();
        card.apply(finding(0.3, vec![]));
        card.apply(finding(-0.2, vec![]));
        card.apply_fallback();
        assert_eq!(card.confidence(), BASE_CONFIDENCE);
        assert_eq!(card.steps().len(), 1);
        assert_eq!(card.steps()[0].action(), "expect_visible");
    }

    #[test]
    fn test_fallback_skipped_when_steps_exist() {
        let mut card = Scorecard::default();
        card.apply(Finding {
            steps: vec![StepEdit::Append(ProposedStep::ExpectText {
                text: "x".into(),
                description: "x".into(),
            })],
            delta: 0.3,
            ..Default::default()
        });
        card.apply_fallback();
        assert_eq!(card.steps().len(), 1);
        assert!((card.confidence() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_prepend_goes_to_front() {
        let mut card = Scorecard::default();
        let expect = ProposedStep::ExpectText {
            text: "a".into(),
            description: "a".into(),
        };
        let wait = ProposedStep::Wait {
            timeout: 2000,
            description: "w".into(),
        };
        card.apply(Finding {
            steps: vec![StepEdit::Append(expect.clone())],
            ..Default::default()
        });
        card.apply(Finding {
            steps: vec![StepEdit::Prepend(wait.clone())],
            ..Default::default()
        });
        assert_eq!(card.steps(), &[wait, expect]);
    }

    #[test]
    fn test_diff_preview_truncated_to_100_chars() {
        let mut card = Scorecard::default();
        let diff = "x".repeat(250);
        card.apply_diff(Some(&diff));
        let line = &card.rationale[0];
        assert_eq!(line, &format!("Git diff detected: {}...", "x".repeat(100)));
        assert!((card.confidence() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_empty_diff_is_ignored() {
        let mut card = Scorecard::default();
        card.apply_diff(Some(""));
        assert!(card.rationale.is_empty());
        assert!((card.confidence() - BASE_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn test_short_diff_kept_whole() {
        let mut card = Scorecard::default();
        card.apply_diff(Some("M src/app/page.tsx"));
        assert_eq!(card.rationale, vec!["Git diff detected: M src/app/page.tsx..."]);
    }
}
