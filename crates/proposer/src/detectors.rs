//! Independent pattern detectors
//!
//! Each detector is a pure function from an [`Inspection`] to a
//! [`Finding`]. They never see each other's output; ordering and
//! accumulation happen in [`crate::heuristic`].

use once_cell::sync::Lazy;
use regex::Regex;

use autosmoke_common::{Evidence, ProposedStep, RiskFlag};

/// Timeout of the wait step added when loading indicators are present
pub const LOADING_WAIT_MS: u64 = 2000;

/// Literal typed into the first text input of a creation form
pub const SAMPLE_ITEM_TEXT: &str = "Test Item";

const NEXT_PAGE_SELECTOR: &str =
    r#"[data-testid="next-page"], .pagination .next, button[aria-label*="next"]"#;
const CREATE_BUTTON_SELECTOR: &str = r#"button:has-text("Create"), button:has-text("New"), button:has-text("Add"), [data-testid*="create"], [data-testid*="new"], [data-testid*="add"]"#;
const TEXT_INPUT_SELECTOR: &str =
    r#"input[type="text"]:first, input[name*="name"]:first, input[name*="title"]:first"#;
const SUBMIT_BUTTON_SELECTOR: &str = r#"button:has-text("Save"), button:has-text("Submit"), button:has-text("Create"), button[type="submit"]"#;

static CREATE_BUTTON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)button[^>]*>(create|new|add|plus)").expect("valid regex"));
static SUBMIT_BUTTON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)button[^>]*>(save|submit|create|confirm)").expect("valid regex"));

/// Evidence plus its case-folded DOM, computed once per proposal
pub struct Inspection<'a> {
    pub evidence: &'a Evidence,
    pub dom: String,
}

impl<'a> Inspection<'a> {
    pub fn new(evidence: &'a Evidence) -> Self {
        Self {
            evidence,
            dom: evidence.dom_snapshot.to_lowercase(),
        }
    }

    fn contains(&self, needle: &str) -> bool {
        self.dom.contains(needle)
    }

    fn count(&self, needle: &str) -> usize {
        self.dom.matches(needle).count()
    }
}

/// Where a step goes in the accumulated sequence
#[derive(Debug, Clone, PartialEq)]
pub enum StepEdit {
    Append(ProposedStep),
    Prepend(ProposedStep),
}

/// One detector's contribution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Finding {
    pub rationale: Vec<String>,
    pub steps: Vec<StepEdit>,
    pub risk_flags: Vec<RiskFlag>,
    pub delta: f64,
}

impl Finding {
    fn none() -> Self {
        Self::default()
    }

    fn because(reason: impl Into<String>) -> Self {
        Self {
            rationale: vec![reason.into()],
            ..Self::default()
        }
    }

    fn append(mut self, step: ProposedStep) -> Self {
        self.steps.push(StepEdit::Append(step));
        self
    }

    fn prepend(mut self, step: ProposedStep) -> Self {
        self.steps.push(StepEdit::Prepend(step));
        self
    }

    fn flag(mut self, flag: RiskFlag) -> Self {
        self.risk_flags.push(flag);
        self
    }

    fn delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rationale.is_empty() && self.steps.is_empty() && self.risk_flags.is_empty() && self.delta == 0.0
    }
}

pub type Detector = fn(&Inspection<'_>) -> Finding;

/// The battery, in evaluation order
pub const DETECTORS: [(&str, Detector); 7] = [
    ("console_errors", console_errors),
    ("data_table", data_table),
    ("create_flow", create_flow),
    ("required_fields", required_fields),
    ("test_ids", test_ids),
    ("loading_state", loading_state),
    ("network_errors", network_errors),
];

pub fn console_errors(inspection: &Inspection<'_>) -> Finding {
    if inspection.evidence.console_errors.is_empty() {
        return Finding::none();
    }

    Finding::because("Console errors detected, suggesting error handling verification")
        .append(ProposedStep::ExpectText {
            text: "error".to_string(),
            description: "Verify error message is displayed".to_string(),
        })
        .flag(RiskFlag::ConsoleErrorsPresent)
        .delta(0.3)
}

pub fn data_table(inspection: &Inspection<'_>) -> Finding {
    if !(inspection.contains("table") && inspection.contains("tbody")) {
        return Finding::none();
    }

    // A header row alone does not count as data
    let has_rows = inspection.count("<tr") > 1;
    if !has_rows {
        return Finding::because("Empty table detected, checking for empty state")
            .append(ProposedStep::ExpectText {
                text: "No data".to_string(),
                description: "Verify empty state message".to_string(),
            })
            .delta(0.2);
    }

    let finding = Finding::because("Table with data detected, checking pagination");
    if inspection.contains("next") || inspection.contains("pagination") {
        finding
            .append(ProposedStep::Click {
                selector: NEXT_PAGE_SELECTOR.to_string(),
                description: "Test pagination next button".to_string(),
            })
            .delta(0.4)
    } else {
        finding
    }
}

pub fn create_flow(inspection: &Inspection<'_>) -> Finding {
    if !CREATE_BUTTON.is_match(&inspection.dom) {
        return Finding::none();
    }

    let mut finding = Finding::because("Create/New button detected, testing creation flow")
        .append(ProposedStep::Click {
            selector: CREATE_BUTTON_SELECTOR.to_string(),
            description: "Click create/new button".to_string(),
        });

    if inspection.contains("input") && inspection.contains(r#"type="text""#) {
        finding = finding.append(ProposedStep::Type {
            selector: TEXT_INPUT_SELECTOR.to_string(),
            text: SAMPLE_ITEM_TEXT.to_string(),
            description: "Fill in main text field".to_string(),
        });
    }

    if SUBMIT_BUTTON.is_match(&inspection.dom) {
        finding = finding
            .append(ProposedStep::Click {
                selector: SUBMIT_BUTTON_SELECTOR.to_string(),
                description: "Submit the form".to_string(),
            })
            .append(ProposedStep::ExpectText {
                text: "created|saved|success".to_string(),
                description: "Verify success message".to_string(),
            });
    }

    finding.delta(0.5)
}

pub fn required_fields(inspection: &Inspection<'_>) -> Finding {
    if !inspection.contains("form") {
        return Finding::none();
    }

    let required = inspection.count("required");
    if required == 0 {
        return Finding::none();
    }

    Finding::because(format!("Form with {} required fields detected", required))
        .flag(RiskFlag::RequiredFieldsPresent)
        .delta(0.2)
}

pub fn test_ids(inspection: &Inspection<'_>) -> Finding {
    if inspection.contains("[data-testid") || inspection.contains("data-testid=") {
        Finding::because("Test IDs found, using stable selectors").delta(0.3)
    } else {
        Finding::because("No test IDs found, using less stable selectors").flag(RiskFlag::NoTestIds)
    }
}

pub fn loading_state(inspection: &Inspection<'_>) -> Finding {
    if !(inspection.contains("loading") || inspection.contains("spinner")) {
        return Finding::none();
    }

    Finding::because("Loading states detected, adding wait steps")
        .prepend(ProposedStep::Wait {
            timeout: LOADING_WAIT_MS,
            description: "Wait for loading to complete".to_string(),
        })
        .delta(0.1)
}

pub fn network_errors(inspection: &Inspection<'_>) -> Finding {
    if inspection.evidence.network_errors.is_empty() {
        return Finding::none();
    }

    Finding::because("Network errors detected in evidence")
        .flag(RiskFlag::NetworkErrorsPresent)
        .delta(-0.2)
}
