//! AutoSmoke proposer
//!
//! Turns one captured [`Evidence`] snapshot into a ranked, explainable
//! [`Proposal`] of follow-up test steps.
//!
//! ```text
//! Evidence ─> Inspection (lowercased DOM)
//!               │
//!               ├─ console_errors ─┐
//!               ├─ data_table      │
//!               ├─ create_flow     │  Findings, folded in order
//!               ├─ required_fields ├──────────────> Scorecard
//!               ├─ test_ids        │                   │
//!               ├─ loading_state   │           fallback, diff bonus
//!               └─ network_errors ─┘                   │
//!                                                   Proposal
//! ```

pub mod detectors;
pub mod heuristic;
pub mod model;

use autosmoke_common::{Evidence, Proposal};

pub use detectors::{Finding, Inspection, StepEdit};
pub use heuristic::{HeuristicProposer, Scorecard, BASE_CONFIDENCE};
pub use model::ModelProposer;

/// Anything that can turn evidence into a proposal.
///
/// Implementations must be pure: identical evidence yields an identical
/// proposal, and nothing is written anywhere.
pub trait Proposer {
    fn propose(&self, evidence: &Evidence) -> Proposal;
}

/// Propose with the default heuristic engine
pub fn propose(evidence: &Evidence) -> Proposal {
    HeuristicProposer::new().propose(evidence)
}
