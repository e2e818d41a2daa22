//! Model-backed proposer
//!
//! Placeholder for a proposer driven by an external model. No backend is
//! wired up yet, so every call is served by [`HeuristicProposer`].

use tracing::warn;

use autosmoke_common::{Evidence, Proposal};

use crate::heuristic::HeuristicProposer;
use crate::Proposer;

#[derive(Debug, Clone, Default)]
pub struct ModelProposer {
    provider: Option<String>,
    fallback: HeuristicProposer,
}

impl ModelProposer {
    pub fn new(provider: Option<String>) -> Self {
        Self {
            provider,
            fallback: HeuristicProposer::new(),
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }
}

impl Proposer for ModelProposer {
    fn propose(&self, evidence: &Evidence) -> Proposal {
        warn!(
            provider = self.provider.as_deref().unwrap_or("unset"),
            "Model proposer not implemented yet, using heuristic proposer"
        );
        self.fallback.propose(evidence)
    }
}
