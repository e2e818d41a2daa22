//! Single-file proposal generation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use autosmoke_common::{write_json, Error, Evidence, Proposal};
use autosmoke_proposer::{HeuristicProposer, ModelProposer, Proposer};

use crate::output::print_success;

#[derive(Args)]
pub struct ProposeArgs {
    /// Evidence JSON file captured by a smoke run
    #[arg(short, long)]
    pub evidence: PathBuf,

    /// Only accept evidence for this route
    #[arg(short, long)]
    pub route: Option<String>,

    /// Write the proposal here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Model provider to ask instead of the heuristic rules
    #[arg(long)]
    pub model: Option<String>,
}

pub fn proposer_for(model: Option<String>) -> Box<dyn Proposer> {
    match model {
        Some(provider) => Box::new(ModelProposer::new(Some(provider))),
        None => Box::new(HeuristicProposer::new()),
    }
}

/// Load evidence, check the route filter, and propose
pub fn propose_file(
    proposer: &dyn Proposer,
    evidence_path: &Path,
    expected_route: Option<&str>,
) -> Result<Proposal> {
    let evidence = Evidence::from_file(evidence_path)?;

    if let Some(expected) = expected_route {
        if evidence.route != expected {
            return Err(Error::RouteMismatch {
                expected: expected.to_string(),
                actual: evidence.route,
            }
            .into());
        }
    }

    Ok(proposer.propose(&evidence))
}

pub fn execute(args: ProposeArgs) -> Result<()> {
    let proposer = proposer_for(args.model);
    let proposal = propose_file(proposer.as_ref(), &args.evidence, args.route.as_deref())?;

    match args.output {
        Some(path) => {
            write_json(&path, &proposal)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Proposal written to {}", path.display()));
        }
        None => {
            let json = serde_json::to_string_pretty(&proposal).context("Failed to serialize proposal")?;
            println!("{}", json);
        }
    }

    Ok(())
}
