//! Proposal generation for a whole evidence directory

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use autosmoke_common::{proposal_file_name, write_json};
use autosmoke_proposer::{HeuristicProposer, Proposer};

use crate::commands::propose::propose_file;
use crate::output::{print_info, print_success};

#[derive(Args)]
pub struct BatchArgs {
    /// Directory of evidence JSON files
    #[arg(long, default_value = ".cache/evidence")]
    pub evidence_dir: PathBuf,

    /// Directory for the generated proposals
    #[arg(long, default_value = "./proposals")]
    pub output_dir: PathBuf,
}

/// One written proposal
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub route: String,
    pub output: PathBuf,
    pub confidence: f64,
}

/// Evidence inputs in sorted order, excluding earlier proposal output
pub fn evidence_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && name.ends_with(".json") && !name.ends_with(".proposal.json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Propose for every evidence file; the first unreadable file aborts the batch
pub fn run_batch(proposer: &dyn Proposer, evidence_dir: &Path, output_dir: &Path) -> Result<Vec<BatchEntry>> {
    if !evidence_dir.is_dir() {
        bail!("Evidence directory not found: {}", evidence_dir.display());
    }
    let files = evidence_files(evidence_dir)?;
    if files.is_empty() {
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    println!("🔍 Processing {} evidence files...", files.len());

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let proposal = propose_file(proposer, &file, None)
            .with_context(|| format!("Failed to process {}", file.display()))?;

        let output = output_dir.join(proposal_file_name(&file));
        write_json(&output, &proposal).with_context(|| format!("Failed to write {}", output.display()))?;

        println!(
            "✅ {} → {} (confidence: {:.1}%)",
            proposal.route,
            output.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            proposal.confidence * 100.0
        );
        written.push(BatchEntry {
            route: proposal.route,
            output,
            confidence: proposal.confidence,
        });
    }

    Ok(written)
}

pub fn execute(args: BatchArgs) -> Result<()> {
    let written = run_batch(&HeuristicProposer::new(), &args.evidence_dir, &args.output_dir)?;

    if written.is_empty() {
        print_info(&format!("No evidence files found in {}", args.evidence_dir.display()));
    } else {
        print_success(&format!(
            "Generated {} proposals in {}",
            written.len(),
            args.output_dir.display()
        ));
    }
    Ok(())
}
