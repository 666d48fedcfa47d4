// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # govctl
//!
//! Entry point for the `govctl` binary. Parses CLI arguments, initializes
//! logging, runs one subcommand, and prints its JSON result on stdout.
//!
//! - `inspect-rules`: decode a rules container, explicitly unverified
//! - `verify`: run the full verification pipeline on one document
//! - `version`: print build version information
//!
//! Exit codes: `0` success, `1` any ordinary failure, `2` an integrity
//! failure (hash mismatch, missing quorum, unmet approvals). Treat `2` as a
//! potential security incident.

mod cli;
mod commands;
mod file_source;
mod logging;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use custody_governance::{ClientError, GovernanceError};

use cli::{Commands, GovctlCli};

const EXIT_INTEGRITY_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = GovctlCli::parse();
    logging::init_logging("govctl=info,custody_governance=info", cli.log_format);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let governance = governance_error(&err);
            match governance {
                Some(gov) => eprintln!("error [{}]: {err:#}", gov.kind()),
                None => eprintln!("error: {err:#}"),
            }
            if governance.is_some_and(GovernanceError::is_security_event) {
                tracing::error!(error = %err, "integrity failure");
                ExitCode::from(EXIT_INTEGRITY_FAILURE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::InspectRules(args) => print_json(&commands::inspect_rules(&args.file)?),
        Commands::Verify(args) => print_json(&commands::verify(&args)?),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The engine error behind `err`, whether it surfaced directly or through
/// the client.
fn governance_error(err: &anyhow::Error) -> Option<&GovernanceError> {
    err.downcast_ref::<GovernanceError>()
        .or_else(|| err.downcast_ref::<ClientError>().and_then(ClientError::governance))
}

fn print_version() {
    println!("govctl {}", env!("CARGO_PKG_VERSION"));
    println!(
        "signatures: {}, digest: {}",
        custody_governance::config::SIGNING_ALGORITHM,
        custody_governance::config::DIGEST_ALGORITHM
    );
    println!(
        "rules container: {} v{}",
        String::from_utf8_lossy(custody_governance::config::RULES_CONTAINER_MAGIC),
        custody_governance::config::RULES_CONTAINER_VERSION
    );
}
