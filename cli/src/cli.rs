//! # CLI Interface
//!
//! Defines the command-line argument structure for `govctl` using `clap`
//! derive. Subcommands: `inspect-rules`, `verify`, and `version`.

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use custody_governance::DocumentKind;

use crate::logging::LogFormat;

/// Offline verifier for signed custody governance documents.
///
/// Loads pinned SuperAdmin keys from a config file and checks rules
/// containers, whitelisted addresses and assets, transaction requests,
/// and rules changes without contacting any service.
#[derive(Parser, Debug)]
#[command(
    name = "govctl",
    about = "Verify signed custody governance documents",
    version,
    propagate_version = true
)]
pub struct GovctlCli {
    /// Log output format (logs go to stderr).
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Pretty,
        env = "GOVCTL_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a rules container and print it. Performs NO signature checks.
    InspectRules(InspectRulesArgs),
    /// Verify a signed document and print the trusted result.
    Verify(VerifyArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `inspect-rules` subcommand.
#[derive(Parser, Debug)]
pub struct InspectRulesArgs {
    /// A binary rules container, or a JSON rules bundle.
    pub file: PathBuf,
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["document", "store"])))]
pub struct VerifyArgs {
    /// What the document claims to be.
    #[arg(value_enum)]
    pub kind: SubjectKind,

    /// Engine configuration (JSON) holding the pinned SuperAdmin keys.
    #[arg(long, short = 'c', env = "GOVCTL_CONFIG")]
    pub config: PathBuf,

    /// Signed document file to verify.
    #[arg(long, short = 'd')]
    pub document: Option<PathBuf>,

    /// Document store directory laid out as `<store>/<kind>/<id>.json`.
    #[arg(long, requires = "id")]
    pub store: Option<PathBuf>,

    /// Subject id to look up in `--store`.
    #[arg(long, requires = "store")]
    pub id: Option<String>,
}

/// Subject kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubjectKind {
    Rules,
    Address,
    Asset,
    Transaction,
    RulesChange,
}

impl From<SubjectKind> for DocumentKind {
    fn from(kind: SubjectKind) -> Self {
        match kind {
            SubjectKind::Rules => DocumentKind::RulesContainer,
            SubjectKind::Address => DocumentKind::WhitelistedAddress,
            SubjectKind::Asset => DocumentKind::WhitelistedAsset,
            SubjectKind::Transaction => DocumentKind::TransactionRequest,
            SubjectKind::RulesChange => DocumentKind::RulesChange,
        }
    }
}
