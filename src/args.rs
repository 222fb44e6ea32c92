use std::path::PathBuf;
use clap::{Parser, Subcommand};
use crate::driver::SubmissionOptions;

#[derive(Parser)]
#[clap(version, about = "Submits samples to a Cuckoo sandbox and waits for the analyses to finish")]
pub struct Args {
    /// TOML file with the sandbox location and credentials
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit one or more files or globs, or a single URL
    Submit {
        #[clap(required = true)]
        sample: Vec<String>,
        #[clap(flatten)]
        submission: SubmissionArgs,
    },
    /// Download a file via Tor and submit it
    Tor {
        url: String,
        /// The user agent to spoof while downloading
        #[clap(long)]
        user_agent: Option<String>,
        #[clap(flatten)]
        submission: SubmissionArgs,
    },
    /// Submit a sample known by its MD5, SHA1, or SHA256 hash, fetched from WildFire
    Wildfire {
        hash: String,
        /// The filename of the sample
        filename: Option<String>,
        #[clap(flatten)]
        submission: SubmissionArgs,
    },
}

#[derive(clap::Args)]
pub struct SubmissionArgs {
    /// Comma separated tags for selecting an analysis VM
    #[clap(long)]
    pub tags: Option<String>,
    /// Comma separated option=value pairs
    #[clap(long)]
    pub options: Option<String>,
    /// Enable Tor during analysis
    #[clap(long)]
    pub tor: bool,
    /// Dump and analyze process memory
    #[clap(long)]
    pub procmemdump: bool,
    /// Resubmit without asking when the sample was already analysed
    #[clap(short, long)]
    pub yes: bool,
}

impl From<&SubmissionArgs> for SubmissionOptions {
    fn from(args: &SubmissionArgs) -> Self {
        Self {
            tags: args.tags.clone(),
            tor: args.tor,
            procmemdump: args.procmemdump,
            extra: args.options.clone(),
        }
    }
}
