#![deny(clippy::all)]
#![warn(clippy::nursery)]

use std::io::{self, Write};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cuckoo_submit::args::{Args, Command, SubmissionArgs};
use cuckoo_submit::config::Config;
use cuckoo_submit::driver::{parse_yes_no, Driver, Outcome, SampleFetcher, SubmissionOptions};
use cuckoo_submit::tor::TorFetcher;
use cuckoo_submit::wildfire::WildFireClient;
use cuckoo_submit::CuckooClient;

fn ask_resubmit() -> bool {
    print!("Would you like to resubmit it? (y/N) ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }

    // an answer we cannot read counts as "no"
    parse_yes_no(&answer).unwrap_or(false)
}

fn driver<'a>(client: &'a CuckooClient, submission: &SubmissionArgs) -> Driver<'a, CuckooClient> {
    let driver = Driver::new(client, SubmissionOptions::from(submission));
    if submission.yes {
        driver.with_confirm(|| true)
    } else {
        driver.with_confirm(ask_resubmit)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    let client = CuckooClient::new(&config.sandbox).context("failed to initialize sandbox client")?;

    let outcome = match &args.command {
        Command::Submit { sample, submission } => driver(&client, submission).submit_samples(sample)?,
        Command::Tor { url, user_agent, submission } => {
            let fetcher = TorFetcher::new(&config.tor, user_agent.as_deref()).context("failed to initialize Tor client")?;
            driver(&client, submission).submit_via_tor(&fetcher, url)?
        }
        Command::Wildfire { hash, filename, submission } => {
            let wildfire = config.wildfire.as_ref().map(WildFireClient::new).transpose()
                .context("failed to initialize WildFire client")?;
            if wildfire.is_none() {
                tracing::info!("no WildFire API key configured; the sandbox will fetch the sample itself");
            }
            let feed = wildfire.as_ref().map(|wildfire| wildfire as &dyn SampleFetcher);
            driver(&client, submission).submit_by_hash(feed, hash, filename.as_deref())?
        }
    };

    if outcome == Outcome::Declined {
        tracing::info!("resubmission declined");
    }

    Ok(())
}
