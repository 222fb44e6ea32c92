use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexSet;

use crate::bundle::{bundle_files, BULK_ARCHIVE_NAME, BULK_ARCHIVE_PASSWORD};
use crate::client::SandboxApi;
use crate::console_message::{print_console_message, ConsoleMessage};
use crate::error::{Result, SandboxError};
use crate::hash::{classify, digest_with, HashAlgorithm, DEFAULT_BLOCK_SIZE};
use crate::model::TaskId;
use crate::poll::poll_until_done;
use crate::tor::{file_name_from_url, normalize_url};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A place samples can be downloaded from: a URL behind Tor, or a third-party feed keyed by hash.
pub trait SampleFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The operator chose not to resubmit an already analysed sample.
    Declined,
    Completed(Vec<TaskId>),
}

#[derive(Debug, Default, Clone)]
pub struct SubmissionOptions {
    pub tags: Option<String>,
    pub tor: bool,
    pub procmemdump: bool,
    /// Raw `key=value,...` text from the operator.
    pub extra: Option<String>,
}

impl SubmissionOptions {
    pub fn tags(&self) -> Option<&str> {
        self.tags.as_deref().filter(|tags| !tags.is_empty())
    }

    pub fn options_string(&self) -> Option<String> {
        let mut options = Vec::new();
        if self.tor {
            options.push("tor=yes");
        }
        if self.procmemdump {
            options.push("procmemdump=yes");
        }
        if let Some(extra) = self.extra.as_deref().filter(|extra| !extra.is_empty()) {
            options.push(extra);
        }

        (!options.is_empty()).then(|| options.join(","))
    }
}

/// Reads a yes/no answer. Anything unrecognised yields `None`.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Takes samples from wherever they come from to a finished analysis.
pub struct Driver<'a, A: SandboxApi + ?Sized> {
    api: &'a A,
    options: SubmissionOptions,
    poll_interval: Duration,
    confirm_resubmit: Box<dyn FnMut() -> bool + 'a>,
    sink: Box<dyn FnMut(ConsoleMessage) + 'a>,
}

impl<'a, A: SandboxApi + ?Sized> Driver<'a, A> {
    /// Declines every resubmission and prints to stdout until told otherwise.
    pub fn new(api: &'a A, options: SubmissionOptions) -> Self {
        Self {
            api,
            options,
            poll_interval: POLL_INTERVAL,
            confirm_resubmit: Box::new(|| false),
            sink: Box::new(print_console_message),
        }
    }

    pub fn with_confirm(mut self, confirm_resubmit: impl FnMut() -> bool + 'a) -> Self {
        self.confirm_resubmit = Box::new(confirm_resubmit);
        self
    }

    pub fn with_sink(mut self, sink: impl FnMut(ConsoleMessage) + 'a) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns `true` when it is fine to submit a sample with this hash.
    fn check_existing(&mut self, hash: &str) -> Result<bool> {
        let existing = self.api.find_tasks_by_hash(hash)?;
        if existing.is_empty() {
            return Ok(true);
        }

        tracing::info!(%hash, tasks = ?existing, "sample was analysed before");
        let urls = existing.iter().map(|task_id| self.api.analysis_url(task_id)).collect();
        (self.sink)(ConsoleMessage::ExistingAnalyses(urls));

        Ok((self.confirm_resubmit)())
    }

    fn submit_sample(&mut self, name: &str, bytes: Vec<u8>) -> Result<Vec<TaskId>> {
        let options = self.options.options_string();
        self.api.submit_file(name, bytes, self.options.tags(), options.as_deref())
    }

    fn finish(&mut self, task_ids: Vec<TaskId>) -> Result<Outcome> {
        (self.sink)(ConsoleMessage::Submitted(task_ids.clone()));
        poll_until_done(self.api, task_ids.clone(), self.poll_interval, &mut *self.sink)?;

        Ok(Outcome::Completed(task_ids))
    }

    /// Submits local files (globs allowed), or a single URL for the sandbox to visit.
    pub fn submit_samples(&mut self, samples: &[String]) -> Result<Outcome> {
        if let [url] = samples {
            if url.to_ascii_lowercase().starts_with("http") {
                let options = self.options.options_string();
                let task_ids = self.api.submit_url(url, self.options.tags(), options.as_deref())?;
                return self.finish(task_ids);
            }
        }

        let files = expand_patterns(samples)?;
        let task_ids = match files.as_slice() {
            [] => return Err(SandboxError::NoMatchingFiles),
            [file] => {
                let bytes = fs::read(file)?;
                let hash = digest_with(&mut Cursor::new(bytes.as_slice()), HashAlgorithm::Sha256, DEFAULT_BLOCK_SIZE)?;
                if !self.check_existing(&hash)? {
                    return Ok(Outcome::Declined);
                }
                self.submit_sample(&file_name(file), bytes)?
            }
            many => {
                tracing::info!(files = many.len(), "bundling samples into one archive");
                let archive = bundle_files(many, BULK_ARCHIVE_PASSWORD)?;
                self.submit_sample(BULK_ARCHIVE_NAME, archive)?
            }
        };

        self.finish(task_ids)
    }

    /// Downloads `url` through Tor and submits the payload.
    pub fn submit_via_tor<F: SampleFetcher + ?Sized>(&mut self, fetcher: &F, url: &str) -> Result<Outcome> {
        let url = normalize_url(url);
        let bytes = fetcher.fetch(&url)?;
        let hash = digest_with(&mut Cursor::new(bytes.as_slice()), HashAlgorithm::Sha256, DEFAULT_BLOCK_SIZE)?;
        if !self.check_existing(&hash)? {
            return Ok(Outcome::Declined);
        }

        let task_ids = self.submit_sample(&file_name_from_url(&url), bytes)?;
        self.finish(task_ids)
    }

    /// Submits a sample known only by its hash. With a `feed` the sample is downloaded here,
    /// otherwise the sandbox is asked to fetch it itself.
    pub fn submit_by_hash(&mut self, feed: Option<&dyn SampleFetcher>, hash: &str, sample_name: Option<&str>) -> Result<Outcome> {
        classify(hash)?;
        if !self.check_existing(hash)? {
            return Ok(Outcome::Declined);
        }

        let task_ids = match feed {
            Some(feed) => {
                let bytes = feed.fetch(hash)?;
                self.submit_sample(sample_name.unwrap_or(hash), bytes)?
            }
            None => {
                let options = self.options.options_string();
                self.api.submit_hash_lookup(hash, self.options.tags(), options.as_deref())?
            }
        };

        self.finish(task_ids)
    }
}

/// Expands every pattern, keeping first-seen order. Overlapping patterns yield each path once.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = IndexSet::new();
    for pattern in patterns {
        for entry in glob::glob(pattern)? {
            let path = entry.map_err(io::Error::from)?;
            if !files.insert(path.clone()) {
                tracing::warn!(path = %path.display(), "sample listed more than once");
            }
        }
    }

    Ok(files.into_iter().collect())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}
