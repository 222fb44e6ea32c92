use reqwest::blocking::{Client, ClientBuilder};
use reqwest::tls::Version;
use reqwest::Proxy;
use url::Url;

use crate::client::ensure_success;
use crate::config::TorConfig;
use crate::driver::SampleFetcher;
use crate::error::Result;

/// Downloads samples through the Tor-facing HTTP proxy.
pub struct TorFetcher {
    http: Client,
}

impl TorFetcher {
    pub fn new(config: &TorConfig, user_agent: Option<&str>) -> Result<Self> {
        let http = ClientBuilder::new()
            .min_tls_version(Version::TLS_1_2)
            .proxy(Proxy::all(&config.proxy)?)
            .user_agent(user_agent.unwrap_or(&config.user_agent).to_owned())
            .build()?;

        Ok(Self { http })
    }
}

impl SampleFetcher for TorFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        tracing::info!(url = locator, "fetching sample through tor");
        let response = ensure_success(self.http.get(locator).send()?)?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Adds `http://` to bare host names such as `example.com/payload.exe`.
pub fn normalize_url(url: &str) -> String {
    if url.to_ascii_lowercase().starts_with("http") {
        url.to_owned()
    } else {
        format!("http://{url}")
    }
}

/// Last path segment of `url`, which names the sample when it is submitted.
pub fn file_name_from_url(url: &str) -> String {
    let path_tail = Url::parse(url)
        .ok()
        .and_then(|url| url.path_segments().and_then(|mut segments| segments.next_back().map(str::to_owned)));

    path_tail
        .filter(|name| !name.is_empty())
        .or_else(|| url.rsplit('/').next().filter(|name| !name.is_empty()).map(str::to_owned))
        .unwrap_or_else(|| "sample".to_owned())
}
