use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::tls::Version;

use crate::client::ensure_success;
use crate::config::WildFireConfig;
use crate::driver::SampleFetcher;
use crate::error::Result;

/// Palo Alto Networks WildFire public API, used as a sample feed.
pub struct WildFireClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl WildFireClient {
    pub fn new(config: &WildFireConfig) -> Result<Self> {
        let http = ClientBuilder::new().min_tls_version(Version::TLS_1_2).build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn get_sample(&self, hash: &str) -> Result<Vec<u8>> {
        let form = Form::new()
            .text("apikey", self.api_key.clone())
            .text("hash", hash.to_owned());
        let url = format!("{base}/publicapi/get/sample", base = self.base_url);
        tracing::info!(%hash, "downloading sample from wildfire");

        let response = ensure_success(self.http.post(url).multipart(form).send()?)?;
        Ok(response.bytes()?.to_vec())
    }
}

impl SampleFetcher for WildFireClient {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        self.get_sample(locator)
    }
}
