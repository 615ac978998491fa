//! Single-attempt HTTP fetching for booking pages and availability APIs.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use crate::core::FetchError;

const USER_AGENT: &str = concat!("slotwatch/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over a `reqwest::Client` with a fixed request timeout.
/// Callers decide whether a failed request is retried.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` with the given query parameters and return the body.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        self.send(self.client.get(url).query(query), url).await
    }

    /// POST a form-encoded body to `url` and return the response body.
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, FetchError> {
        self.send(self.client.post(url).form(form), url).await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<String, FetchError> {
        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(res.text().await?)
    }
}
