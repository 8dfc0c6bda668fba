use crate::client::SessionClient;
use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Follows the download link's redirect chain to the direct file URL.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: Client,
    timeout: Duration,
}

impl RedirectResolver {
    pub fn new(session: &SessionClient) -> Self {
        Self {
            client: session.http().clone(),
            timeout: session.settings().page_timeout,
        }
    }

    /// Returns the URL reached after every redirect. Only the response head is
    /// read; the body is dropped unread.
    pub async fn resolve(&self, indirect_url: &Url) -> Result<Url> {
        let failed = |reason: String| Error::RedirectResolutionFailed {
            url: indirect_url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(indirect_url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("terminal status {}", status)));
        }

        let direct = response.url().clone();
        debug!(from = %indirect_url, to = %direct, "resolved download redirect");
        Ok(direct)
    }
}
