use crate::error::{Error, Result};
use crate::scrape::PageSource;
use crate::session::AuthSession;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://gorails.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_SESSION_COOKIE: &str = "_gorails_session";

/// Everything needed to open an outbound-connection context for one run.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub base_url: Url,
    pub user_agent: String,
    pub session_cookie: String,
    pub connect_timeout: Duration,
    pub page_timeout: Duration,
    /// Upper bound on the wait for the next body chunk; `None` waits forever.
    pub stall_timeout: Option<Duration>,
}

impl HttpSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            connect_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(60),
            stall_timeout: Some(Duration::from_secs(120)),
        }
    }

    /// Resolve `path` (absolute or relative) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|source| Error::InvalidUrl {
            url: path.to_string(),
            source,
        })
    }

    pub fn sign_in_url(&self) -> Result<Url> {
        self.url("/users/sign_in")
    }

    pub fn series_catalog_url(&self) -> Result<Url> {
        self.url("/series")
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"))
    }
}

/// One isolated outbound-connection context: its own connection pool and its
/// own cookie jar, seeded with a copy of the session credential.
#[derive(Debug, Clone)]
pub struct SessionClient {
    client: Client,
    settings: Arc<HttpSettings>,
}

impl SessionClient {
    pub fn new(settings: Arc<HttpSettings>, session: Option<&AuthSession>) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        if let Some(session) = session {
            jar.add_cookie_str(
                &format!("{}={}; Path=/", settings.session_cookie, session.token()),
                &settings.base_url,
            );
        }

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout)
            .cookie_provider(jar)
            .build()
            .map_err(|e| Error::http(&settings.base_url, e))?;

        Ok(Self { client, settings })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }
}

#[async_trait]
impl PageSource for SessionClient {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        debug!(url = %url, "fetching page");
        let response = self
            .client
            .get(url.clone())
            .timeout(self.settings.page_timeout)
            .send()
            .await
            .map_err(|e| Error::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|e| Error::http(url, e))
    }
}
