use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::client::HttpSettings;
use crate::error::{Error, Result};
use crate::scrape::HtmlPage;
use crate::session::AuthSession;

const CSRF_META_NAME: &str = "csrf-token";
const ALERT_SELECTOR: &str = "div.alert, div.error";

/// Signs in with email and password and captures the session cookie.
pub struct Authenticator {
    settings: Arc<HttpSettings>,
}

impl Authenticator {
    pub fn new(settings: Arc<HttpSettings>) -> Self {
        Self { settings }
    }

    /// Submit the sign-in form. Succeeds when the platform hands back its
    /// session cookie and does not bounce back to the sign-in page.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(self.settings.user_agent.clone())
            .connect_timeout(self.settings.connect_timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| Error::http(&self.settings.base_url, e))?;
        let sign_in_url = self.settings.sign_in_url()?;

        debug!(url = %sign_in_url, "fetching sign-in form");
        let form_page = client
            .get(sign_in_url.clone())
            .timeout(self.settings.page_timeout)
            .send()
            .await
            .map_err(|e| Error::http(&sign_in_url, e))?;
        if !form_page.status().is_success() {
            return Err(Error::HttpStatus {
                url: sign_in_url.to_string(),
                status: form_page.status(),
            });
        }
        let html = form_page
            .text()
            .await
            .map_err(|e| Error::http(&sign_in_url, e))?;

        let csrf_token = HtmlPage::parse(&html)
            .meta_content(CSRF_META_NAME)
            .ok_or_else(|| {
                Error::AuthenticationFailed("no CSRF token on the sign-in page".to_string())
            })?;

        let form = [
            ("authenticity_token", csrf_token.as_str()),
            ("user[email]", email),
            ("user[password]", password),
            ("user[remember_me]", "1"),
            ("commit", "Log in"),
        ];

        debug!(email, "submitting sign-in form");
        let response = client
            .post(sign_in_url.clone())
            .form(&form)
            .timeout(self.settings.page_timeout)
            .send()
            .await
            .map_err(|e| Error::http(&sign_in_url, e))?;

        let status = response.status();
        let accepted = status.is_success() || status.is_redirection();
        let bounced = response.url().path() == sign_in_url.path();
        let body = response.text().await.unwrap_or_default();

        let cookie = cookie_value(&jar, &self.settings.base_url, &self.settings.session_cookie);
        if let (true, false, Some(token)) = (accepted, bounced, cookie) {
            info!(email, "signed in");
            return Ok(AuthSession::new(token));
        }

        let reason = HtmlPage::parse(&body)
            .first_text(ALERT_SELECTOR)
            .unwrap_or_else(|| {
                if !accepted {
                    format!("HTTP {}", status)
                } else if bounced {
                    "credentials were rejected".to_string()
                } else {
                    "no session cookie received".to_string()
                }
            });
        Err(Error::AuthenticationFailed(reason))
    }
}

/// Value of cookie `name` as the jar would send it to `url`.
fn cookie_value(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    header
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
