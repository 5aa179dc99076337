//! Authenticated Confer session.
//!
//! A [`Session`] owns the cookie-holding HTTP client. It is created once by
//! [`Session::login`] and passed explicitly to every call that talks to
//! Confer or the proceedings host.

use reqwest::Url;

use crate::{Config, CoreError};

/// Browser identity sent with every request; Confer serves its login form to browsers.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Confer login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    client: reqwest::Client,
    base_url: String,
    conference: String,
}

/// The login form found on Confer's login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoginForm {
    pub action: String,
    pub fields: Vec<(String, String)>,
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new(config: &Config) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            base_url: config.confer_url.trim_end_matches('/').to_string(),
            conference: config.conference.clone(),
        })
    }

    /// Log in to Confer and return the authenticated session.
    ///
    /// Fails with [`CoreError::Authentication`] when Confer rejects the
    /// credentials.
    pub async fn login(config: &Config, credentials: &Credentials) -> Result<Self, CoreError> {
        let session = Self::new(config)?;
        let login_url = session.url(&format!("/login?redirect_url=/{}/papers", session.conference));

        let page = session
            .client
            .get(&login_url)
            .send()
            .await?
            .error_for_status()?;
        let page_url = page.url().clone();
        let body = page.text().await?;

        let form = parse_login_form(&body)
            .ok_or_else(|| CoreError::Parse(format!("no login form at {login_url}")))?;
        let action = form_action_url(&page_url, &form.action)?;
        let fields = fill_credentials(form.fields, credentials);

        tracing::debug!(user = %credentials.user, action = %action, "submitting login form");
        let body = session
            .client
            .post(action)
            .form(&fields)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if let Some(message) = login_error(&body) {
            return Err(CoreError::Authentication(message));
        }

        tracing::info!(user = %credentials.user, conference = %session.conference, "logged in to Confer");
        Ok(session)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn conference(&self) -> &str {
        &self.conference
    }

    /// Absolute Confer URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Find the first form on the page with its action and submittable inputs.
///
/// Buttons are left out and checkboxes/radios only count when checked,
/// matching what a browser submits without clicking a specific button.
pub(crate) fn parse_login_form(html: &str) -> Option<LoginForm> {
    let document = scraper::Html::parse_document(html);
    let form_selector = scraper::Selector::parse("form").ok()?;
    let input_selector = scraper::Selector::parse("input[name]").ok()?;

    let form = document.select(&form_selector).next()?;
    let action = form.value().attr("action").unwrap_or("").to_string();

    let fields = form
        .select(&input_selector)
        .filter(|input| {
            let el = input.value();
            match el.attr("type").map(|t| t.to_ascii_lowercase()).as_deref() {
                Some("submit" | "button" | "image" | "reset" | "file") => false,
                Some("checkbox" | "radio") => el.attr("checked").is_some(),
                _ => true,
            }
        })
        .filter_map(|input| {
            let el = input.value();
            let name = el.attr("name")?.to_string();
            let value = el.attr("value").unwrap_or("").to_string();
            Some((name, value))
        })
        .collect();

    Some(LoginForm { action, fields })
}

/// Set `login_email` and `login_password`, adding them if the form lacks them.
fn fill_credentials(
    mut fields: Vec<(String, String)>,
    credentials: &Credentials,
) -> Vec<(String, String)> {
    for (name, value) in [
        ("login_email", &credentials.user),
        ("login_password", &credentials.password),
    ] {
        match fields.iter_mut().find(|(n, _)| n == name) {
            Some(field) => field.1 = value.clone(),
            None => fields.push((name.to_string(), value.clone())),
        }
    }
    fields
}

/// Confer re-renders the login page with a `div#error` when login fails.
pub(crate) fn login_error(html: &str) -> Option<String> {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("div#error").ok()?;
    let error = document.select(&selector).next()?;
    let text = error.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(if text.is_empty() {
        "login rejected".to_string()
    } else {
        text
    })
}

/// Resolve a possibly relative form action against the page URL.
/// An empty action posts back to the page itself.
fn form_action_url(page: &Url, action: &str) -> Result<Url, CoreError> {
    page.join(action)
        .map_err(|e| CoreError::Parse(format!("bad login form action {action:?}: {e}")))
}
