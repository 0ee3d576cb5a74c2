//! Authenticated HTTP session for the MangaBuff site.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use url::Url;

use crate::{body, ClientConfig, Error, Profile};

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "ru,en;q=0.8";

/// Browser-like session built once from a stored profile.
///
/// Two clients share one cookie jar: `http` follows redirects, `no_redirect`
/// stops at the first response so callers can inspect `Location`.
pub struct Session {
    base_url: String,
    base: Url,
    http: reqwest::Client,
    no_redirect: reqwest::Client,
    jar: Arc<Jar>,
    csrf_token: Option<String>,
    max_content_bytes: u64,
}

/// Status and headers of a response whose body has not been read yet.
pub struct Reply {
    status: u16,
    location: Option<String>,
    content_type: Option<String>,
    inner: reqwest::Response,
    limit: u64,
}

/// A fully read and decoded response.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub status: u16,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub text: String,
    pub json: Option<serde_json::Value>,
}

impl Page {
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303)
    }
}

impl Reply {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Read the capped body and decode it.
    pub async fn into_page(self) -> Result<Page, Error> {
        let bytes = body::read_capped(self.inner, self.limit).await?;
        let (text, json) = body::decode_body(&bytes, self.content_type.as_deref());
        Ok(Page {
            status: self.status,
            location: self.location,
            content_type: self.content_type,
            text,
            json,
        })
    }
}

impl Session {
    /// Build a session carrying the profile's cookies and header overrides.
    pub fn from_profile(profile: &Profile, config: &ClientConfig) -> Result<Self, Error> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let jar = Arc::new(Jar::default());
        for (name, value) in profile.cookie.iter().filter(|(_, v)| !v.is_empty()) {
            jar.add_cookie_str(&format!("{}={}; Path=/", name, value), &base);
        }

        let csrf_token = profile.csrf_token().map(str::to_string);
        let headers = default_headers(profile, config, csrf_token.as_deref());

        let build = |policy: Policy| {
            reqwest::Client::builder()
                .default_headers(headers.clone())
                .cookie_provider(jar.clone())
                .connect_timeout(config.connect_timeout)
                .read_timeout(config.read_timeout)
                .redirect(policy)
                .build()
                .map_err(|e| {
                    tracing::error!("Failed to build HTTP client: {}", e);
                    Error::ClientBuild(e)
                })
        };

        Ok(Self {
            http: build(Policy::default())?,
            no_redirect: build(Policy::none())?,
            base_url,
            base,
            jar,
            csrf_token,
            max_content_bytes: config.max_content_bytes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a site path such as `/trades/create`.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn set_csrf_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.csrf_token = if token.is_empty() { None } else { Some(token) };
    }

    /// Cookies the jar would send to the site root.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        let Some(header) = self.jar.cookies(&self.base) else {
            return BTreeMap::new();
        };
        header
            .to_str()
            .unwrap_or("")
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies().contains_key(name)
    }

    /// Headers of an XHR issued from the partner's offer page.
    pub fn ajax_headers(&self, referer: &str) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Referer", referer.to_string()),
            ("Origin", self.base_url.clone()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
            (
                "Accept",
                "application/json, text/javascript, */*; q=0.01".to_string(),
            ),
        ];
        if let Some(token) = &self.csrf_token {
            headers.push(("X-CSRF-TOKEN", token.clone()));
        }
        headers
    }

    /// GET following redirects.
    pub async fn get(&self, url: &str) -> Result<Reply, Error> {
        let req = self.http.get(self.parse(url)?);
        self.send(req).await
    }

    /// GET that stops at the first response.
    pub async fn get_no_redirect(&self, url: &str) -> Result<Reply, Error> {
        let req = self.no_redirect.get(self.parse(url)?);
        self.send(req).await
    }

    /// GET with query parameters appended to the URL.
    pub async fn get_query(&self, url: &str, params: &[(&str, String)]) -> Result<Reply, Error> {
        let url = Url::parse_with_params(&self.url(url), params).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.send(self.http.get(url)).await
    }

    /// Form-encoded POST. Repeated keys are sent in order.
    pub async fn post_form(
        &self,
        url: &str,
        headers: &[(&str, String)],
        form: &[(String, String)],
        follow_redirects: bool,
    ) -> Result<Reply, Error> {
        let client = if follow_redirects { &self.http } else { &self.no_redirect };
        let mut req = client.post(self.parse(url)?);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let req = req
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
            .form(form);
        self.send(req).await
    }

    /// JSON POST that stops at the first response.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        payload: &serde_json::Value,
    ) -> Result<Reply, Error> {
        let mut req = self.no_redirect.post(self.parse(url)?);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        self.send(req.json(payload)).await
    }

    fn parse(&self, url: &str) -> Result<Url, Error> {
        Url::parse(&self.url(url)).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::InvalidUrl(e.to_string())
        })
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Reply, Error> {
        let resp = req.send().await.map_err(|e| {
            tracing::debug!("request failed: {}", e);
            Error::from(e)
        })?;
        let header = |name: HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let location = header(LOCATION);
        let content_type = header(CONTENT_TYPE);
        Ok(Reply {
            status: resp.status().as_u16(),
            location,
            content_type,
            inner: resp,
            limit: self.max_content_bytes,
        })
    }
}

fn default_headers(profile: &Profile, config: &ClientConfig, csrf: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut set = |name: &str, value: &str| {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    };

    set("User-Agent", profile.header("User-Agent").unwrap_or(config.user_agent.as_str()));
    set("Accept", profile.header("Accept").unwrap_or(DEFAULT_ACCEPT));
    set(
        "Accept-Language",
        profile.header("Accept-Language").unwrap_or(DEFAULT_ACCEPT_LANGUAGE),
    );
    set(
        "X-Requested-With",
        profile.header("x-requested-with").unwrap_or("XMLHttpRequest"),
    );
    if let Some(token) = csrf {
        set("X-CSRF-TOKEN", token);
    }
    headers
}
