//! Login flow: refresh a profile's cookies and CSRF token with credentials.

use mangabuff_api::{ClientConfig, Profile, Session};
use scraper::Html;

use crate::error::MangaBuffError;
use crate::text::{norm_text, selector};

const ERROR_SELECTORS: &[&str] = &[
    ".alert.alert-danger",
    ".alert-danger",
    ".alert-error",
    ".alert--danger",
    ".toast-message",
    ".flash-message",
    ".flash__message",
    ".errors",
    ".error",
    ".form-error",
    ".invalid-feedback",
    "ul.errors li",
    "div[class*=error]",
    "ul[class*=error] li",
    "span.help.is-danger",
    "small.text-danger",
];

/// CSRF token from a page's `meta[name=csrf-token]` or `_token` input.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let meta = selector(r#"meta[name="csrf-token"]"#)
        .and_then(|sel| doc.select(&sel).next())
        .and_then(|m| m.value().attr("content"));
    let input = || {
        selector(r#"input[name="_token"]"#)
            .and_then(|sel| doc.select(&sel).next())
            .and_then(|i| i.value().attr("value"))
    };
    meta.filter(|t| !t.trim().is_empty())
        .or_else(input)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Error messages shown on a failed login page, deduplicated in page order.
pub fn extract_login_errors(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut messages: Vec<String> = Vec::new();
    for sel in ERROR_SELECTORS.iter().filter_map(|css| selector(css)) {
        for el in doc.select(&sel) {
            let text = norm_text(&el.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() && !messages.contains(&text) {
                messages.push(text);
            }
        }
    }
    let title = selector("title")
        .and_then(|sel| doc.select(&sel).next())
        .map(|t| norm_text(&t.text().collect::<String>()))
        .unwrap_or_default();
    if title.to_lowercase().contains("ошиб") && !messages.contains(&title) {
        messages.push(title);
    }
    messages
}

/// Log in with `email`/`password` and store the resulting session in `profile`.
///
/// On success the profile carries the wanted cookies and the CSRF token;
/// on failure it is left untouched.
pub async fn update_profile_cookies(
    config: &ClientConfig,
    profile: &mut Profile,
    email: &str,
    password: &str,
    skip_check: bool,
) -> Result<(), MangaBuffError> {
    let mut session = Session::from_profile(profile, config)?;

    let login_page = session.get("/login").await?;
    if login_page.status() != 200 {
        return Err(MangaBuffError::Login(format!(
            "GET /login returned {}",
            login_page.status()
        )));
    }
    let csrf = extract_csrf_token(&login_page.into_page().await?.text)
        .ok_or_else(|| MangaBuffError::Login("No CSRF token".to_string()))?;
    session.set_csrf_token(csrf.clone());

    let headers = vec![
        ("Referer", session.url("/login")),
        ("Origin", session.base_url().to_string()),
        ("X-CSRF-TOKEN", csrf.clone()),
    ];
    let form = vec![
        ("email".to_string(), email.to_string()),
        ("password".to_string(), password.to_string()),
        ("_token".to_string(), csrf.clone()),
    ];
    let reply = session.post_form("/login", &headers, &form, true).await?;

    if !session.has_cookie("mangabuff_session") {
        let status = reply.status();
        let page = reply.into_page().await?;
        let mut message = extract_login_errors(&page.text).join("; ");
        if message.is_empty() && page.text.to_lowercase().contains("csrf") {
            message = "CSRF token problem".to_string();
        }
        if message.is_empty() && matches!(status, 401 | 403) {
            message = format!("HTTP {}", status);
        }
        if message.is_empty() {
            message = "Login failed".to_string();
        }
        return Err(MangaBuffError::Login(message));
    }

    if !skip_check && !check_authenticated(&session).await {
        return Err(MangaBuffError::Login("Auth check failed".to_string()));
    }

    profile
        .client_headers
        .insert("x-csrf-token".to_string(), csrf);
    profile.cookie = Profile::retain_wanted_cookies(session.cookies());
    tracing::info!("logged in, {} cookies stored", profile.cookie.len());
    Ok(())
}

/// Whether the session is recognised as logged in.
pub async fn check_authenticated(session: &Session) -> bool {
    if let Ok(reply) = session.get_no_redirect("/login").await {
        let away = reply.location().is_some_and(|loc| !loc.contains("/login"));
        if matches!(reply.status(), 301 | 302) && away {
            return true;
        }
    }
    if let Ok(reply) = session.get("/").await {
        if reply.status() == 200 {
            if let Ok(page) = reply.into_page().await {
                let markers = ["/logout", "Выйти", "notifications"];
                if markers.iter().any(|m| page.text.contains(m)) {
                    return true;
                }
            }
        }
    }
    match session.get_no_redirect("/notifications").await {
        Ok(reply) if reply.status() == 200 => true,
        Ok(reply) if reply.status() == 403 => session.has_cookie("mangabuff_session"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_from_meta_then_input() {
        let html = r#"<head><meta name="csrf-token" content=" m1 "></head><input name="_token" value="i1">"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("m1"));
        let html = r#"<form><input name="_token" value="i1"></form>"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("i1"));
        assert_eq!(extract_csrf_token("<p>none</p>"), None);
    }

    #[test]
    fn login_errors_deduplicated() {
        let html = r#"
            <html><head><title>Ошибка входа</title></head><body>
            <div class="alert alert-danger">Неверный  пароль</div>
            <span class="invalid-feedback">Неверный пароль</span>
            <small class="text-danger">Слишком много попыток</small>
            </body></html>"#;
        assert_eq!(
            extract_login_errors(html),
            vec![
                "Неверный пароль".to_string(),
                "Слишком много попыток".to_string(),
                "Ошибка входа".to_string(),
            ]
        );
    }
}
