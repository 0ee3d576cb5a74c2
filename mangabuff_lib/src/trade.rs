//! Trade submission: the create-trade endpoint first, then the classic
//! offer form scraped from the partner's offer page.

use mangabuff_api::{Page, Reply, Session};
use scraper::Html;
use serde_json::{json, Value};

use crate::text::{selector, truthy};

/// Localized fragments the site uses in "trade sent" notices.
pub const SUCCESS_MARKERS: &[&str] = &["успеш", "отправ", "создан"];

/// Redirect targets that mean the create-trade call went through.
pub const API_REDIRECT_MARKERS: &[&str] = &["/trades/"];

/// Redirect targets that mean the offer form was accepted.
pub const FORM_REDIRECT_MARKERS: &[&str] = &["/trades", "/messages", "/notifications", "/offers"];

const FORM_SELECTORS: &[&str] = &[
    r#"form[action*="/trades/offers"][method="post"]"#,
    r#"form[action*="/trades"][method="post"]"#,
    r#"form[id*="offer"]"#,
    r#"form[name*="offer"]"#,
    "form",
];

/// Verdict of one success check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Confirmed,
    Rejected,
    Inconclusive,
}

/// A 301/302/303 whose `Location` contains one of `markers`.
pub fn redirect_signal(page: &Page, markers: &[&str]) -> Signal {
    let location = page.location.as_deref().unwrap_or("");
    if page.is_redirect() && markers.iter().any(|m| location.contains(m)) {
        Signal::Confirmed
    } else {
        Signal::Inconclusive
    }
}

/// Explicit flags in a JSON object body.
pub fn json_flag_signal(page: &Page) -> Signal {
    let Some(obj) = page.json.as_ref().and_then(Value::as_object) else {
        return Signal::Inconclusive;
    };
    let flag = |key: &str| obj.get(key).is_some_and(truthy);
    let status_ok = obj
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s == "ok" || s == "success");
    let trade_id = obj
        .get("trade")
        .and_then(|t| t.get("id"))
        .is_some_and(truthy)
        || flag("trade_id");

    if flag("success") || flag("ok") || status_ok || trade_id {
        return Signal::Confirmed;
    }
    let explicit_false = |key: &str| matches!(obj.get(key), Some(Value::Bool(false)));
    if explicit_false("success") || explicit_false("ok") {
        return Signal::Rejected;
    }
    Signal::Inconclusive
}

/// Localized success wording anywhere in the body.
pub fn substring_signal(page: &Page) -> Signal {
    let serialized = page
        .json
        .as_ref()
        .map(|j| j.to_string().to_lowercase())
        .unwrap_or_default();
    let text = page.text.to_lowercase();
    if SUCCESS_MARKERS
        .iter()
        .any(|m| serialized.contains(m) || text.contains(m))
    {
        Signal::Confirmed
    } else {
        Signal::Inconclusive
    }
}

/// Run the checks in order; the first decisive verdict wins.
pub fn is_success(page: &Page, redirect_markers: &[&str]) -> bool {
    let checks = [
        redirect_signal(page, redirect_markers),
        json_flag_signal(page),
        substring_signal(page),
    ];
    checks
        .into_iter()
        .find(|s| *s != Signal::Inconclusive)
        .is_some_and(|s| s == Signal::Confirmed)
}

/// Value of a scraped form field; repeated names collect into a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

/// The partner's offer form, scraped once and discarded after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeFormInfo {
    pub action_url: String,
    pub csrf_token: String,
    /// Field names in document order.
    pub hidden_fields: Vec<(String, FieldValue)>,
}

impl TradeFormInfo {
    /// Scrape the CSRF token and the offer form out of an offer page.
    pub fn parse(html: &str, session: &Session) -> Option<Self> {
        let doc = Html::parse_document(html);

        let meta_token = selector(r#"meta[name="csrf-token"]"#)
            .and_then(|sel| doc.select(&sel).next())
            .and_then(|m| m.value().attr("content"))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let input_token = || {
            selector(r#"input[name="_token"]"#)
                .and_then(|sel| doc.select(&sel).next())
                .and_then(|i| i.value().attr("value"))
                .map(str::trim)
                .filter(|t| !t.is_empty())
        };
        let csrf_token = meta_token.or_else(input_token).unwrap_or("").to_string();

        let form = FORM_SELECTORS
            .iter()
            .filter_map(|css| selector(css))
            .find_map(|sel| doc.select(&sel).next())?;

        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.is_empty())
            .unwrap_or("/trades/offers");
        let action_url = if action.starts_with("http") {
            action.to_string()
        } else {
            session.url(action)
        };

        let mut info = Self {
            action_url,
            csrf_token,
            hidden_fields: Vec::new(),
        };
        if let Some(inputs) = selector("input[name]") {
            for input in form.select(&inputs) {
                let el = input.value();
                let kind = el.attr("type").unwrap_or("").to_ascii_lowercase();
                if (kind == "checkbox" || kind == "radio") && el.attr("checked").is_none() {
                    continue;
                }
                let name = el.attr("name").unwrap_or("");
                info.push_field(name, el.attr("value").unwrap_or(""));
            }
        }
        Some(info)
    }

    fn push_field(&mut self, name: &str, value: &str) {
        match self.hidden_fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                *slot = match std::mem::take(slot) {
                    FieldValue::Single(first) => FieldValue::Multiple(vec![first, value.to_string()]),
                    FieldValue::Multiple(mut values) => {
                        values.push(value.to_string());
                        FieldValue::Multiple(values)
                    }
                };
            }
            None => self
                .hidden_fields
                .push((name.to_string(), FieldValue::Single(value.to_string()))),
        }
    }

    /// Form pairs with our instance under `creator[]` and theirs under
    /// `receiver[]`; every other field is kept verbatim.
    pub fn to_form(&self, my_instance_id: i64, partner_instance_id: i64) -> Vec<(String, String)> {
        let mut fields = self.hidden_fields.clone();
        if !self.csrf_token.is_empty() && !fields.iter().any(|(n, _)| n == "_token") {
            fields.push(("_token".to_string(), FieldValue::Single(self.csrf_token.clone())));
        }
        for (key, id) in [("creator[]", my_instance_id), ("receiver[]", partner_instance_id)] {
            match fields.iter_mut().find(|(n, _)| n == key) {
                Some((_, value)) => {
                    let mut list = match std::mem::replace(value, FieldValue::Multiple(Vec::new())) {
                        FieldValue::Single(s) if s.is_empty() => Vec::new(),
                        FieldValue::Single(s) => vec![s],
                        FieldValue::Multiple(v) => v,
                    };
                    list.push(id.to_string());
                    *value = FieldValue::Multiple(list);
                }
                None => fields.push((key.to_string(), FieldValue::Multiple(vec![id.to_string()]))),
            }
        }

        let mut pairs = Vec::new();
        for (name, value) in fields {
            match value {
                FieldValue::Single(v) => pairs.push((name, v)),
                FieldValue::Multiple(vs) => pairs.extend(vs.into_iter().map(|v| (name.clone(), v))),
            }
        }
        pairs
    }
}

/// Trade submission against one session.
pub struct TradeSubmitter<'a> {
    session: &'a Session,
}

impl<'a> TradeSubmitter<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// API first (when enabled), then the form fallback.
    pub async fn submit(
        &self,
        partner_id: i64,
        my_instance_id: i64,
        partner_instance_id: i64,
        use_api: bool,
    ) -> bool {
        if use_api
            && self
                .create_trade_via_api(partner_id, my_instance_id, partner_instance_id)
                .await
        {
            return true;
        }
        match self.trade_form_info(partner_id).await {
            Some(form) => {
                self.submit_trade_form(&form, my_instance_id, partner_instance_id)
                    .await
            }
            None => {
                tracing::debug!("partner {}: no offer form found", partner_id);
                false
            }
        }
    }

    /// `POST /trades/create`, form-encoded, then once more as JSON.
    pub async fn create_trade_via_api(
        &self,
        receiver_id: i64,
        my_instance_id: i64,
        partner_instance_id: i64,
    ) -> bool {
        let referer = self.session.url(&format!("/trades/offers/{}", receiver_id));
        let headers = self.session.ajax_headers(&referer);
        let form = vec![
            ("receiver_id".to_string(), receiver_id.to_string()),
            ("creator_card_ids[]".to_string(), my_instance_id.to_string()),
            ("receiver_card_ids[]".to_string(), partner_instance_id.to_string()),
        ];
        let reply = match self
            .session
            .post_form("/trades/create", &headers, &form, false)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("create trade for {} failed: {}", receiver_id, e);
                return false;
            }
        };
        if is_success(&settle(reply).await, API_REDIRECT_MARKERS) {
            return true;
        }

        let payload = json!({
            "receiver_id": receiver_id,
            "creator_card_ids": [my_instance_id],
            "receiver_card_ids": [partner_instance_id],
        });
        match self
            .session
            .post_json("/trades/create", &headers, &payload)
            .await
        {
            Ok(reply) => is_success(&settle(reply).await, API_REDIRECT_MARKERS),
            Err(e) => {
                tracing::warn!("create trade (json) for {} failed: {}", receiver_id, e);
                false
            }
        }
    }

    /// Scrape the offer form from `GET /trades/offers/{partner}`.
    pub async fn trade_form_info(&self, partner_id: i64) -> Option<TradeFormInfo> {
        let reply = self
            .session
            .get(&format!("/trades/offers/{}", partner_id))
            .await
            .ok()?;
        if reply.status() != 200 {
            return None;
        }
        let page = reply.into_page().await.ok()?;
        TradeFormInfo::parse(&page.text, self.session)
    }

    /// Post the scraped form back with both instances appended.
    pub async fn submit_trade_form(
        &self,
        form: &TradeFormInfo,
        my_instance_id: i64,
        partner_instance_id: i64,
    ) -> bool {
        let mut headers = vec![
            ("Referer", form.action_url.clone()),
            ("Origin", self.session.base_url().to_string()),
        ];
        if !form.csrf_token.is_empty() {
            headers.push(("X-CSRF-TOKEN", form.csrf_token.clone()));
        }
        let pairs = form.to_form(my_instance_id, partner_instance_id);
        match self
            .session
            .post_form(&form.action_url, &headers, &pairs, false)
            .await
        {
            Ok(reply) => is_success(&settle(reply).await, FORM_REDIRECT_MARKERS),
            Err(e) => {
                tracing::warn!("offer form submission failed: {}", e);
                false
            }
        }
    }
}

/// Read the body if possible, keeping status and location either way.
async fn settle(reply: Reply) -> Page {
    let status = reply.status();
    let location = reply.location().map(str::to_string);
    match reply.into_page().await {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!("could not read submission body: {}", e);
            Page {
                status,
                location,
                ..Page::default()
            }
        }
    }
}
