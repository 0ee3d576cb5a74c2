//! Size-capped body reads and charset-aware decoding.

use encoding_rs::{Encoding, UTF_8};

use crate::Error;

/// Read a response body, refusing anything over `limit` bytes.
///
/// A declared `Content-Length` above the cap fails before the stream is
/// touched; otherwise the running total is checked after every chunk.
pub async fn read_capped(mut resp: reqwest::Response, limit: u64) -> Result<Vec<u8>, Error> {
    if let Some(declared) = resp.content_length() {
        if declared > limit {
            tracing::debug!("declared body of {} bytes exceeds cap {}", declared, limit);
            return Err(Error::TooBig { limit });
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if body.len() as u64 + chunk.len() as u64 > limit {
            tracing::debug!("streamed body exceeded cap {}", limit);
            return Err(Error::TooBig { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Extract the `charset=` parameter from a Content-Type value.
pub fn parse_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches(['"', '\'']).to_string())
            } else {
                None
            }
        })
        .find(|label| !label.is_empty())
}

/// Decode bytes to text (BOM, then declared charset, then UTF-8, replacing
/// invalid sequences) and parse JSON when the content type or the first
/// non-blank character suggests it.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> (String, Option<serde_json::Value>) {
    let ctype = content_type.unwrap_or("").to_ascii_lowercase();
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| parse_charset(&ctype).and_then(|label| Encoding::for_label(label.as_bytes())))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    let text = text.into_owned();

    let trimmed = text.trim_start();
    let looks_json = ctype.contains("json") || trimmed.starts_with('{') || trimmed.starts_with('[');
    let json = if looks_json {
        serde_json::from_str(trimmed).ok()
    } else {
        None
    };
    (text, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_charset_variants() {
        assert_eq!(
            parse_charset("text/html; charset=windows-1251").as_deref(),
            Some("windows-1251")
        );
        assert_eq!(
            parse_charset("text/html; Charset=\"UTF-8\"").as_deref(),
            Some("UTF-8")
        );
        assert_eq!(parse_charset("application/json"), None);
        assert_eq!(parse_charset(""), None);
    }

    #[test]
    fn decodes_declared_windows_1251() {
        // "Привет" in windows-1251
        let bytes = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2];
        let (text, json) = decode_body(&bytes, Some("text/html; charset=windows-1251"));
        assert_eq!(text, "Привет");
        assert!(json.is_none());
    }

    #[test]
    fn undeclared_charset_falls_back_to_utf8() {
        let (text, _) = decode_body("карта".as_bytes(), Some("text/html"));
        assert_eq!(text, "карта");
    }

    #[test]
    fn unknown_label_falls_back_to_utf8() {
        let (text, _) = decode_body(b"plain", Some("text/html; charset=klingon"));
        assert_eq!(text, "plain");
    }

    #[test]
    fn sniffs_json_without_json_content_type() {
        let (_, json) = decode_body(b"  {\"cards\": []}", Some("text/html"));
        assert!(json.unwrap()["cards"].is_array());
    }

    #[test]
    fn invalid_json_yields_text_only() {
        let (text, json) = decode_body(b"{not json", Some("application/json"));
        assert_eq!(text, "{not json");
        assert!(json.is_none());
    }
}
