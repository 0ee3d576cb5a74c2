//! Owner discovery: pages of online owners of a card who accept trades.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use mangabuff_api::Session;
use scraper::{ElementRef, Html};

use crate::search::pause;
use crate::text::{extract_last_page_number, extract_user_id_from_href, selector, with_page};

const ONLINE_DESCENDANTS: &str =
    ".online, .is-online, .user-online, .avatar__online, .status--online, .badge--online";
const LOCK_DESCENDANTS: &str =
    ".card-show__owner-icon--trade-lock, .trade-lock, .icon-lock, .icon--lock, .locked";

/// One page of the owners listing, already filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerPage {
    pub page: u32,
    pub owner_ids: Vec<i64>,
}

impl OwnerPage {
    pub fn new(page: u32, owner_ids: Vec<i64>) -> Self {
        Self { page, owner_ids }
    }
}

/// Finite, forward-only producer of owner pages.
///
/// `None` ends the sequence; a consumer may stop pulling at any time.
#[async_trait]
pub trait OwnerPageSource: Send {
    async fn next_page(&mut self) -> Option<OwnerPage>;
}

#[async_trait]
impl OwnerPageSource for std::vec::IntoIter<OwnerPage> {
    async fn next_page(&mut self) -> Option<OwnerPage> {
        self.next()
    }
}

/// Pages of `/cards/{id}/users`, fetched lazily.
pub struct OnlineOwnerPages<'a> {
    session: &'a Session,
    url: String,
    max_pages: u32,
    delay: Duration,
    next: u32,
    last: Option<u32>,
}

impl<'a> OnlineOwnerPages<'a> {
    /// `max_pages == 0` walks every page the listing advertises.
    pub fn new(session: &'a Session, card_id: i64, max_pages: u32, delay: Duration) -> Self {
        Self {
            session,
            url: format!("/cards/{}/users", card_id),
            max_pages,
            delay,
            next: 1,
            last: None,
        }
    }

    async fn fetch(&self, page: u32) -> Option<String> {
        let reply = match self.session.get(&with_page(&self.url, page)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("owners page {} failed: {}", page, e);
                return None;
            }
        };
        if reply.status() != 200 {
            tracing::debug!("owners page {}: status {}", page, reply.status());
            return None;
        }
        reply.into_page().await.ok().map(|p| p.text)
    }
}

#[async_trait]
impl OwnerPageSource for OnlineOwnerPages<'_> {
    async fn next_page(&mut self) -> Option<OwnerPage> {
        let page = self.next;
        match self.last {
            Some(last) if page > last => return None,
            Some(_) => pause(self.delay).await,
            None => {}
        }

        let Some(html) = self.fetch(page).await else {
            self.last = Some(0);
            return None;
        };
        if self.last.is_none() {
            let mut last = extract_last_page_number(&Html::parse_document(&html));
            if self.max_pages > 0 {
                last = last.min(self.max_pages);
            }
            self.last = Some(last);
        }

        let owner_ids = parse_online_unlocked_owners(&html);
        tracing::debug!(
            "owners page {}/{}: {} online unlocked",
            page,
            self.last.unwrap_or(page),
            owner_ids.len()
        );
        self.next += 1;
        Some(OwnerPage::new(page, owner_ids))
    }
}

fn classes(el: &ElementRef<'_>) -> Vec<String> {
    el.value().classes().map(str::to_lowercase).collect()
}

fn has_descendant(el: &ElementRef<'_>, css: &str) -> bool {
    selector(css).is_some_and(|sel| el.select(&sel).next().is_some())
}

fn online_here(el: &ElementRef<'_>) -> bool {
    classes(el).iter().any(|c| c.contains("online")) || has_descendant(el, ONLINE_DESCENDANTS)
}

fn lock_here(el: &ElementRef<'_>) -> bool {
    let locked_class = classes(el).iter().any(|c| {
        matches!(c.as_str(), "lock" | "locked" | "trade-lock") || c.contains("-lock") || c.ends_with("__lock")
    });
    locked_class
        || el.value().attr("data-locked").is_some_and(|v| v.trim() == "1")
        || has_descendant(el, LOCK_DESCENDANTS)
}

/// Enclosing elements up to `depth` levels, never the document shell.
fn ancestors<'a>(el: &ElementRef<'a>, depth: usize) -> impl Iterator<Item = ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take(depth)
        .filter(|p| !matches!(p.value().name(), "html" | "body"))
}

fn has_online_marker(link: &ElementRef<'_>) -> bool {
    online_here(link)
        || ancestors(link, 4).any(|p| online_here(&p))
        || link
            .next_siblings()
            .take(4)
            .filter_map(ElementRef::wrap)
            .any(|sib| online_here(&sib))
}

fn is_locked(link: &ElementRef<'_>) -> bool {
    lock_here(link) || ancestors(link, 3).any(|p| lock_here(&p))
}

/// User ids of owners shown as online and not trade-locked, in page order.
pub fn parse_online_unlocked_owners(html: &str) -> Vec<i64> {
    let doc = Html::parse_document(html);
    let Some(links) = selector(r#"a[href^="/users/"]"#) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for link in doc.select(&links) {
        let Some(uid) = link
            .value()
            .attr("href")
            .and_then(extract_user_id_from_href)
            .filter(|id| *id != 0)
        else {
            continue;
        };
        if seen.contains(&uid) || !has_online_marker(&link) || is_locked(&link) {
            continue;
        }
        seen.insert(uid);
        ids.push(uid);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_marker_on_link_parent_or_sibling() {
        let html = r#"
            <a href="/users/1" class="card-show__owner card-show__owner--online">a</a>
            <div class="user-online"><span><a href="/users/2">b</a></span></div>
            <div><a href="/users/3">c</a><span class="status--online"></span></div>
            <div><a href="/users/4">offline</a></div>"#;
        assert_eq!(parse_online_unlocked_owners(html), vec![1, 2, 3]);
    }

    #[test]
    fn locked_owners_are_dropped() {
        let html = r#"
            <div class="online"><a href="/users/10" class="owner-lock">x</a></div>
            <div class="online" data-locked="1"><a href="/users/11">y</a></div>
            <div class="online"><a href="/users/12"><i class="icon-lock"></i></a></div>
            <div class="online"><a href="/users/13">z</a></div>"#;
        assert_eq!(parse_online_unlocked_owners(html), vec![13]);
    }

    #[test]
    fn duplicates_and_non_numeric_links_are_skipped() {
        let html = r#"
            <div class="is-online">
              <a href="/users/5">first</a>
              <a href="/users/5">again</a>
              <a href="/users/me">me</a>
            </div>"#;
        assert_eq!(parse_online_unlocked_owners(html), vec![5]);
    }

    #[test]
    fn online_marker_too_far_up_is_ignored() {
        let html = r#"
            <div class="online"><div><div><div><div><div>
              <a href="/users/8">deep</a>
            </div></div></div></div></div></div>"#;
        assert!(parse_online_unlocked_owners(html).is_empty());
    }

    #[tokio::test]
    async fn vec_source_yields_in_order_then_ends() {
        let mut source = vec![OwnerPage::new(1, vec![1]), OwnerPage::new(2, vec![])].into_iter();
        assert_eq!(source.next_page().await.map(|p| p.page), Some(1));
        assert_eq!(source.next_page().await.map(|p| p.page), Some(2));
        assert!(source.next_page().await.is_none());
    }
}
