use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mangabuff_lib::owners::OnlineOwnerPages;
use mangabuff_lib::{
    send_trades_to_owners, CardEntry, ClientConfig, DispatchOptions, OwnerPage, OwnerPageSource,
    Profile, RunStats, Session, TargetCard, TradeConfig,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

fn session_for(server: &MockServer) -> Session {
    Session::from_profile(&Profile::default(), &ClientConfig::with_base_url(&server.uri())).unwrap()
}

fn my_card(instance: i64, rank: &str) -> CardEntry {
    CardEntry {
        instance_id: Some(instance),
        card_id: Some(500 + instance),
        rank: rank.to_string(),
        ..CardEntry::default()
    }
}

fn target() -> TargetCard {
    TargetCard {
        card_id: 77,
        name: String::new(),
        rank: "A".to_string(),
    }
}

async fn mount_partner(server: &MockServer, partner: i64, cards: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/trades/{}/availableCardsLoad", partner)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cards": cards })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/trades/offers/{}", partner)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn dry_run_counts_and_logs_one_offer() {
    let mock_server = MockServer::start().await;
    mount_partner(&mock_server, 101, json!([{"id": 555, "card_id": 77}])).await;
    mount_partner(&mock_server, 102, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/trades/create"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let session = session_for(&mock_server);
    let config = TradeConfig::default().without_delays();
    let my_cards = vec![my_card(1, "A"), my_card(2, "A"), my_card(3, "A")];
    let mut pages = vec![OwnerPage::new(1, vec![101, 102])].into_iter();

    let stats = send_trades_to_owners(
        &session,
        &config,
        Some(999),
        &target(),
        &mut pages,
        &my_cards,
        DispatchOptions {
            dry_run: true,
            use_api: true,
        },
    )
    .await;

    assert_eq!(
        stats,
        RunStats {
            checked_pages: 1,
            owners_seen: 2,
            trades_attempted: 1,
            trades_succeeded: 0,
            skipped_no_my_cards: 0,
        }
    );
    let output = logs.contents();
    let dry: Vec<&str> = output.lines().filter(|l| l.contains("[DRY]")).collect();
    assert_eq!(dry.len(), 1);
    assert!(dry[0].contains("-> 555 for owner 101"));
}

#[tokio::test]
async fn empty_owner_pages_leave_counters_at_zero() {
    let mock_server = MockServer::start().await;
    let session = session_for(&mock_server);
    let config = TradeConfig::default().without_delays();
    let mut pages = Vec::<OwnerPage>::new().into_iter();

    let stats = send_trades_to_owners(
        &session,
        &config,
        None,
        &target(),
        &mut pages,
        &[my_card(1, "A")],
        DispatchOptions::default(),
    )
    .await;
    assert_eq!(stats, RunStats::default());
}

#[tokio::test]
async fn no_own_cards_stops_before_any_page() {
    let mock_server = MockServer::start().await;
    let session = session_for(&mock_server);
    let config = TradeConfig::default().without_delays();
    let mut pages = vec![OwnerPage::new(1, vec![101])].into_iter();

    let stats = send_trades_to_owners(
        &session,
        &config,
        None,
        &target(),
        &mut pages,
        &[CardEntry::default()],
        DispatchOptions::default(),
    )
    .await;
    assert_eq!(stats.skipped_no_my_cards, 1);
    assert_eq!(stats.checked_pages, 0);
    assert_eq!(pages.len(), 1);
}

#[tokio::test]
async fn live_run_skips_self_and_counts_confirmed_offers() {
    let mock_server = MockServer::start().await;
    mount_partner(&mock_server, 101, json!([{"id": 555, "card_id": 77}])).await;
    Mock::given(method("POST"))
        .and(path("/trades/999/availableCardsLoad"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/trades/create"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/trades/8"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let config = TradeConfig::default().without_delays();
    let mut pages = vec![OwnerPage::new(1, vec![999]), OwnerPage::new(2, vec![101])].into_iter();

    let stats = send_trades_to_owners(
        &session,
        &config,
        Some(999),
        &target(),
        &mut pages,
        &[my_card(1, "B")],
        DispatchOptions {
            dry_run: false,
            use_api: true,
        },
    )
    .await;
    assert_eq!(stats.checked_pages, 2);
    assert_eq!(stats.owners_seen, 2);
    assert_eq!(stats.trades_attempted, 1);
    assert_eq!(stats.trades_succeeded, 1);
}

#[tokio::test]
async fn online_owner_pages_follow_pagination() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cards/77/users"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(include_str!("fixtures/owners_page1.html"), "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cards/77/users"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(include_str!("fixtures/owners_page2.html"), "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let mut pages = OnlineOwnerPages::new(&session, 77, 0, Duration::ZERO);
    assert_eq!(pages.next_page().await, Some(OwnerPage::new(1, vec![101])));
    assert_eq!(pages.next_page().await, Some(OwnerPage::new(2, vec![104])));
    assert_eq!(pages.next_page().await, None);

    let mut capped = OnlineOwnerPages::new(&session, 77, 1, Duration::ZERO);
    assert!(capped.next_page().await.is_some());
    assert!(capped.next_page().await.is_none());
}

#[tokio::test]
async fn owner_pages_end_on_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cards/77/users"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server);
    let mut pages = OnlineOwnerPages::new(&session, 77, 0, Duration::ZERO);
    assert_eq!(pages.next_page().await, None);
    assert_eq!(pages.next_page().await, None);
}
