use std::time::Duration;

use mangabuff_api::{ClientConfig, Error, Profile, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer, max_bytes: u64) -> Session {
    let mut profile = Profile::default();
    profile
        .cookie
        .insert("mangabuff_session".to_string(), "sess123".to_string());
    profile
        .client_headers
        .insert("x-csrf-token".to_string(), "csrf-abc".to_string());
    let mut config = ClientConfig::with_base_url(&server.uri());
    config.max_content_bytes = max_bytes;
    config.read_timeout = Duration::from_millis(300);
    Session::from_profile(&profile, &config).unwrap()
}

#[tokio::test]
async fn get_decodes_declared_windows_1251() {
    let mock_server = MockServer::start().await;
    // "Обмен" in windows-1251
    let body = vec![0xCE, 0xE1, 0xEC, 0xE5, 0xED];

    Mock::given(method("GET"))
        .and(path("/cards/1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=windows-1251"))
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server, 1_000);
    let page = session.get("/cards/1").await.unwrap().into_page().await.unwrap();
    assert_eq!(page.status, 200);
    assert_eq!(page.text, "Обмен");
}

#[tokio::test]
async fn declared_length_over_cap_is_too_big() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(5_000)))
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server, 1_000);
    let reply = session.get("/huge").await.unwrap();
    let err = reply.into_page().await.unwrap_err();
    assert!(err.is_too_big());
}

/// One-shot server answering with a chunked body and no `Content-Length`.
async fn serve_chunked(chunks: usize, chunk_len: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nTransfer-Encoding: chunked\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let chunk = "x".repeat(chunk_len);
        for _ in 0..chunks {
            let frame = format!("{:x}\r\n{}\r\n", chunk_len, chunk);
            if socket.write_all(frame.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn streamed_body_over_cap_is_too_big() {
    let base = serve_chunked(10, 100).await;
    let mut config = ClientConfig::with_base_url(&base);
    config.max_content_bytes = 500;
    let session = Session::from_profile(&Profile::default(), &config).unwrap();

    let reply = session.get("/stream").await.unwrap();
    let err = reply.into_page().await.unwrap_err();
    assert!(matches!(err, Error::TooBig { limit: 500 }));
}

#[tokio::test]
async fn streamed_body_under_cap_is_read() {
    let base = serve_chunked(3, 100).await;
    let mut config = ClientConfig::with_base_url(&base);
    config.max_content_bytes = 500;
    let session = Session::from_profile(&Profile::default(), &config).unwrap();

    let page = session.get("/stream").await.unwrap().into_page().await.unwrap();
    assert_eq!(page.text.len(), 300);
}

#[tokio::test]
async fn sends_profile_cookies_and_default_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(header_regex("cookie", "mangabuff_session=sess123"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("x-csrf-token", "csrf-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server, 1_000);
    let reply = session.get("/notifications").await.unwrap();
    assert_eq!(reply.status(), 200);
}

#[tokio::test]
async fn post_form_without_redirects_exposes_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trades/create"))
        .and(body_string_contains("receiver_id=7"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/trades/55"))
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server, 1_000);
    let form = vec![("receiver_id".to_string(), "7".to_string())];
    let reply = session
        .post_form("/trades/create", &[], &form, false)
        .await
        .unwrap();
    assert_eq!(reply.status(), 302);
    assert_eq!(reply.location(), Some("/trades/55"));
}

#[tokio::test]
async fn slow_response_maps_to_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server, 1_000);
    let result = session.get("/slow").await;
    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn json_body_is_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/cards"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"cards": [{"id": 1}]})),
        )
        .mount(&mock_server)
        .await;

    let session = session_for(&mock_server, 1_000);
    let page = session
        .get_query("/search/cards", &[("user_id", "5".to_string()), ("q", "Наруто".to_string())])
        .await
        .unwrap()
        .into_page()
        .await
        .unwrap();
    assert_eq!(page.json.unwrap()["cards"][0]["id"], 1);
}
