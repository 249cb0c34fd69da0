use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use game_server::auth::{Claims, TokenAuthority, BCRYPT_MIN_COST};
use game_server::{GameServer, RunningServer, ServerConfig};
use vanilla_pump::Subject;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.http_address = "127.0.0.1:0".parse().unwrap();
    config.ws_address = "127.0.0.1:0".parse().unwrap();
    config.auth.bcrypt_cost = BCRYPT_MIN_COST;
    config
}

async fn start() -> (RunningServer, TokenAuthority) {
    let config = test_config();
    let tokens = TokenAuthority::new(&config.auth.jwt_secret);
    let server = GameServer::new(config).start().await.expect("server starts");
    (server, tokens)
}

async fn connect(server: &RunningServer, token: &str) -> Result<Client, WsError> {
    let url = format!("ws://{}/ws?token={}", server.ws_addr(), token);
    connect_async(url).await.map(|(stream, _)| stream)
}

async fn wait_for_connections(server: &RunningServer, expected: usize) {
    for _ in 0..100 {
        if server.registry().len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} connections, found {}",
        expected,
        server.registry().len()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rest_listener_serves_http() {
    let (server, _) = start().await;

    let mut stream = TcpStream::connect(server.http_addr()).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("Welcome to vanilla"));

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn upgrade_without_token_is_rejected() {
    let (server, _) = start().await;

    let url = format!("ws://{}/ws", server.ws_addr());
    match connect_async(url).await {
        Err(WsError::Http(response)) => {
            assert_eq!(response.status(), 401);
            let body = response.body().as_deref().unwrap_or_default();
            let json: serde_json::Value = serde_json::from_slice(body).unwrap();
            assert_eq!(json["reason"], "authorization field empty");
        }
        Err(other) => panic!("expected 401, got {other}"),
        Ok(_) => panic!("upgrade unexpectedly succeeded"),
    }
    assert!(server.registry().is_empty());

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn upgrade_with_expired_token_is_rejected() {
    let (server, tokens) = start().await;
    let expired = tokens
        .sign(&Claims {
            jti: "aspirin2d".to_string(),
            exp: jsonwebtoken::get_current_timestamp() - 10,
        })
        .unwrap();

    match connect(&server, &expired).await {
        Err(WsError::Http(response)) => {
            assert_eq!(response.status(), 401);
            let body = response.body().as_deref().unwrap_or_default();
            let json: serde_json::Value = serde_json::from_slice(body).unwrap();
            assert_eq!(json["reason"], "token is expired");
        }
        Err(other) => panic!("expected 401, got {other}"),
        Ok(_) => panic!("upgrade unexpectedly succeeded"),
    }

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn authenticated_client_receives_enqueued_messages() {
    let (server, tokens) = start().await;
    let token = tokens.issue("aspirin2d", Duration::from_secs(60)).unwrap();

    let mut client = connect(&server, &token).await.expect("upgrade succeeds");
    wait_for_connections(&server, 1).await;

    let ids = server.registry().connections_for(&Subject::new("aspirin2d"));
    assert_eq!(ids.len(), 1);
    server.registry().send(ids[0], "hello").unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("message within deadline")
        .unwrap()
        .unwrap();
    assert_eq!(message, Message::text("hello"));

    client.send(Message::text("Hello")).await.unwrap();

    client.close(None).await.unwrap();
    wait_for_connections(&server, 0).await;

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_server_closes_live_connections() {
    let (server, tokens) = start().await;
    let token = tokens.issue("aspirin2d", Duration::from_secs(60)).unwrap();
    let mut client = connect(&server, &token).await.expect("upgrade succeeds");
    wait_for_connections(&server, 1).await;

    server.stop().await.unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection still open after stop");
}

#[tokio::test]
async fn stop_delivers_queued_messages_before_close_frame() {
    for round in 0..10 {
        let (server, tokens) = start().await;
        let token = tokens.issue("aspirin2d", Duration::from_secs(60)).unwrap();
        let mut client = connect(&server, &token).await.expect("upgrade succeeds");
        wait_for_connections(&server, 1).await;

        let id = server.registry().connections_for(&Subject::new("aspirin2d"))[0];
        server.registry().send(id, "goodbye").unwrap();
        server.stop().await.unwrap();

        let mut texts = Vec::new();
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Text(text))) => texts.push(text.as_str().to_owned()),
                    Some(Ok(Message::Close(_))) => break true,
                    Some(Ok(_)) => continue,
                    None | Some(Err(_)) => break false,
                }
            }
        })
        .await
        .expect("connection ends after stop");

        assert!(closed, "round {round}: no close frame");
        assert_eq!(texts, vec!["goodbye".to_string()], "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_empties_registry() {
    let (server, tokens) = start().await;
    let token = tokens.issue("aspirin2d", Duration::from_secs(60)).unwrap();
    let _first = connect(&server, &token).await.expect("upgrade succeeds");
    let _second = connect(&server, &token).await.expect("upgrade succeeds");
    wait_for_connections(&server, 2).await;

    let registry = std::sync::Arc::clone(server.registry());
    server.stop().await.unwrap();
    assert!(registry.is_empty());
}
