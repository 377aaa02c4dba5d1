mod support;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relayhub_database::{BeingRepository, BeingStatus};
use relayhub_gateway::{build_router, ServerFrame};
use support::{message_frame, TestRelay, TestResult};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(relay: &TestRelay) -> TestResult<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = build_router(relay.state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

async fn connect(addr: SocketAddr, being_id: &str, token: &str) -> TestResult<Client> {
    let (stream, _) = connect_async(format!("ws://{addr}/ws/{being_id}?token={token}")).await?;
    Ok(stream)
}

/// Waits until the server side of `being_id`'s socket has registered.
async fn wait_registered(relay: &TestRelay, being_id: &str, org_id: &str) -> TestResult {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !relay.state.registry.is_online(being_id, org_id).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| "connection never registered")?;
    Ok(())
}

async fn next_frame(client: &mut Client) -> TestResult<ServerFrame> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .map_err(|_| "timed out waiting for frame")?
            .ok_or("socket closed")??;
        if let WsMessage::Text(text) = message {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

/// True when nothing but control frames arrives within `window`.
async fn stays_quiet(client: &mut Client, window: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Err(_) => return true,
            Ok(Some(Ok(WsMessage::Text(_)))) => return false,
            Ok(Some(Ok(_))) => continue,
            Ok(_) => return true,
        }
    }
}

#[tokio::test]
async fn rejects_bad_credentials_before_upgrade() -> TestResult {
    let relay = TestRelay::new().await?;
    let alice = relay.being("acme", "alice").await?;
    let addr = serve(&relay).await?;

    for url in [
        format!("ws://{addr}/ws/{}?token=wrong", alice.being.id),
        format!("ws://{addr}/ws/{}", alice.being.id),
        format!("ws://{addr}/ws/unknown?token={}", alice.token),
    ] {
        match connect_async(url.as_str()).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), 401, "{url}");
            }
            other => panic!("expected 401 for {url}, got {:?}", other.map(|_| ())),
        }
    }
    assert_eq!(relay.state.registry.count().await, 0);
    Ok(())
}

#[tokio::test]
async fn message_delivery_and_presence_over_websocket() -> TestResult {
    let relay = TestRelay::new().await?;
    let alice = relay.being("acme", "alice").await?;
    let bob = relay.being("acme", "bob").await?;
    let addr = serve(&relay).await?;

    let mut alice_ws = connect(addr, &alice.being.id, &alice.token).await?;
    wait_registered(&relay, &alice.being.id, "acme").await?;
    let mut bob_ws = connect(addr, &bob.being.id, &bob.token).await?;

    assert_eq!(
        next_frame(&mut alice_ws).await?,
        ServerFrame::presence(&bob.being.id, BeingStatus::Online)
    );

    alice_ws
        .send(WsMessage::Text(message_frame(&bob.being.id, "hello over the wire")))
        .await?;

    match next_frame(&mut bob_ws).await? {
        ServerFrame::Message { from, body, .. } => {
            assert_eq!(from, alice.being.id);
            assert_eq!(body.as_deref(), Some("hello over the wire"));
        }
        other => panic!("unexpected frame {other:?}"),
    }
    assert!(matches!(
        next_frame(&mut alice_ws).await?,
        ServerFrame::Ack { .. }
    ));

    alice_ws
        .send(WsMessage::Text("{\"type\":\"nope\"}".into()))
        .await?;
    assert!(matches!(
        next_frame(&mut alice_ws).await?,
        ServerFrame::Error { .. }
    ));

    bob_ws.close(None).await?;
    assert_eq!(
        next_frame(&mut alice_ws).await?,
        ServerFrame::presence(&bob.being.id, BeingStatus::Offline)
    );
    assert!(stays_quiet(&mut alice_ws, Duration::from_millis(300)).await);

    assert!(!relay.state.registry.is_online(&bob.being.id, "acme").await);
    let stored = BeingRepository::new(relay.pool.clone())
        .find_by_id(&bob.being.id)
        .await?
        .ok_or("bob missing")?;
    assert_eq!(stored.status, BeingStatus::Offline);
    Ok(())
}

#[tokio::test]
async fn reconnect_supersedes_old_socket_without_offline_event() -> TestResult {
    let relay = TestRelay::new().await?;
    let alice = relay.being("acme", "alice").await?;
    let bob = relay.being("acme", "bob").await?;
    let addr = serve(&relay).await?;

    let mut alice_ws = connect(addr, &alice.being.id, &alice.token).await?;
    wait_registered(&relay, &alice.being.id, "acme").await?;
    let mut first_bob = connect(addr, &bob.being.id, &bob.token).await?;
    assert_eq!(
        next_frame(&mut alice_ws).await?,
        ServerFrame::presence(&bob.being.id, BeingStatus::Online)
    );

    let mut second_bob = connect(addr, &bob.being.id, &bob.token).await?;
    assert_eq!(
        next_frame(&mut alice_ws).await?,
        ServerFrame::presence(&bob.being.id, BeingStatus::Online)
    );

    // The superseded socket is closed by the server.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match first_bob.next().await {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "superseded socket was not closed");

    assert!(stays_quiet(&mut alice_ws, Duration::from_millis(300)).await);
    assert!(relay.state.registry.is_online(&bob.being.id, "acme").await);
    assert_eq!(relay.state.registry.count().await, 2);

    alice_ws
        .send(WsMessage::Text(message_frame(&bob.being.id, "to the new socket")))
        .await?;
    assert!(matches!(
        next_frame(&mut second_bob).await?,
        ServerFrame::Message { .. }
    ));
    Ok(())
}
