mod support;

use relayhub_database::{BeingRepository, BeingStatus};
use relayhub_gateway::ServerFrame;
use support::{TestRelay, TestResult};

async fn stored_status(relay: &TestRelay, being_id: &str) -> TestResult<BeingStatus> {
    let being = BeingRepository::new(relay.pool.clone())
        .find_by_id(being_id)
        .await?
        .ok_or("being missing")?;
    Ok(being.status)
}

#[tokio::test]
async fn connect_then_disconnect_updates_store_and_org() -> TestResult {
    let relay = TestRelay::new().await?;
    let alice = relay.being("acme", "alice").await?;
    let bob = relay.being("acme", "bob").await?;
    let mut alice_conn = relay.attach(&alice).await;
    let bob_conn = relay.attach(&bob).await;

    let notified = relay.state.presence.connected(&bob_conn.session.identity).await;
    assert_eq!(notified, 1);
    assert_eq!(
        alice_conn.next_frame().await,
        ServerFrame::presence(&bob.being.id, BeingStatus::Online)
    );
    assert_eq!(stored_status(&relay, &bob.being.id).await?, BeingStatus::Online);

    assert!(relay.state.registry.remove(&bob.being.id, "acme").await);
    let notified = relay
        .state
        .presence
        .disconnected(&bob_conn.session.identity)
        .await;
    assert_eq!(notified, 1);
    assert_eq!(
        alice_conn.next_frame().await,
        ServerFrame::presence(&bob.being.id, BeingStatus::Offline)
    );
    assert_eq!(stored_status(&relay, &bob.being.id).await?, BeingStatus::Offline);
    Ok(())
}

#[tokio::test]
async fn reconnect_before_offline_write_keeps_being_online() -> TestResult {
    let relay = TestRelay::new().await?;
    let alice = relay.being("acme", "alice").await?;
    let bob = relay.being("acme", "bob").await?;
    let mut alice_conn = relay.attach(&alice).await;

    let old_bob = relay.attach(&bob).await;
    assert!(relay.state.registry.remove(&bob.being.id, "acme").await);

    // The successor registers and records online before the old teardown writes offline.
    let new_bob = relay.attach(&bob).await;
    relay.state.presence.connected(&new_bob.session.identity).await;
    alice_conn.drain();

    let notified = relay
        .state
        .presence
        .disconnected(&old_bob.session.identity)
        .await;

    assert_eq!(notified, 0);
    assert!(alice_conn.drain().is_empty());
    assert!(relay.state.registry.is_online(&bob.being.id, "acme").await);
    assert_eq!(stored_status(&relay, &bob.being.id).await?, BeingStatus::Online);
    Ok(())
}
