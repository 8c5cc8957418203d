mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeTokenProvider, ReplayHttpClient, ScriptedResponse};
use spotify_sorter::{ClientEvent, SpotifyClient, SpotifyClientImpl};
use tokio::time::timeout;

const PROFILE_BODY: &str = r#"{"id": "test_user", "display_name": "Test User"}"#;

fn independent_client(http: ReplayHttpClient) -> SpotifyClientImpl {
    SpotifyClientImpl::new(
        Box::new(http),
        Arc::new(FakeTokenProvider::with_token("test-token")),
    )
}

#[test_log::test(tokio::test)]
async fn test_shared_broadcaster_across_clients() {
    // Create the first client
    let client1 = independent_client(ReplayHttpClient::default());

    // Create second client that shares the broadcaster with client1
    let http_client2 = ReplayHttpClient::new(vec![ScriptedResponse::json(200, PROFILE_BODY)]);
    let client2 = client1.with_shared_broadcaster(Box::new(http_client2));

    // Create third client with independent broadcaster
    let client3 = independent_client(ReplayHttpClient::default());

    // Subscribe to events from all clients
    let mut events1 = client1.subscribe();
    let mut events2 = client2.subscribe();
    let mut events3 = client3.subscribe();

    // Test that clients start with no events
    assert!(client1.latest_event().is_none());
    assert!(client2.latest_event().is_none());
    assert!(client3.latest_event().is_none());

    // Drive a real request through client2; the events show up on both
    // subscriptions of the shared broadcaster.
    client2.get_current_user().await.unwrap();

    let event1 = timeout(Duration::from_millis(100), events1.recv()).await;
    let event2 = timeout(Duration::from_millis(100), events2.recv()).await;
    assert!(matches!(
        event1.unwrap().unwrap(),
        ClientEvent::RequestStarted { .. }
    ));
    assert!(matches!(
        event2.unwrap().unwrap(),
        ClientEvent::RequestStarted { .. }
    ));

    // The independent client saw nothing.
    let no_event_3 = timeout(Duration::from_millis(10), events3.recv()).await;
    assert!(no_event_3.is_err());
    assert!(client3.latest_event().is_none());

    // Latest-event state is shared the same way.
    assert!(matches!(
        client1.latest_event(),
        Some(ClientEvent::RequestCompleted { status_code: 200, .. })
    ));
    assert_eq!(client1.latest_event(), client2.latest_event());
}

#[test_log::test(tokio::test)]
async fn test_latest_event_watcher_follows_requests() {
    let http = ReplayHttpClient::new(vec![ScriptedResponse::json(200, PROFILE_BODY)]);
    let client = independent_client(http);

    let mut watcher = client.latest_event_watcher();
    assert!(watcher.borrow_and_update().is_none());

    client.get_current_user().await.unwrap();

    // The watcher holds only the newest event, which for a successful
    // request is the completion.
    timeout(Duration::from_millis(100), watcher.changed())
        .await
        .expect("watcher should see the request")
        .unwrap();
    let latest = watcher.borrow_and_update().clone();
    assert!(matches!(
        latest,
        Some(ClientEvent::RequestCompleted { status_code: 200, .. })
    ));
}

#[test_log::test(tokio::test)]
async fn test_subscriptions_outlive_failed_requests() {
    let http = ReplayHttpClient::new(vec![
        ScriptedResponse::json(500, r#"{"error": {"status": 500, "message": "server error"}}"#),
        ScriptedResponse::json(200, PROFILE_BODY),
    ]);
    let client = independent_client(http);
    let mut events = client.subscribe();

    assert!(client.get_current_user().await.is_err());
    client.get_current_user().await.unwrap();

    // Both attempts were announced on the same subscription.
    let mut completions = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(10), events.recv()).await {
        if let ClientEvent::RequestCompleted { status_code, .. } = event {
            completions.push(status_code);
        }
    }
    assert_eq!(completions, vec![500, 200]);
}

#[test_log::test]
fn test_client_creation_patterns() {
    // Pattern 1: Independent clients
    let client1 = independent_client(ReplayHttpClient::default());
    let client2 = independent_client(ReplayHttpClient::default());

    // Pattern 2: Shared broadcaster
    let client3 = client1.with_shared_broadcaster(Box::new(ReplayHttpClient::default()));

    // Test that we can create subscriptions without issues
    let _sub1 = client1.subscribe();
    let _sub2 = client2.subscribe();
    let _sub3 = client3.subscribe();

    assert!(client1.latest_event().is_none());
    assert!(client3.latest_event().is_none());
}
