mod common;

use std::sync::Arc;

use common::{FakeTokenProvider, ReplayHttpClient, ScriptedResponse};
use spotify_sorter::{
    ClientEvent, ClientEventReceiver, RetryConfig, SorterError, SpotifyClient, SpotifyClientImpl,
    LIKED_TRACKS_ID,
};

const PROFILE_BODY: &str = r#"{"id": "wizzler", "display_name": "Wizzler"}"#;
const EMPTY_PAGE_BODY: &str = r#"{"items": [], "total": 0, "next": null}"#;

fn client_with(
    responses: Vec<ScriptedResponse>,
) -> (SpotifyClientImpl, ReplayHttpClient, FakeTokenProvider) {
    let http = ReplayHttpClient::new(responses);
    let provider = FakeTokenProvider::with_token("initial-token");
    let client = SpotifyClientImpl::new(Box::new(http.clone()), Arc::new(provider.clone()));
    (client, http, provider)
}

fn drain_events(rx: &mut ClientEventReceiver) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test_log::test(tokio::test)]
async fn test_sends_bearer_token_and_parses_profile() {
    let (client, http, _) = client_with(vec![ScriptedResponse::json(200, PROFILE_BODY)]);

    let me = client.get_current_user().await.unwrap();

    assert_eq!(me.id, "wizzler");
    assert_eq!(me.display_name.as_deref(), Some("Wizzler"));

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "https://api.spotify.com/v1/me");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer initial-token")
    );
}

#[test_log::test(tokio::test)]
async fn test_refreshes_token_once_after_auth_rejection() {
    let (client, http, provider) = client_with(vec![
        ScriptedResponse::json(
            401,
            r#"{"error": {"status": 401, "message": "The access token expired"}}"#,
        ),
        ScriptedResponse::json(200, PROFILE_BODY),
    ]);
    let mut events = client.subscribe();

    let me = client.get_current_user().await.unwrap();

    assert_eq!(me.id, "wizzler");
    assert_eq!(provider.refreshes(), 1);

    // The replayed request carries the fresh token.
    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].authorization.as_deref(),
        Some("Bearer refreshed-token-1")
    );

    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, ClientEvent::TokenRefreshed { .. })));
}

#[test_log::test(tokio::test)]
async fn test_persistent_auth_rejection_refreshes_only_once() {
    let (client, http, provider) = client_with(vec![
        ScriptedResponse::json(401, r#"{"error": {"status": 401, "message": "expired"}}"#),
        ScriptedResponse::json(401, r#"{"error": {"status": 401, "message": "still expired"}}"#),
    ]);

    let err = client.get_current_user().await.unwrap_err();

    match err {
        SorterError::Auth(message) => assert_eq!(message, "still expired"),
        other => panic!("Expected auth error, got: {other:?}"),
    }
    assert_eq!(provider.refreshes(), 1);
    assert_eq!(http.requests().len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_acquires_token_when_none_held() {
    let http = ReplayHttpClient::new(vec![ScriptedResponse::json(200, PROFILE_BODY)]);
    let provider = FakeTokenProvider::default();
    let client = SpotifyClientImpl::new(Box::new(http.clone()), Arc::new(provider.clone()));

    client.get_current_user().await.unwrap();

    // Nothing went over the wire until a refresh produced a token.
    assert_eq!(provider.refreshes(), 1);
    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer refreshed-token-1")
    );
}

#[test_log::test(tokio::test)]
async fn test_rate_limited_request_waits_and_retries() {
    let (client, http, _) = client_with(vec![
        ScriptedResponse::rate_limited(0),
        ScriptedResponse::json(200, PROFILE_BODY),
    ]);
    let client = client.with_retry_config(RetryConfig::default().with_base_delay(0));
    let mut events = client.subscribe();

    let me = client.get_current_user().await.unwrap();

    assert_eq!(me.id, "wizzler");
    assert_eq!(http.requests().len(), 2);

    let events = drain_events(&mut events);
    let rate_limited: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::RateLimited { delay_seconds, request } => {
                Some((*delay_seconds, request.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(rate_limited.len(), 1);
    assert_eq!(rate_limited[0].0, 0);
    assert_eq!(rate_limited[0].1.as_ref().unwrap().method, "GET");
}

#[test_log::test(tokio::test)]
async fn test_rate_limit_exhaustion_returns_error() {
    let (client, http, _) = client_with(vec![
        ScriptedResponse::rate_limited(0),
        ScriptedResponse::rate_limited(0),
    ]);
    let client = client.with_retry_config(
        RetryConfig::default().with_base_delay(0).with_max_retries(1),
    );

    let err = client.get_current_user().await.unwrap_err();

    assert!(matches!(err, SorterError::RateLimit { retry_after: 0 }));
    assert_eq!(http.requests().len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_api_error_carries_status_and_message() {
    let (client, _, _) = client_with(vec![ScriptedResponse::json(
        404,
        r#"{"error": {"status": 404, "message": "Invalid playlist Id"}}"#,
    )]);

    let err = client.get_artist("nope").await.unwrap_err();

    match err {
        SorterError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Invalid playlist Id");
        }
        other => panic!("Expected api error, got: {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_liked_mutations_use_library_endpoints() {
    let (client, http, _) = client_with(vec![
        ScriptedResponse::json(200, "{}"),
        ScriptedResponse::json(200, "{}"),
    ]);

    client
        .add_track_to_playlist(LIKED_TRACKS_ID, "track1")
        .await
        .unwrap();
    client
        .remove_track_from_playlist(LIKED_TRACKS_ID, "track1")
        .await
        .unwrap();

    let requests = http.requests();
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].url, "https://api.spotify.com/v1/me/tracks");
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"ids": ["track1"]}));

    assert_eq!(requests[1].method, "DELETE");
    assert_eq!(requests[1].url, "https://api.spotify.com/v1/me/tracks");
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(body, serde_json::json!({"ids": ["track1"]}));
}

#[test_log::test(tokio::test)]
async fn test_playlist_mutations_use_uri_payloads() {
    let (client, http, _) = client_with(vec![
        ScriptedResponse::json(201, r#"{"snapshot_id": "abc"}"#),
        ScriptedResponse::json(200, r#"{"snapshot_id": "def"}"#),
    ]);

    client.add_track_to_playlist("p1", "track1").await.unwrap();
    client
        .remove_track_from_playlist("p1", "track1")
        .await
        .unwrap();

    let requests = http.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(
        requests[0].url,
        "https://api.spotify.com/v1/playlists/p1/tracks"
    );
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"uris": ["spotify:track:track1"]}));

    assert_eq!(requests[1].method, "DELETE");
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"tracks": [{"uri": "spotify:track:track1"}]})
    );
}

#[test_log::test(tokio::test)]
async fn test_tracks_page_routes_liked_and_regular_playlists() {
    let (client, http, _) = client_with(vec![
        ScriptedResponse::json(200, EMPTY_PAGE_BODY),
        ScriptedResponse::json(200, EMPTY_PAGE_BODY),
    ]);

    client
        .get_playlist_tracks_page(LIKED_TRACKS_ID, 50, 0)
        .await
        .unwrap();
    client.get_playlist_tracks_page("p1", 50, 100).await.unwrap();

    let requests = http.requests();
    assert_eq!(
        requests[0].url,
        "https://api.spotify.com/v1/me/tracks?limit=50&offset=0"
    );
    assert_eq!(
        requests[1].url,
        "https://api.spotify.com/v1/playlists/p1/tracks?limit=50&offset=100"
    );
}

#[test_log::test(tokio::test)]
async fn test_request_lifecycle_events_are_broadcast() {
    let (client, _, _) = client_with(vec![ScriptedResponse::json(200, PROFILE_BODY)]);
    let client = client.with_api_base_url("https://replay.test/v1");
    let mut events = client.subscribe();

    client.get_current_user().await.unwrap();

    let events = drain_events(&mut events);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ClientEvent::RequestStarted { request } => {
            assert_eq!(request.url, "https://replay.test/v1/me");
            assert_eq!(request.short_description(), "GET /v1/me");
        }
        other => panic!("Expected request started, got: {other:?}"),
    }
    match &events[1] {
        ClientEvent::RequestCompleted { status_code, .. } => assert_eq!(*status_code, 200),
        other => panic!("Expected request completed, got: {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_mutation_failure_is_reported_in_events() {
    let (client, _, _) = client_with(vec![ScriptedResponse::json(
        403,
        r#"{"error": {"status": 403, "message": "Insufficient client scope"}}"#,
    )]);
    let mut events = client.subscribe();

    assert!(client.add_track_to_playlist("p1", "t1").await.is_err());

    let events = drain_events(&mut events);
    let mutation = events
        .iter()
        .find_map(|e| match e {
            ClientEvent::MutationAttempted {
                playlist_id,
                track_id,
                success,
                error_message,
                ..
            } => Some((playlist_id.clone(), track_id.clone(), *success, error_message.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(mutation.0, "p1");
    assert_eq!(mutation.1, "t1");
    assert!(!mutation.2);
    assert!(mutation.3.unwrap().contains("Insufficient client scope"));
}

#[test_log::test(tokio::test)]
async fn test_shared_broadcaster_spans_clients() {
    let (first, _, _) = client_with(vec![]);
    let second_http = ReplayHttpClient::new(vec![ScriptedResponse::json(200, PROFILE_BODY)]);
    let second = first.with_shared_broadcaster(Box::new(second_http));
    let mut events = first.subscribe();

    second.get_current_user().await.unwrap();

    let events = drain_events(&mut events);
    assert!(!events.is_empty());
    assert!(matches!(
        first.latest_event(),
        Some(ClientEvent::RequestCompleted { status_code: 200, .. })
    ));
}

#[test_log::test(tokio::test)]
async fn test_create_playlist_posts_and_parses() {
    let (client, http, _) = client_with(vec![ScriptedResponse::json(
        201,
        r#"{"id": "7d2D2S200NyUE5KYs80PwO", "name": "Sorted: Chill", "images": [], "tracks": {"total": 0}}"#,
    )]);

    let playlist = client
        .create_playlist("wizzler", "Sorted: Chill", "Hand sorted", false)
        .await
        .unwrap();

    assert_eq!(playlist.id, "7d2D2S200NyUE5KYs80PwO");
    assert_eq!(playlist.name, "Sorted: Chill");

    let requests = http.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(
        requests[0].url,
        "https://api.spotify.com/v1/users/wizzler/playlists"
    );
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["name"], "Sorted: Chill");
    assert_eq!(body["description"], "Hand sorted");
    assert_eq!(body["public"], false);
}
