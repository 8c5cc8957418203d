use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_client::Request;

/// User agent sent with every request
const USER_AGENT: &str = concat!("spotify-sorter/", env!("CARGO_PKG_VERSION"));

/// Add the headers common to every request
pub fn add_common_headers(request: &mut Request) {
    let _ = request.insert_header("User-Agent", USER_AGENT);
    let _ = request.insert_header("Accept", "application/json");
}

/// Add bearer authorization for Web API requests
pub fn add_bearer_auth(request: &mut Request, access_token: &str) {
    add_common_headers(request);
    let _ = request.insert_header("Authorization", format!("Bearer {access_token}"));
}

/// Add the content type for JSON request bodies
pub fn add_json_body_headers(request: &mut Request) {
    let _ = request.insert_header("Content-Type", "application/json");
}

/// Add HTTP Basic authorization and the form content type for token
/// endpoint requests
pub fn add_token_request_headers(request: &mut Request, client_id: &str, client_secret: &str) {
    add_common_headers(request);
    let credentials = STANDARD.encode(format!("{client_id}:{client_secret}"));
    let _ = request.insert_header("Authorization", format!("Basic {credentials}"));
    let _ = request.insert_header("Content-Type", "application/x-www-form-urlencoded");
}
