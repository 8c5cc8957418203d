//! Wire-format models and response parsing for the Web API.
//!
//! The structs here mirror the JSON payloads the service returns; the
//! `parse_*` functions turn raw response bodies into the crate's domain
//! types. Parsing is kept separate from request plumbing so it can be
//! tested against captured payloads.

use chrono::Utc;
use serde::Deserialize;

use crate::types::{
    ArtistInfo, Playlist, PlaylistPage, SorterError, TokenGrant, Track, TrackArtist, TrackPage,
    UserProfile,
};
use crate::Result;

// =============================================================================
// Wire structs
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiTrackCount {
    total: u32,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    images: Option<Vec<ApiImage>>,
    tracks: Option<ApiTrackCount>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylistsResponse {
    items: Vec<ApiPlaylist>,
    total: u32,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiArtistRef {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    name: Option<String>,
    images: Option<Vec<ApiImage>>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    uri: Option<String>,
    name: String,
    artists: Option<Vec<ApiArtistRef>>,
    album: Option<ApiAlbum>,
    duration_ms: Option<u64>,
    is_local: Option<bool>,
}

/// One entry of a tracks page. Playlist items carry `is_local` and `track`
/// side by side; saved-tracks items only carry `track`. The track itself can
/// be null for entries the service can no longer resolve.
#[derive(Debug, Deserialize)]
struct ApiPlaylistItem {
    track: Option<ApiTrack>,
    is_local: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApiTracksResponse {
    items: Vec<ApiPlaylistItem>,
    total: u32,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUserProfile {
    id: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    id: String,
    name: String,
    genres: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ApiTokenResponse {
    access_token: String,
    token_type: Option<String>,
    scope: Option<String>,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Error envelope used by the API endpoints: `{"error": {"status": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error shape used by the accounts service: `{"error": ..., "error_description": ...}`.
#[derive(Debug, Deserialize)]
struct ApiAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

// =============================================================================
// Parse functions
// =============================================================================

fn parse_error<E: std::fmt::Display>(e: E) -> SorterError {
    SorterError::Parse(e.to_string())
}

fn first_image_url(images: Option<Vec<ApiImage>>) -> Option<String> {
    images.and_then(|mut imgs| {
        if imgs.is_empty() {
            None
        } else {
            Some(imgs.remove(0).url)
        }
    })
}

fn convert_track(item: ApiPlaylistItem) -> Option<Track> {
    let track = item.track?;
    // Local files can lack a catalog ID; the URI still identifies them.
    let id = track.id.or(track.uri)?;
    let is_local = item.is_local.unwrap_or(false) || track.is_local.unwrap_or(false);
    Some(Track {
        id,
        name: track.name,
        artists: track
            .artists
            .unwrap_or_default()
            .into_iter()
            .map(|a| TrackArtist {
                id: a.id,
                name: a.name,
            })
            .collect(),
        album: track.album.as_ref().and_then(|a| a.name.clone()),
        artwork_url: track.album.and_then(|a| first_image_url(a.images)),
        duration_ms: track.duration_ms,
        is_local,
    })
}

/// Parses one page of playlist or saved tracks.
///
/// `offset` is the offset this page was requested at; the returned
/// `next_offset` advances it by the raw item count so the cursor stays
/// aligned with the remote list even when unresolvable entries are dropped.
pub(crate) fn parse_track_page(body: &str, offset: u32) -> Result<TrackPage> {
    let response: ApiTracksResponse = serde_json::from_str(body).map_err(parse_error)?;
    let raw_count = response.items.len() as u32;
    let tracks = response.items.into_iter().filter_map(convert_track).collect();
    let next_offset = response.next.is_some().then_some(offset + raw_count);
    Ok(TrackPage {
        tracks,
        total: response.total,
        next_offset,
    })
}

/// Parses one page of the user's playlists.
pub(crate) fn parse_playlist_page(body: &str, offset: u32) -> Result<PlaylistPage> {
    let response: ApiPlaylistsResponse = serde_json::from_str(body).map_err(parse_error)?;
    let raw_count = response.items.len() as u32;
    let playlists = response
        .items
        .into_iter()
        .map(|p| Playlist {
            id: p.id,
            name: p.name,
            artwork_url: first_image_url(p.images),
            track_count: p.tracks.map(|t| t.total).unwrap_or(0),
        })
        .collect();
    let next_offset = response.next.is_some().then_some(offset + raw_count);
    Ok(PlaylistPage {
        playlists,
        total: response.total,
        next_offset,
    })
}

/// Parses a single playlist object, as returned by playlist creation.
pub(crate) fn parse_playlist(body: &str) -> Result<Playlist> {
    let p: ApiPlaylist = serde_json::from_str(body).map_err(parse_error)?;
    Ok(Playlist {
        id: p.id,
        name: p.name,
        artwork_url: first_image_url(p.images),
        track_count: p.tracks.map(|t| t.total).unwrap_or(0),
    })
}

/// Parses the signed-in user's profile.
pub(crate) fn parse_user_profile(body: &str) -> Result<UserProfile> {
    let profile: ApiUserProfile = serde_json::from_str(body).map_err(parse_error)?;
    Ok(UserProfile {
        id: profile.id,
        display_name: profile.display_name,
    })
}

/// Parses an artist object.
pub(crate) fn parse_artist(body: &str) -> Result<ArtistInfo> {
    let artist: ApiArtist = serde_json::from_str(body).map_err(parse_error)?;
    Ok(ArtistInfo {
        id: artist.id,
        name: artist.name,
        genres: artist.genres.unwrap_or_default(),
    })
}

/// Parses an OAuth token response, converting the relative `expires_in`
/// into an absolute expiry.
pub(crate) fn parse_token_grant(body: &str) -> Result<TokenGrant> {
    let response: ApiTokenResponse = serde_json::from_str(body).map_err(parse_error)?;
    Ok(TokenGrant {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
        scope: response.scope,
        expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in),
    })
}

/// Extracts the error message from an API error body, if it has one.
pub(crate) fn parse_api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|r| r.error.message)
}

/// Extracts the error description from an accounts-service error body.
pub(crate) fn parse_auth_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiAuthErrorResponse>(body)
        .ok()
        .map(|r| match r.error_description {
            Some(description) => format!("{}: {}", r.error, description),
            None => r.error,
        })
}
