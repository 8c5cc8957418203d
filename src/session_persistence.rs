use crate::{Result, SorterError, SpotifySession};
use std::fs;
use std::path::PathBuf;

/// Session persistence utilities for managing session data in XDG directories.
///
/// This module provides functionality to save and load authenticated sessions
/// using the XDG Base Directory Specification. Sessions are stored per-user
/// in the format: `~/.local/share/spotify-sorter/users/{username}/session.json`
pub struct SessionPersistence;

impl SessionPersistence {
    fn data_dir() -> Result<PathBuf> {
        dirs::data_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "cannot determine XDG data directory",
            )
            .into()
        })
    }

    /// Get the session file path for a given username using XDG directories.
    ///
    /// Returns a path like: `~/.local/share/spotify-sorter/users/{username}/session.json`
    pub fn get_session_path(username: &str) -> Result<PathBuf> {
        let session_dir = Self::data_dir()?
            .join("spotify-sorter")
            .join("users")
            .join(username);

        Ok(session_dir.join("session.json"))
    }

    /// Save a session to the XDG data directory.
    ///
    /// Creates the necessary directory structure and writes the session as
    /// JSON under the path returned by [`Self::get_session_path`]. The
    /// session's own `username` selects the directory, so refreshed tokens
    /// overwrite the previous file for that user.
    pub fn save_session(session: &SpotifySession) -> Result<()> {
        let session_path = Self::get_session_path(&session.username)?;

        if let Some(parent) = session_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let session_json = session.to_json()?;
        fs::write(&session_path, session_json)?;

        log::debug!("Session saved to: {}", session_path.display());
        Ok(())
    }

    /// Load a session from the XDG data directory.
    ///
    /// Returns [`SorterError::Auth`] when no session file exists for the
    /// user, since that is indistinguishable from never having logged in.
    pub fn load_session(username: &str) -> Result<SpotifySession> {
        let session_path = Self::get_session_path(username)?;

        if !session_path.exists() {
            return Err(SorterError::Auth(format!(
                "No saved session found for user: {username}"
            )));
        }

        let session_json = fs::read_to_string(&session_path)?;
        let session = SpotifySession::from_json(&session_json)?;

        log::debug!("Session loaded from: {}", session_path.display());
        Ok(session)
    }

    /// Check if a saved session exists for the given username.
    pub fn session_exists(username: &str) -> bool {
        match Self::get_session_path(username) {
            Ok(path) => path.exists(),
            Err(_) => false,
        }
    }

    /// Remove a saved session for the given username.
    ///
    /// Removing a session that does not exist is not an error.
    pub fn remove_session(username: &str) -> Result<()> {
        let session_path = Self::get_session_path(username)?;

        if session_path.exists() {
            fs::remove_file(&session_path)?;
            log::debug!("Session removed from: {}", session_path.display());
        }

        Ok(())
    }

    /// List all usernames that have saved sessions.
    ///
    /// Scans the XDG data directory for session files and returns the usernames.
    pub fn list_saved_users() -> Result<Vec<String>> {
        let users_dir = Self::data_dir()?.join("spotify-sorter").join("users");

        if !users_dir.exists() {
            return Ok(Vec::new());
        }

        let mut users = Vec::new();
        for entry in fs::read_dir(&users_dir)? {
            let entry = entry?;

            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                let session_file = entry.path().join("session.json");
                if session_file.exists() {
                    if let Some(username) = entry.file_name().to_str() {
                        users.push(username.to_string());
                    }
                }
            }
        }

        Ok(users)
    }
}
