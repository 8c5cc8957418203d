use spotify_sorter::{AsyncPaginatedIterator, Playlist, SpotifyClient, SpotifyClientImpl};

/// Handle the whoami command
pub async fn handle_whoami(client: &SpotifyClientImpl) -> Result<(), Box<dyn std::error::Error>> {
    let me = client.get_current_user().await?;
    match me.display_name {
        Some(name) => println!("{name} ({})", me.id),
        None => println!("{}", me.id),
    }
    Ok(())
}

/// Handle the playlists command
pub async fn handle_playlists(
    client: &SpotifyClientImpl,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    // Liked Songs always leads, the way the sorter presents sources.
    let mut playlists = vec![Playlist::liked_tracks()];
    playlists.extend(client.get_all_user_playlists().await?);

    let total = playlists.len();
    let shown = if limit > 0 && total > limit {
        &playlists[..limit]
    } else {
        &playlists[..]
    };

    for playlist in shown {
        println!(
            "{:<24} {:>6}  {}",
            playlist.id, playlist.track_count, playlist.name
        );
    }
    if limit > 0 && total > limit {
        println!("... and {} more", total - limit);
    }
    Ok(())
}

/// Handle the tracks command
pub async fn handle_tracks(
    client: &SpotifyClientImpl,
    playlist_id: &str,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut iterator = client.playlist_tracks(playlist_id);
    let tracks = if limit > 0 {
        iterator.take(limit).await?
    } else {
        iterator.collect_all().await?
    };

    for (index, track) in tracks.iter().enumerate() {
        let marker = if track.is_local { " (local)" } else { "" };
        println!(
            "{:>5}  {:>6}  {}{marker}",
            index + 1,
            track.duration_formatted(),
            track
        );
    }
    Ok(())
}
