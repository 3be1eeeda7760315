//! `liveboard-gateway watch`: subscribe to a running gateway and log the
//! leaderboard as it changes.

use std::time::Duration;

use futures_util::StreamExt;
use liveboard_client::{ClientView, ReconnectController, SseTransport, StreamTarget};
use liveboard_core::config::LiveboardConfig;
use tokio_stream::wrappers::WatchStream;
use tracing::info;

pub async fn run(
    config: LiveboardConfig,
    target: StreamTarget,
    url: Option<String>,
) -> anyhow::Result<()> {
    let server_url = url.unwrap_or_else(|| config.client.server_url.clone());
    info!(server = %server_url, handle = %target.handle, mode = %target.mode, "watching");

    let controller = ReconnectController::spawn(
        SseTransport::new(server_url),
        config.leaderboard.clone(),
        Duration::from_millis(config.client.reconnect_delay_ms),
    );
    let mut views = WatchStream::new(controller.subscribe());
    controller.connect(target).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            view = views.next() => match view {
                Some(view) => log_view(&view),
                None => break,
            },
        }
    }

    controller.disconnect().await?;
    controller.shutdown().await;
    Ok(())
}

fn log_view(view: &ClientView) {
    let stats = &view.board.stats;
    let leader = view
        .board
        .top_likers
        .first()
        .map(|e| format!("{} ({})", e.user.nickname, e.total_likes));
    let donor = view
        .board
        .top_donors
        .first()
        .map(|e| format!("{} ({})", e.user.nickname, e.total_diamonds));

    info!(
        status = ?view.status,
        viewers = stats.viewer_count,
        likes = stats.like_count,
        diamonds = stats.total_diamonds,
        top_liker = leader.as_deref().unwrap_or("-"),
        top_donor = donor.as_deref().unwrap_or("-"),
        "leaderboard"
    );
    if let Some(err) = &view.board.last_error {
        info!(error = %err, "upstream reported");
    }
    if let Ok(json) = serde_json::to_string(&view.board) {
        tracing::debug!(snapshot = %json, "snapshot");
    }
}
