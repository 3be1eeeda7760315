//! Client session driver.
//!
//! A [`ReconnectController`] owns one logical session: the current
//! [`StreamTarget`], the open push stream and the [`Leaderboard`] fed by it.
//! When the transport fails or the server closes the stream it waits a flat
//! delay and reopens the same target, keeping the accumulated state. A user
//! initiated [`ReconnectController::connect`] starts a fresh session instead.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{future::BoxFuture, StreamExt};
use liveboard_core::config::LeaderboardConfig;
use liveboard_protocol::decode_event;
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep, Sleep},
};
use tracing::{debug, info, warn};

use crate::{
    aggregate::{Leaderboard, LeaderboardSnapshot},
    error::{ClientError, Result},
    transport::{FrameStream, StreamTarget, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Waiting out the retry delay after a drop.
    Reconnecting,
}

/// What subscribers of the controller observe after every change.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub status: ConnectionStatus,
    pub target: Option<StreamTarget>,
    pub reconnects: u64,
    pub board: LeaderboardSnapshot,
}

enum Command {
    Connect(StreamTarget),
    Disconnect,
}

pub struct ReconnectController {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ClientView>,
    task: JoinHandle<()>,
}

impl ReconnectController {
    pub fn spawn<T: Transport>(
        transport: T,
        board: LeaderboardConfig,
        retry_delay: Duration,
    ) -> Self {
        let (commands, rx) = mpsc::channel(16);
        let (view_tx, view) = watch::channel(ClientView::default());
        let worker = Worker {
            transport: Arc::new(transport),
            board_config: board.clone(),
            board: Leaderboard::new(&board),
            retry_delay,
            target: None,
            status: ConnectionStatus::Idle,
            reconnects: 0,
            opening: None,
            stream: None,
            retry: None,
            view: view_tx,
        };
        let task = tokio::spawn(worker.run(rx));
        Self {
            commands,
            view,
            task,
        }
    }

    /// Start a new session for `target`, discarding all accumulated state.
    pub async fn connect(&self, target: StreamTarget) -> Result<()> {
        self.send(Command::Connect(target)).await
    }

    /// Close the stream and cancel any pending retry.
    pub async fn disconnect(&self) -> Result<()> {
        self.send(Command::Disconnect).await
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    pub fn current(&self) -> ClientView {
        self.view.borrow().clone()
    }

    /// Stop the session task and wait for it to exit.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            warn!(error = %e, "reconnect task ended abnormally");
        }
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).await.map_err(|_| ClientError::Stopped)
    }
}

struct Worker<T> {
    transport: Arc<T>,
    board_config: LeaderboardConfig,
    board: Leaderboard,
    retry_delay: Duration,
    target: Option<StreamTarget>,
    status: ConnectionStatus,
    reconnects: u64,
    /// In-flight `Transport::open`; dropping it abandons the attempt.
    opening: Option<PendingOpen>,
    stream: Option<FrameStream>,
    // at most one pending retry
    retry: Option<Pin<Box<Sleep>>>,
    view: watch::Sender<ClientView>,
}

impl<T: Transport> Worker<T> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Connect(target)) => {
                        info!(handle = %target.handle, mode = %target.mode, "starting session");
                        self.reset();
                        self.target = Some(target);
                        self.open();
                    }
                    Some(Command::Disconnect) => {
                        info!("session closed by user");
                        self.stop();
                        self.target = None;
                        self.publish();
                    }
                    None => break,
                },
                frame = next_frame(&mut self.stream) => match frame {
                    Some(Ok(payload)) => self.on_frame(&payload),
                    Some(Err(e)) => {
                        warn!(error = %e, "push stream broke");
                        self.schedule_retry();
                    }
                    None => {
                        info!("push stream closed by server");
                        self.schedule_retry();
                    }
                },
                opened = open_done(&mut self.opening) => {
                    self.opening = None;
                    self.on_opened(opened);
                }
                _ = retry_due(&mut self.retry) => {
                    self.retry = None;
                    self.reconnects += 1;
                    self.open();
                }
            }
        }
        debug!("reconnect task exiting");
    }

    /// Start opening the current target. The result arrives through the
    /// `opening` arm of the run loop.
    fn open(&mut self) {
        let Some(target) = self.target.clone() else {
            return;
        };
        self.status = if self.reconnects == 0 {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting
        };
        let transport = Arc::clone(&self.transport);
        self.opening = Some(Box::pin(async move { transport.open(&target).await }));
        self.publish();
    }

    fn on_opened(&mut self, opened: Result<FrameStream>) {
        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                self.status = ConnectionStatus::Connected;
                self.board.set_connected(true);
                self.publish();
            }
            Err(e) => {
                let handle = self.target.as_ref().map(|t| t.handle.as_str()).unwrap_or("");
                warn!(handle, error = %e, "could not open push stream");
                self.schedule_retry();
            }
        }
    }

    fn on_frame(&mut self, payload: &str) {
        match decode_event(payload) {
            Ok(event) => {
                self.board.apply(&event);
                self.publish();
            }
            Err(e) => warn!(error = %e, "dropping frame"),
        }
    }

    /// Drop the stream and arm a single timer; any earlier one is replaced.
    fn schedule_retry(&mut self) {
        self.stream = None;
        self.board.set_connected(false);
        self.status = ConnectionStatus::Reconnecting;
        self.retry = Some(Box::pin(sleep(self.retry_delay)));
        debug!(delay_ms = self.retry_delay.as_millis() as u64, "retry scheduled");
        self.publish();
    }

    fn stop(&mut self) {
        self.opening = None;
        self.stream = None;
        self.retry = None;
        self.status = ConnectionStatus::Idle;
        self.board.set_connected(false);
    }

    fn reset(&mut self) {
        self.stop();
        self.board = Leaderboard::new(&self.board_config);
        self.reconnects = 0;
    }

    fn publish(&self) {
        self.view.send_replace(ClientView {
            status: self.status,
            target: self.target.clone(),
            reconnects: self.reconnects,
            board: self.board.snapshot(),
        });
    }
}

async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<String>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

type PendingOpen = BoxFuture<'static, Result<FrameStream>>;

async fn open_done(opening: &mut Option<PendingOpen>) -> Result<FrameStream> {
    match opening {
        Some(fut) => fut.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn retry_due(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures_util::stream;
    use liveboard_core::{NormalizedEvent, StreamMode, User};
    use liveboard_protocol::encode_event;
    use tokio::time::Instant;

    use super::*;

    enum Script {
        Refuse,
        /// Frames, then the stream breaks.
        Break(Vec<String>),
        /// Frames, then the server closes cleanly.
        Close(Vec<String>),
        /// Frames, then stays open.
        Hang(Vec<String>),
        /// The open itself never completes.
        Stall,
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport {
        scripts: Arc<Mutex<VecDeque<Script>>>,
        opens: Arc<Mutex<Vec<(Instant, StreamTarget)>>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(scripts.into())),
                opens: Arc::default(),
            }
        }

        fn opens(&self) -> Vec<(Instant, StreamTarget)> {
            self.opens.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(&self, target: &StreamTarget) -> Result<FrameStream> {
            self.opens.lock().unwrap().push((Instant::now(), target.clone()));
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Refuse);
            let ok = |frames: Vec<String>| {
                stream::iter(frames.into_iter().map(Ok::<String, ClientError>))
            };
            Ok(match script {
                Script::Refuse => return Err(ClientError::Transport("connection refused".into())),
                Script::Stall => return std::future::pending().await,
                Script::Break(frames) => ok(frames)
                    .chain(stream::once(async {
                        Err(ClientError::Transport("reset by peer".into()))
                    }))
                    .boxed(),
                Script::Close(frames) => ok(frames).boxed(),
                Script::Hang(frames) => ok(frames).chain(stream::pending()).boxed(),
            })
        }
    }

    fn frame(event: NormalizedEvent) -> String {
        encode_event(&event).unwrap()
    }

    fn connected() -> String {
        frame(NormalizedEvent::Connected {
            room_id: "room".into(),
            username: Some("streamer".into()),
        })
    }

    fn like(id: &str, n: u64) -> String {
        frame(NormalizedEvent::Like {
            user: User::new(id, id, ""),
            like_count: n,
            total_like_count: 0,
        })
    }

    fn target(handle: &str) -> StreamTarget {
        StreamTarget::new(handle, StreamMode::Live)
    }

    fn controller(transport: &ScriptedTransport) -> ReconnectController {
        ReconnectController::spawn(
            transport.clone(),
            LeaderboardConfig::default(),
            Duration::from_secs(3),
        )
    }

    fn likes_of(view: &ClientView, id: &str) -> Option<u64> {
        view.board
            .top_likers
            .iter()
            .find(|e| e.user.unique_id == id)
            .map(|e| e.total_likes)
    }

    #[tokio::test(start_paused = true)]
    async fn transport_drop_keeps_accumulated_state() {
        let transport = ScriptedTransport::new(vec![
            Script::Break(vec![connected(), like("a", 5), like("b", 3)]),
            Script::Hang(vec![connected(), like("a", 2)]),
        ]);
        let ctl = controller(&transport);
        ctl.connect(target("streamer")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let view = ctl.current();
        assert_eq!(view.status, ConnectionStatus::Reconnecting);
        assert!(!view.board.stats.is_connected);
        assert_eq!(likes_of(&view, "a"), Some(5));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let view = ctl.current();
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert_eq!(view.reconnects, 1);
        assert_eq!(likes_of(&view, "a"), Some(7));
        assert_eq!(likes_of(&view, "b"), Some(3));
        assert_eq!(view.board.stats.like_count, 10);
        assert!(view.board.stats.is_connected);

        let opens = transport.opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[1].1, target("streamer"));
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_flat_and_unbounded() {
        let transport = ScriptedTransport::new(vec![]);
        let ctl = controller(&transport);
        ctl.connect(target("offline")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_000 * 5 + 500)).await;
        let opens = transport.opens();
        assert_eq!(opens.len(), 6);
        for pair in opens.windows(2) {
            assert_eq!(pair[1].0 - pair[0].0, Duration::from_secs(3));
        }
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_also_reconnects() {
        let transport = ScriptedTransport::new(vec![
            Script::Close(vec![connected(), like("a", 1)]),
            Script::Hang(vec![]),
        ]);
        let ctl = controller(&transport);
        ctl.connect(target("streamer")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(transport.opens().len(), 2);
        assert_eq!(likes_of(&ctl.current(), "a"), Some(1));
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_connect_resets_state_and_cancels_pending_retry() {
        let transport = ScriptedTransport::new(vec![
            Script::Break(vec![connected(), like("a", 5)]),
            Script::Hang(vec![connected(), like("z", 1)]),
        ]);
        let ctl = controller(&transport);
        ctl.connect(target("first")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ctl.current().status, ConnectionStatus::Reconnecting);

        ctl.connect(target("second")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let opens = transport.opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[1].1, target("second"));

        let view = ctl.current();
        assert_eq!(view.reconnects, 0);
        assert_eq!(likes_of(&view, "a"), None);
        assert_eq!(likes_of(&view, "z"), Some(1));
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_retry() {
        let transport = ScriptedTransport::new(vec![Script::Refuse]);
        let ctl = controller(&transport);
        ctl.connect(target("streamer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        ctl.disconnect().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.opens().len(), 1);
        let view = ctl.current();
        assert_eq!(view.status, ConnectionStatus::Idle);
        assert_eq!(view.target, None);
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_stalled_open_goes_idle() {
        let transport = ScriptedTransport::new(vec![Script::Stall]);
        let ctl = controller(&transport);
        ctl.connect(target("streamer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ctl.current().status, ConnectionStatus::Connecting);

        ctl.disconnect().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        let view = ctl.current();
        assert_eq!(view.status, ConnectionStatus::Idle);
        assert_eq!(view.target, None);
        assert_eq!(transport.opens().len(), 1);
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn connect_replaces_stalled_open() {
        let transport = ScriptedTransport::new(vec![
            Script::Stall,
            Script::Hang(vec![connected(), like("b", 2)]),
        ]);
        let ctl = controller(&transport);
        ctl.connect(target("first")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        ctl.connect(target("second")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let view = ctl.current();
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert_eq!(view.target, Some(target("second")));
        assert_eq!(likes_of(&view, "b"), Some(2));
        assert_eq!(transport.opens().len(), 2);
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_not_blocked_by_stalled_open() {
        let transport = ScriptedTransport::new(vec![Script::Stall]);
        let ctl = controller(&transport);
        ctl.connect(target("streamer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        tokio::time::timeout(Duration::from_secs(5), ctl.shutdown())
            .await
            .expect("shutdown should not wait on the open");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped() {
        let transport = ScriptedTransport::new(vec![Script::Hang(vec![
            connected(),
            "not json".into(),
            r#"{"type":"chat","comment":"hi"}"#.into(),
            like("a", 4),
        ])]);
        let ctl = controller(&transport);
        ctl.connect(target("streamer")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let view = ctl.current();
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert_eq!(likes_of(&view, "a"), Some(4));
        assert_eq!(transport.opens().len(), 1);
        ctl.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_do_not_share_state() {
        let t1 = ScriptedTransport::new(vec![Script::Hang(vec![connected(), like("a", 9)])]);
        let t2 = ScriptedTransport::new(vec![Script::Hang(vec![connected(), like("b", 1)])]);
        let c1 = controller(&t1);
        let c2 = controller(&t2);
        c1.connect(target("one")).await.unwrap();
        c2.connect(target("two")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(likes_of(&c1.current(), "b"), None);
        assert_eq!(likes_of(&c2.current(), "a"), None);
        assert_eq!(c1.current().board.stats.like_count, 9);
        assert_eq!(c2.current().board.stats.like_count, 1);
        c1.shutdown().await;
        c2.shutdown().await;
    }

    #[tokio::test]
    async fn view_closes_after_shutdown() {
        let transport = ScriptedTransport::new(vec![]);
        let ctl = controller(&transport);
        let view = ctl.subscribe();
        ctl.shutdown().await;
        assert!(view.has_changed().is_err());
    }
}
