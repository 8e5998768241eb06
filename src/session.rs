use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::frames::EventFrames;
use crate::player::{FramePlayer, FrameView, TickReceiver};
use crate::scheduler::{Scheduler, TokioScheduler};

/// User actions coming from the transport controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCommand {
    First,
    Prev,
    Toggle,
    Next,
    Last,
    /// 1-based slider value
    Seek(usize),
    Dispose,
}

impl TransportCommand {
    /// Parses the action segment of `/api/playback/:event/transport/:action`
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "first" => Some(Self::First),
            "prev" => Some(Self::Prev),
            "toggle" => Some(Self::Toggle),
            "next" => Some(Self::Next),
            "last" => Some(Self::Last),
            "close" => Some(Self::Dispose),
            _ => None,
        }
    }
}

/// What a viewer of the session currently sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub event: String,
    pub frame: Option<String>,
    pub slider_position: usize,
    pub num_frames: usize,
    pub playing: bool,
}

/// View that publishes renders to watchers of the session
pub struct WatchView {
    published: Arc<watch::Sender<PlayerSnapshot>>,
}

impl FrameView<String> for WatchView {
    fn show_frame(&mut self, frame: &String) {
        self.published
            .send_modify(|snapshot| snapshot.frame = Some(frame.clone()));
    }

    fn set_slider_position(&mut self, position: usize) {
        self.published
            .send_modify(|snapshot| snapshot.slider_position = position);
    }

    fn present(&mut self, frame: &String, position: usize) {
        self.published.send_modify(|snapshot| {
            snapshot.frame = Some(frame.clone());
            snapshot.slider_position = position;
        });
    }
}

/// Cloneable handle to a running playback session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<TransportCommand>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    frames: Arc<EventFrames>,
    started: Instant,
    /// Milliseconds after `started` of the last viewer activity
    last_seen_ms: Arc<AtomicU64>,
    pub opened_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.touch();
        self.snapshot.borrow().clone()
    }

    /// Frame files the session was opened with. They do not change while the
    /// session runs, even if the event directory does.
    pub fn frames(&self) -> &EventFrames {
        &self.frames
    }

    /// Returns false once the session has shut down
    pub async fn send(&self, command: TransportCommand) -> bool {
        self.touch();
        self.commands.send(command).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Time since a viewer last read or drove the session
    pub fn idle_for(&self) -> Duration {
        let last_seen = self.started + Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        Instant::now().saturating_duration_since(last_seen)
    }

    fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_seen_ms.fetch_max(elapsed, Ordering::Relaxed);
    }
}

/// Starts a player over the event's frames on its own task.
///
/// Ticks and commands are handled one at a time by that task, so each
/// transport action runs to completion before the next event is looked at.
pub fn spawn_session(frames: EventFrames, period: Duration, queue_depth: usize) -> SessionHandle {
    spawn_session_with(frames, TokioScheduler, period, queue_depth)
}

pub fn spawn_session_with<S>(
    frames: EventFrames,
    scheduler: S,
    period: Duration,
    queue_depth: usize,
) -> SessionHandle
where
    S: Scheduler + Send + 'static,
{
    let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot {
        event: frames.event.clone(),
        frame: None,
        slider_position: 1,
        num_frames: 0,
        playing: false,
    });
    let published = Arc::new(snapshot_tx);
    let view = WatchView {
        published: published.clone(),
    };

    let (commands_tx, commands_rx) = mpsc::channel(queue_depth.max(1));
    let (player, ticks) = FramePlayer::create(frames.sequence(), view, scheduler, period);
    let playback = player.playback();
    published.send_modify(|snapshot| {
        snapshot.num_frames = player.num_frames();
        snapshot.slider_position = playback.current_index + 1;
        snapshot.playing = playback.is_playing;
    });

    let event_name = frames.event.clone();
    tokio::spawn(async move {
        run_session(player, commands_rx, ticks, published).await;
        debug!("🎞️ Playback session {} finished", event_name);
    });

    SessionHandle {
        commands: commands_tx,
        snapshot: snapshot_rx,
        frames: Arc::new(frames),
        started: Instant::now(),
        last_seen_ms: Arc::new(AtomicU64::new(0)),
        opened_at: Utc::now(),
    }
}

async fn run_session<S: Scheduler>(
    mut player: FramePlayer<String, WatchView, S>,
    mut commands: mpsc::Receiver<TransportCommand>,
    mut ticks: TickReceiver,
    published: Arc<watch::Sender<PlayerSnapshot>>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(TransportCommand::Dispose) | None => break,
                Some(command) => apply(&mut player, command),
            },
            Some(id) = ticks.recv() => {
                player.on_tick(id);
            }
        }

        let playing = player.playback().is_playing;
        published.send_if_modified(|snapshot| {
            let changed = snapshot.playing != playing;
            snapshot.playing = playing;
            changed
        });
    }

    player.dispose();
    published.send_modify(|snapshot| snapshot.playing = false);
}

fn apply<S: Scheduler>(player: &mut FramePlayer<String, WatchView, S>, command: TransportCommand) {
    debug!("🎛️ Transport command {:?}", command);
    match command {
        TransportCommand::First => player.seek_first(),
        TransportCommand::Prev => player.seek_prev(),
        TransportCommand::Toggle => player.toggle(),
        TransportCommand::Next => player.seek_next(),
        TransportCommand::Last => player.seek_last(),
        TransportCommand::Seek(value) => player.on_slider_drag(value),
        TransportCommand::Dispose => player.dispose(),
    }
}

/// Open playback sessions keyed by event id
#[derive(Debug, Clone, Default)]
pub struct PlaybackSessions {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl PlaybackSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, event: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(event).filter(|s| !s.is_closed()).cloned()
    }

    /// Returns the running session for `event`, or starts one from `open`.
    pub async fn get_or_open<F>(&self, event: &str, open: F) -> SessionHandle
    where
        F: FnOnce() -> SessionHandle,
    {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(event) {
            if !existing.is_closed() {
                return existing.clone();
            }
            warn!("Replacing dead playback session for {}", event);
        }

        let session = open();
        info!("🎞️ Opened playback session for event {}", event);
        sessions.insert(event.to_string(), session.clone());
        session
    }

    /// Disposes the session for `event`. Returns false if none was open.
    pub async fn close(&self, event: &str) -> bool {
        let removed = self.sessions.write().await.remove(event);
        match removed {
            Some(session) => {
                session.send(TransportCommand::Dispose).await;
                info!("🛑 Closed playback session for event {}", event);
                true
            }
            None => false,
        }
    }

    pub async fn list(&self) -> Vec<(String, DateTime<Utc>)> {
        let sessions = self.sessions.read().await;
        let mut open: Vec<_> = sessions
            .iter()
            .filter(|(_, s)| !s.is_closed())
            .map(|(event, s)| (event.clone(), s.opened_at))
            .collect();
        open.sort();
        open
    }

    /// Closes every session nobody has looked at for `idle`, along with any
    /// whose task already ended. Returns the events that were closed.
    pub async fn reap_idle(&self, idle: Duration) -> Vec<String> {
        let stale: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, s)| s.is_closed() || s.idle_for() >= idle)
                .map(|(event, _)| event.clone())
                .collect()
        };

        for event in &stale {
            debug!("🧹 Reaping idle playback session {}", event);
            self.close(event).await;
        }
        stale
    }
}

/// Periodically closes sessions whose viewers went away without saying so.
pub fn spawn_session_reaper(sessions: PlaybackSessions, idle: Duration) -> JoinHandle<()> {
    let every = (idle / 2).max(Duration::from_millis(100));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let reaped = sessions.reap_idle(idle).await;
            if !reaped.is_empty() {
                info!("🧹 Closed {} idle playback session(s)", reaped.len());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    const PERIOD: Duration = Duration::from_millis(500);

    fn frames(n: usize) -> EventFrames {
        EventFrames {
            event: "evt".to_string(),
            files: (0..n).map(|i| PathBuf::from(format!("{:04}.jpg", i))).collect(),
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_autoplays_and_wraps() {
        let session = spawn_session(frames(3), PERIOD, 8);
        settle().await;

        let snapshot = session.snapshot();
        assert!(snapshot.playing);
        assert_eq!(snapshot.frame.as_deref(), Some("/frames/evt/0"));
        assert_eq!(snapshot.slider_position, 1);
        assert_eq!(snapshot.num_frames, 3);

        tokio::time::sleep(Duration::from_millis(1550)).await;
        settle().await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.frame.as_deref(), Some("/frames/evt/0"));
        assert_eq!(snapshot.slider_position, 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(session.snapshot().slider_position, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_commands() {
        let session = spawn_session(frames(5), PERIOD, 8);

        assert!(session.send(TransportCommand::Last).await);
        settle().await;
        let snapshot = session.snapshot();
        assert!(!snapshot.playing);
        assert_eq!(snapshot.slider_position, 5);
        assert_eq!(snapshot.frame.as_deref(), Some("/frames/evt/4"));

        session.send(TransportCommand::Seek(2)).await;
        session.send(TransportCommand::Prev).await;
        settle().await;
        assert_eq!(session.snapshot().slider_position, 5);

        // Stopped sessions stay put while time passes.
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(session.snapshot().slider_position, 5);

        session.send(TransportCommand::Toggle).await;
        settle().await;
        assert!(session.snapshot().playing);
        tokio::time::sleep(Duration::from_millis(510)).await;
        settle().await;
        assert_eq!(session.snapshot().slider_position, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_session_never_plays() {
        let session = spawn_session(frames(0), PERIOD, 8);
        session.send(TransportCommand::Toggle).await;
        settle().await;

        let snapshot = session.snapshot();
        assert!(!snapshot.playing);
        assert_eq!(snapshot.frame, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_reuses_and_closes() {
        let sessions = PlaybackSessions::new();
        let first = sessions
            .get_or_open("evt", || spawn_session(frames(2), PERIOD, 8))
            .await;
        let second = sessions
            .get_or_open("evt", || panic!("session should be reused"))
            .await;
        assert_eq!(first.opened_at, second.opened_at);
        assert_eq!(sessions.list().await.len(), 1);

        assert!(sessions.close("evt").await);
        settle().await;
        assert!(!sessions.close("evt").await);
        assert!(sessions.get("evt").await.is_none());
        assert!(first.is_closed());
        assert!(!first.snapshot().playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_keeps_its_frames() {
        let session = spawn_session(frames(3), PERIOD, 8);
        assert_eq!(session.frames().len(), 3);
        assert_eq!(session.frames().files[2], PathBuf::from("0002.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_reaped() {
        let idle = Duration::from_secs(30);
        let sessions = PlaybackSessions::new();
        let watched = sessions
            .get_or_open("evt", || spawn_session(frames(3), PERIOD, 8))
            .await;
        let abandoned = sessions
            .get_or_open("other", || spawn_session(frames(2), PERIOD, 8))
            .await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        watched.snapshot();
        assert!(sessions.reap_idle(idle).await.is_empty());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(sessions.reap_idle(idle).await, vec!["other".to_string()]);
        settle().await;
        assert!(abandoned.is_closed());
        assert!(!watched.is_closed());
        assert_eq!(sessions.list().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_task_closes_abandoned_sessions() {
        let sessions = PlaybackSessions::new();
        let session = sessions
            .get_or_open("evt", || spawn_session(frames(3), PERIOD, 8))
            .await;
        let reaper = spawn_session_reaper(sessions.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(16)).await;
        settle().await;
        assert!(session.is_closed());
        assert!(sessions.list().await.is_empty());
        reaper.abort();
    }

    #[test]
    fn test_action_names() {
        assert_eq!(TransportCommand::from_action("prev"), Some(TransportCommand::Prev));
        assert_eq!(TransportCommand::from_action("close"), Some(TransportCommand::Dispose));
        assert_eq!(TransportCommand::from_action("rewind"), None);
    }
}
