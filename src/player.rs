//! Image-sequence playback.
//!
//! A [`FramePlayer`] steps through a fixed [`FrameSequence`] either on a
//! recurring timer or in response to transport actions (first, prev,
//! play/pause, next, last, slider). Every render goes through a
//! [`FrameView`], so the playback logic has no idea what it is drawing on.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::scheduler::{Scheduler, TimerHandle};

/// Default delay between frames during playback
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(500);

/// Ordered, fixed-length list of frame references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence<F> {
    frames: Vec<F>,
}

impl<F> FrameSequence<F> {
    pub fn new(frames: Vec<F>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&F> {
        self.frames.get(index)
    }
}

impl<F> From<Vec<F>> for FrameSequence<F> {
    fn from(frames: Vec<F>) -> Self {
        Self::new(frames)
    }
}

/// The two surfaces a render touches.
pub trait FrameView<F> {
    fn show_frame(&mut self, frame: &F);

    /// 1-based position of the slider
    fn set_slider_position(&mut self, position: usize);

    /// Updates both surfaces for one render. Views that have observers
    /// override this to publish both values together.
    fn present(&mut self, frame: &F, position: usize) {
        self.show_frame(frame);
        self.set_slider_position(position);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
}

/// Identifies one run of the recurring advance timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

pub type TickReceiver = mpsc::UnboundedReceiver<TimerId>;

struct ActiveTimer {
    id: TimerId,
    _handle: TimerHandle,
}

/// Slideshow controller over one [`FrameSequence`].
///
/// Timer ticks do not touch the player directly: the scheduled task posts the
/// timer's [`TimerId`] to the channel returned by [`FramePlayer::create`], and
/// whoever owns the player feeds those ids back through
/// [`FramePlayer::on_tick`]. Ticks from a timer that has since been stopped are
/// ignored there.
pub struct FramePlayer<F, V, S> {
    sequence: FrameSequence<F>,
    view: V,
    scheduler: S,
    period: Duration,
    current_index: usize,
    timer: Option<ActiveTimer>,
    next_timer_id: u64,
    ticks: mpsc::UnboundedSender<TimerId>,
}

impl<F, V, S> FramePlayer<F, V, S>
where
    V: FrameView<F>,
    S: Scheduler,
{
    /// Builds a player positioned on the first frame and starts playback when
    /// there is anything to play.
    pub fn create(
        sequence: FrameSequence<F>,
        view: V,
        scheduler: S,
        period: Duration,
    ) -> (Self, TickReceiver) {
        let (ticks, tick_rx) = mpsc::unbounded_channel();
        let mut player = Self {
            sequence,
            view,
            scheduler,
            period,
            current_index: 0,
            timer: None,
            next_timer_id: 0,
            ticks,
        };

        player.render();
        player.start();
        (player, tick_rx)
    }

    pub fn num_frames(&self) -> usize {
        self.sequence.len()
    }

    #[cfg(test)]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn state(&self) -> PlayerState {
        match self.timer {
            Some(_) => PlayerState::Playing,
            None => PlayerState::Stopped,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    pub fn playback(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.current_index,
            is_playing: self.is_playing(),
        }
    }

    #[cfg(test)]
    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn start(&mut self) {
        if self.timer.is_some() || self.sequence.is_empty() {
            return;
        }

        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;

        let ticks = self.ticks.clone();
        let handle = self.scheduler.every(
            self.period,
            Box::new(move || {
                // Nothing left to notify once the tick receiver is gone.
                let _ = ticks.send(id);
            }),
        );

        debug!("▶️ Playback started (timer {})", id.0);
        self.timer = Some(ActiveTimer { id, _handle: handle });
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!("⏸️ Playback stopped (timer {})", timer.id.0);
        }
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn advance(&mut self) {
        let n = self.sequence.len();
        if n == 0 {
            return;
        }
        self.current_index = (self.current_index + 1) % n;
        self.render();
    }

    /// Applies one tick. Returns false when the tick came from a timer that
    /// is no longer active.
    pub fn on_tick(&mut self, id: TimerId) -> bool {
        let current = self.timer.as_ref().map(|timer| timer.id);
        if current != Some(id) {
            trace!("Dropping stale tick from timer {}", id.0);
            return false;
        }
        self.advance();
        true
    }

    pub fn seek_first(&mut self) {
        self.stop();
        if self.sequence.is_empty() {
            return;
        }
        self.current_index = 0;
        self.render();
    }

    /// Steps back with `(index + N - 2) mod N`, which is the established
    /// behaviour of the prev button.
    pub fn seek_prev(&mut self) {
        self.stop();
        let n = self.sequence.len();
        if n == 0 {
            return;
        }
        self.current_index = (self.current_index + 2 * n - 2) % n;
        self.render();
    }

    pub fn seek_next(&mut self) {
        self.stop();
        self.advance();
    }

    pub fn seek_last(&mut self) {
        self.stop();
        let n = self.sequence.len();
        if n == 0 {
            return;
        }
        self.current_index = n - 1;
        self.render();
    }

    /// Jumps to a 1-based slider value. Values outside `[1, N]` are clamped.
    pub fn on_slider_drag(&mut self, value: usize) {
        self.stop();
        let n = self.sequence.len();
        if n == 0 {
            return;
        }
        self.current_index = value.clamp(1, n) - 1;
        self.render();
    }

    pub fn dispose(&mut self) {
        self.stop();
    }

    fn render(&mut self) {
        if let Some(frame) = self.sequence.get(self.current_index) {
            self.view.present(frame, self.current_index + 1);
        }
    }
}
