// src/player.rs
//
// Playlist on top of the controller.
//
// Items play in file-name order. Input the engine rejects is skipped; an
// engine failure during playback puts the player into an error state that
// the UI shows as an alert. There is no other retry.

use std::collections::VecDeque;

use log::{debug, error, info, warn};

use crate::controller::{PlayerEvent, WgmController};
use crate::engine::SequenceKind;
use crate::error::{RelayError, RelayResult};
use crate::gd3::Gd3;

/// A queued music-log file.
#[derive(Debug, Clone)]
pub struct PlaylistItem {
    pub name: String,
    pub data: Vec<u8>,
}

impl PlaylistItem {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn kind(&self) -> SequenceKind {
        SequenceKind::from_file_name(&self.name)
    }
}

/// The track currently loaded.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub name: String,
    pub kind: SequenceKind,
    /// 1-based position in the playlist.
    pub position: usize,
    pub total: usize,
    pub meta: Gd3,
}

impl NowPlaying {
    /// "Track n / total"
    pub fn position_label(&self) -> String {
        format!("Track {} / {}", self.position, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    FeedOut,
    /// Engine failure; carries the alert text.
    Error(String),
}

pub struct Player {
    controller: WgmController,
    queue: VecDeque<PlaylistItem>,
    total: usize,
    taken: usize,
    now_playing: Option<NowPlaying>,
    state: PlayerState,
}

impl Player {
    pub fn new(controller: WgmController) -> Self {
        Self {
            controller,
            queue: VecDeque::new(),
            total: 0,
            taken: 0,
            now_playing: None,
            state: PlayerState::Idle,
        }
    }

    /// Replace the playlist. Items are sorted by name; nothing starts
    /// until [`next`](Self::next).
    pub fn set_playlist(&mut self, mut items: Vec<PlaylistItem>) {
        self.controller.stop();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        self.total = items.len();
        self.taken = 0;
        self.queue = items.into();
        self.now_playing = None;
        self.state = PlayerState::Idle;
        debug!("playlist set: {} item(s)", self.total);
    }

    /// Start the next playable item.
    ///
    /// Malformed items are skipped. Returns `Ok(None)` once the playlist is
    /// exhausted.
    pub fn next(&mut self) -> RelayResult<Option<&NowPlaying>> {
        while let Some(item) = self.queue.pop_front() {
            self.taken += 1;
            let kind = item.kind();
            match self.controller.create(item.data, kind) {
                Ok(meta) => {
                    self.controller.play()?;
                    let now = NowPlaying {
                        name: item.name,
                        kind,
                        position: self.taken,
                        total: self.total,
                        meta,
                    };
                    info!(
                        "{}: {} [{}]",
                        now.position_label(),
                        now.meta.game_track_name(),
                        now.name
                    );
                    self.state = PlayerState::Playing;
                    return Ok(Some(self.now_playing.insert(now)));
                }
                Err(RelayError::MalformedInput) => {
                    warn!("skipping {}: not a playable {} file", item.name, kind.as_str());
                }
                Err(e) => {
                    self.fail(e.to_string());
                    return Err(e);
                }
            }
        }

        debug!("playlist exhausted");
        self.controller.stop();
        self.now_playing = None;
        self.state = PlayerState::Idle;
        Ok(None)
    }

    /// Stop playback. The rest of the playlist stays queued.
    pub fn stop(&mut self) {
        self.controller.stop();
        self.state = PlayerState::Idle;
    }

    /// React to controller events: advance on end of track, surface
    /// engine failures.
    pub fn tick(&mut self) -> RelayResult<()> {
        for event in self.controller.poll_events() {
            match event {
                PlayerEvent::FeedOut => {
                    if self.state == PlayerState::Playing {
                        self.state = PlayerState::FeedOut;
                    }
                }
                PlayerEvent::Ended => {
                    if matches!(self.state, PlayerState::Playing | PlayerState::FeedOut) {
                        self.next()?;
                    }
                }
                PlayerEvent::Failed(message) => self.fail(message),
            }
        }
        Ok(())
    }

    fn fail(&mut self, message: String) {
        error!("playback failed: {message}");
        self.state = PlayerState::Error(message);
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn controller(&self) -> &WgmController {
        &self.controller
    }
}
