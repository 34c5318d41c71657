// src/worklet.rs
//
// Real-time audio context.
//
// `process` is called once per audio quantum by the host's audio callback.
// Everything here is non-blocking: messages are drained with `try_recv` and
// samples come from `RelayReader::consume_step`. Nothing is logged from this
// path.

use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use crate::protocol::{Callback, ControlMessage};
use crate::relay::{ConsumeOutcome, RelayReadback, RelayReader};

pub struct Worklet {
    /// Messages from the control context.
    commands: Receiver<ControlMessage>,

    /// Events for the control context (`feedout`, `callback: ended`,
    /// retired readers).
    events: Sender<ControlMessage>,

    reader: Option<RelayReader>,
    playing: bool,
    connected: bool,
}

impl Worklet {
    pub fn new(commands: Receiver<ControlMessage>, events: Sender<ControlMessage>) -> Self {
        Self {
            commands,
            events,
            reader: None,
            playing: false,
            connected: true,
        }
    }

    /// Render one quantum into `left`/`right`.
    ///
    /// Returns `false` once the control context has gone away and the host
    /// may tear the processor down.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        self.process_commands();

        let reader = match self.reader.as_mut() {
            Some(reader) if self.playing => reader,
            _ => {
                left.fill(0.0);
                right.fill(0.0);
                return self.connected;
            }
        };

        match reader.consume_step(left, right) {
            ConsumeOutcome::FeedOutStarted => {
                let _ = self.events.send(ControlMessage::FeedOut);
            }
            ConsumeOutcome::Ended => {
                self.playing = false;
                let _ = self
                    .events
                    .send(ControlMessage::Callback(Callback::Ended));
            }
            ConsumeOutcome::Stopped => self.playing = false,
            ConsumeOutcome::Played | ConsumeOutcome::Underrun => {}
        }

        self.connected
    }

    /// Apply all pending control messages.
    pub fn process_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(ControlMessage::Attach { reader }) => {
                    if let Some(old) = self.reader.replace(reader) {
                        // freeing the slots is left to the control context
                        let _ = self.events.send(ControlMessage::Retire { reader: old });
                    }
                    self.playing = false;
                }
                Ok(ControlMessage::Play) => self.playing = self.reader.is_some(),
                Ok(ControlMessage::Stop) => {
                    if let Some(reader) = &self.reader {
                        reader.stop();
                    }
                    self.playing = false;
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.connected = false;
                    break;
                }
            }
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn readback(&self) -> Option<RelayReadback> {
        self.reader.as_ref().map(RelayReader::readback)
    }
}
