//! Control context: the handle the UI talks to.
//!
//! # Architecture
//!
//! - **Control thread** owns the [`WgmController`]
//! - **Generation thread** runs the [`Worker`], spawned by [`prepare`]
//! - **Audio thread** owns the [`Worklet`] returned by [`prepare`]
//! - Control messages travel over mpsc channels; sample data only ever goes
//!   through the relay
//!
//! # Usage
//!
//! ```ignore
//! let (mut controller, worklet) = prepare(Box::new(factory), RelayConfig::default())?;
//!
//! // control thread
//! let meta = controller.create(data, SequenceKind::Vgm)?;
//! controller.play()?;
//!
//! // audio thread, once per quantum
//! worklet.process(&mut left, &mut right);
//!
//! // control thread, periodically
//! for event in controller.poll_events() { /* ... */ }
//! ```

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::config::RelayConfig;
use crate::engine::{EngineFactory, SequenceKind};
use crate::error::{RelayError, RelayResult};
use crate::gd3::Gd3;
use crate::protocol::{Callback, ControlMessage};
use crate::relay::{SessionState, StopHandle};
use crate::worker::Worker;
use crate::worklet::Worklet;

/// Something the control context should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Fade-out began.
    FeedOut,
    /// The track finished playing.
    Ended,
    /// The engine failed while generating; the session is over.
    Failed(String),
}

pub struct WgmController {
    config: RelayConfig,

    /// Channel to the generation context.
    worker_tx: Sender<ControlMessage>,

    /// Channel to the audio context.
    worklet_tx: Sender<ControlMessage>,

    /// Replies and events from both contexts.
    events_rx: Receiver<ControlMessage>,

    worker: Option<JoinHandle<()>>,

    /// Stop handle of the current session.
    session: Option<StopHandle>,
}

/// Spawn the generation context, load the engine module and build the
/// audio-context half.
///
/// A missing engine module or an invalid configuration is reported here,
/// before any session exists.
pub fn prepare(
    factory: Box<dyn EngineFactory>,
    config: RelayConfig,
) -> RelayResult<(WgmController, Worklet)> {
    config.validate()?;

    let (worker_tx, worker_rx) = mpsc::channel();
    let (worklet_tx, worklet_rx) = mpsc::channel();
    let (events_tx, events_rx) = mpsc::channel();

    let worklet = Worklet::new(worklet_rx, events_tx.clone());
    let worker = Worker::new(factory, worker_rx, events_tx).spawn()?;

    let mut controller = WgmController {
        config,
        worker_tx,
        worklet_tx,
        events_rx,
        worker: Some(worker),
        session: None,
    };

    controller.send_worker(ControlMessage::Compile)?;
    match controller.recv_callback()? {
        Callback::Compiled => {}
        Callback::CompileFailed { error } => return Err(error),
        other => {
            return Err(RelayError::Unavailable(format!(
                "unexpected reply to compile: {other:?}"
            )));
        }
    }

    debug!(
        "prepared: {} Hz, chunk {} frames, {} slots",
        config.sampling_rate, config.chunk_size, config.slot_count
    );
    Ok((controller, worklet))
}

impl WgmController {
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Create a session from a music-log file, replacing the current one.
    ///
    /// Returns the track metadata. [`RelayError::MalformedInput`] means the
    /// engine rejected the data; the caller may try the next item.
    pub fn create(&mut self, data: Vec<u8>, kind: SequenceKind) -> RelayResult<Gd3> {
        self.stop();
        self.discard_events();

        self.send_worker(ControlMessage::Create {
            data,
            kind,
            options: self.config,
        })?;

        match self.recv_callback()? {
            Callback::Created { meta, reader } => {
                self.session = Some(reader.stop_handle());
                self.send_worklet(ControlMessage::Attach { reader })?;
                Ok(meta)
            }
            Callback::Rejected => Err(RelayError::MalformedInput),
            Callback::Failed { error } => Err(error),
            other => Err(RelayError::Unavailable(format!(
                "unexpected reply to create: {other:?}"
            ))),
        }
    }

    /// Start buffering and playback of the current session.
    pub fn play(&mut self) -> RelayResult<()> {
        if self.session.is_none() {
            return Err(RelayError::NoSession);
        }
        self.send_worker(ControlMessage::Start)?;
        self.send_worklet(ControlMessage::Play)?;
        info!("playing");
        Ok(())
    }

    /// Stop the current session, if any.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
            let _ = self.worklet_tx.send(ControlMessage::Stop);
            debug!("session stopped");
        }
    }

    /// State of the current session.
    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(StopHandle::state)
    }

    /// Collect pending events from the generation and audio contexts.
    pub fn poll_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        loop {
            match self.events_rx.try_recv() {
                Ok(ControlMessage::FeedOut) => events.push(PlayerEvent::FeedOut),
                Ok(ControlMessage::Callback(Callback::Ended)) => {
                    // a halted session reports through `Halted` instead
                    if self.session.as_ref().is_some_and(StopHandle::is_faulted) {
                        debug!("session drained after engine failure");
                    } else {
                        events.push(PlayerEvent::Ended);
                    }
                }
                Ok(ControlMessage::Callback(Callback::Halted { error })) => {
                    events.push(PlayerEvent::Failed(error.to_string()))
                }
                Ok(ControlMessage::Retire { reader }) => drop(reader),
                Ok(other) => warn!("unexpected {} message", other.name()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    /// Drop events that belong to a session that no longer exists.
    fn discard_events(&mut self) {
        while let Ok(message) = self.events_rx.try_recv() {
            debug!("dropping stale {} message", message.name());
        }
    }

    /// Wait for the generation context's reply, skipping events of the
    /// previous session.
    fn recv_callback(&mut self) -> RelayResult<Callback> {
        loop {
            match self.events_rx.recv() {
                Ok(ControlMessage::Callback(Callback::Ended | Callback::Halted { .. }))
                | Ok(ControlMessage::FeedOut)
                | Ok(ControlMessage::Retire { .. }) => {}
                Ok(ControlMessage::Callback(callback)) => return Ok(callback),
                Ok(other) => warn!("unexpected {} message", other.name()),
                Err(_) => return Err(RelayError::Disconnected("generation")),
            }
        }
    }

    fn send_worker(&self, message: ControlMessage) -> RelayResult<()> {
        self.worker_tx
            .send(message)
            .map_err(|_| RelayError::Disconnected("generation"))
    }

    fn send_worklet(&self, message: ControlMessage) -> RelayResult<()> {
        self.worklet_tx
            .send(message)
            .map_err(|_| RelayError::Disconnected("audio"))
    }
}

impl Drop for WgmController {
    fn drop(&mut self) {
        self.stop();

        // Hang up on the worker so its receive loop ends, then join it.
        let (closed, _) = mpsc::channel();
        drop(std::mem::replace(&mut self.worker_tx, closed));
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("generation thread panicked");
            }
        }
    }
}
