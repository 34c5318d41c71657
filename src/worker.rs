// src/worker.rs
//
// Background generation context.
//
// A dedicated thread that owns the engine factory and the current session's
// generator. It handles `compile`, `create` and `start`, and replies to the
// control context with `callback` messages. While a session is buffering the
// thread is inside `Generator::run` and only the status word (stop sentinel)
// can interrupt it.

use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::engine::{EngineFactory, SequenceKind, load_engine};
use crate::error::{RelayError, RelayResult};
use crate::gd3::Gd3;
use crate::generator::{Generator, RunOutcome};
use crate::protocol::{Callback, ControlMessage};
use crate::relay::{self, RelayReader};

pub struct Worker {
    factory: Box<dyn EngineFactory>,

    /// Messages from the control context.
    commands: Receiver<ControlMessage>,

    /// Replies to the control context.
    events: Sender<ControlMessage>,

    compiled: bool,

    /// Current session. Replaced (and its engine released) on `create`.
    generator: Option<Generator>,
}

impl Worker {
    pub fn new(
        factory: Box<dyn EngineFactory>,
        commands: Receiver<ControlMessage>,
        events: Sender<ControlMessage>,
    ) -> Self {
        Self {
            factory,
            commands,
            events,
            compiled: false,
            generator: None,
        }
    }

    /// Run the worker on its own thread.
    pub fn spawn(self) -> RelayResult<JoinHandle<()>> {
        thread::Builder::new()
            .name("wgm-worker".into())
            .spawn(move || {
                let mut worker = self;
                worker.run();
            })
            .map_err(|e| RelayError::Unavailable(format!("cannot spawn generation thread: {e}")))
    }

    /// Handle messages until the control context hangs up.
    pub fn run(&mut self) {
        debug!("generation context started");
        while let Ok(message) = self.commands.recv() {
            self.handle(message);
        }
        debug!("generation context finished (channel disconnected)");
    }

    fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Compile => self.compile(),
            ControlMessage::Create {
                data,
                kind,
                options,
            } => self.create(&data, kind, &options),
            ControlMessage::Start => self.start(),
            other => warn!("generation context ignored {} message", other.name()),
        }
    }

    fn compile(&mut self) {
        match self.factory.compile() {
            Ok(()) => {
                self.compiled = true;
                debug!("engine module compiled");
                self.reply(Callback::Compiled);
            }
            Err(error) => {
                error!("engine module unavailable: {error}");
                self.reply(Callback::CompileFailed { error });
            }
        }
    }

    fn create(&mut self, data: &[u8], kind: SequenceKind, options: &RelayConfig) {
        // release the previous session's engine and slots first
        self.generator = None;

        if !self.compiled {
            self.reply(Callback::Failed {
                error: RelayError::Unavailable("engine module not compiled".into()),
            });
            return;
        }

        match self.open_session(data, kind, options) {
            Ok((generator, reader, meta)) => {
                info!(
                    "session created: {} ({} chunk(s) buffered)",
                    meta.game_track_name(),
                    generator.step()
                );
                self.generator = Some(generator);
                self.reply(Callback::Created { meta, reader });
            }
            Err(RelayError::MalformedInput) => self.reply(Callback::Rejected),
            Err(error) => {
                error!("session creation failed: {error}");
                self.reply(Callback::Failed { error });
            }
        }
    }

    /// Load the engine, allocate the relay and fill the ring.
    ///
    /// The engine is initialised before any slot is allocated, so rejected
    /// input never allocates a ring.
    fn open_session(
        &self,
        data: &[u8],
        kind: SequenceKind,
        options: &RelayConfig,
    ) -> RelayResult<(Generator, RelayReader, Gd3)> {
        options.validate()?;
        let engine = load_engine(self.factory.as_ref(), kind, data, options)?;

        let meta = Gd3::from_json(&engine.seq_gd3()).unwrap_or_else(|e| {
            warn!("unreadable track metadata: {e}");
            Gd3::default()
        });

        let (writer, reader) = relay::create(options)?;
        let mut generator = Generator::new(engine, writer);
        generator.fill()?;
        Ok((generator, reader, meta))
    }

    fn start(&mut self) {
        let Some(generator) = self.generator.as_mut() else {
            self.reply(Callback::Halted {
                error: RelayError::NoSession,
            });
            return;
        };

        match generator.run() {
            Ok(RunOutcome::Ended) => debug!("buffering finished at step {}", generator.step()),
            Ok(RunOutcome::Cancelled) => debug!("buffering stopped at step {}", generator.step()),
            Err(error) => self.reply(Callback::Halted { error }),
        }
    }

    fn reply(&self, callback: Callback) {
        if self.events.send(ControlMessage::Callback(callback)).is_err() {
            debug!("control context gone; dropping reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::SessionState;
    use crate::test::{FAULT, ScriptedFactory, scripted_track};
    use std::sync::mpsc;

    struct Harness {
        commands: Sender<ControlMessage>,
        events: Receiver<ControlMessage>,
        handle: JoinHandle<()>,
    }

    fn spawn(factory: ScriptedFactory) -> Harness {
        let (commands, commands_rx) = mpsc::channel();
        let (events_tx, events) = mpsc::channel();
        let handle = Worker::new(Box::new(factory), commands_rx, events_tx)
            .spawn()
            .unwrap();
        Harness {
            commands,
            events,
            handle,
        }
    }

    fn config() -> RelayConfig {
        RelayConfig::default()
            .with_chunk_size(256)
            .with_feed_out_remain(2)
    }

    fn create(harness: &Harness, data: Vec<u8>) -> Callback {
        harness
            .commands
            .send(ControlMessage::Create {
                data,
                kind: SequenceKind::Vgm,
                options: config(),
            })
            .unwrap();
        match harness.events.recv().unwrap() {
            ControlMessage::Callback(callback) => callback,
            other => panic!("unexpected {}", other.name()),
        }
    }

    fn compile(harness: &Harness) {
        harness.commands.send(ControlMessage::Compile).unwrap();
        assert!(matches!(
            harness.events.recv().unwrap(),
            ControlMessage::Callback(Callback::Compiled)
        ));
    }

    #[test]
    fn test_compile_failure_is_reported() {
        let harness = spawn(ScriptedFactory::failing_compile());
        harness.commands.send(ControlMessage::Compile).unwrap();
        assert!(matches!(
            harness.events.recv().unwrap(),
            ControlMessage::Callback(Callback::CompileFailed {
                error: RelayError::Unavailable(_)
            })
        ));
    }

    #[test]
    fn test_create_before_compile_fails() {
        let harness = spawn(ScriptedFactory::new());
        let callback = create(&harness, scripted_track(&[0]));
        assert!(matches!(
            callback,
            Callback::Failed {
                error: RelayError::Unavailable(_)
            }
        ));
    }

    #[test]
    fn test_create_buffers_ring_and_replies_with_metadata() {
        let harness = spawn(ScriptedFactory::new());
        compile(&harness);
        match create(&harness, scripted_track(&[0])) {
            Callback::Created { meta, reader } => {
                assert_eq!(meta.track_name, "Scripted");
                assert_eq!(reader.status().produced(), 2);
                assert_eq!(reader.status().state(), SessionState::Buffering);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_input_releases_engine() {
        let factory = ScriptedFactory::new();
        let harness = spawn(factory.clone());
        compile(&harness);
        assert!(matches!(create(&harness, b"not a track".to_vec()), Callback::Rejected));
        assert_eq!(factory.constructed(), 1);
        assert_eq!(factory.freed(), 1);
    }

    #[test]
    fn test_create_releases_previous_engine() {
        let factory = ScriptedFactory::new();
        let harness = spawn(factory.clone());
        compile(&harness);
        let first = create(&harness, scripted_track(&[0]));
        assert!(matches!(first, Callback::Created { .. }));
        let second = create(&harness, scripted_track(&[0]));
        assert!(matches!(second, Callback::Created { .. }));
        assert_eq!(factory.constructed(), 2);
        assert_eq!(factory.freed(), 1);
    }

    #[test]
    fn test_fault_while_buffering_fails_session() {
        let harness = spawn(ScriptedFactory::new());
        compile(&harness);
        match create(&harness, scripted_track(&[FAULT])) {
            Callback::Failed {
                error: RelayError::EngineFailure(_),
            } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_start_without_session() {
        let harness = spawn(ScriptedFactory::new());
        harness.commands.send(ControlMessage::Start).unwrap();
        assert!(matches!(
            harness.events.recv().unwrap(),
            ControlMessage::Callback(Callback::Halted {
                error: RelayError::NoSession
            })
        ));
    }

    #[test]
    fn test_stop_mid_buffering_exits_run() {
        let harness = spawn(ScriptedFactory::new());
        compile(&harness);
        let Callback::Created { reader, .. } = create(&harness, scripted_track(&[0])) else {
            panic!("session not created");
        };
        harness.commands.send(ControlMessage::Start).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        // ring full, nobody consuming: the worker is parked in `run`
        reader.stop();
        // a parked worker would never answer this
        let callback = create(&harness, scripted_track(&[0]));
        assert!(matches!(callback, Callback::Created { .. }));
        assert_eq!(reader.status().produced(), 2);

        drop(harness.commands);
        harness.handle.join().unwrap();
    }
}
