// src/generator.rs
//
// Generation-context side of a session.
//
// Drives the synthesis engine one chunk at a time into the relay and decides,
// from the engine's loop count, when fade-out begins and where the track ends.
// This runs on a background thread (or, in pull mode, from `fill`) and is NOT
// real-time safe: engine calls have unbounded latency.

use log::{debug, error};

use crate::engine::SynthEngine;
use crate::error::{EngineFault, RelayResult};
use crate::relay::{RelayWriter, SlotWait};

/// How a generation run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The end-of-track marker was armed; nothing more to produce.
    Ended,
    /// The session was stopped.
    Cancelled,
}

pub struct Generator {
    engine: Box<dyn SynthEngine>,
    writer: RelayWriter,

    loop_max_count: usize,
    feed_out_remain: usize,

    /// Steps generated since fade-out was armed.
    feed_out_count: usize,

    /// Steps generated (1-based step of the last chunk).
    step: u64,

    last_slot: Option<usize>,
    halted: bool,
}

impl Generator {
    pub fn new(engine: Box<dyn SynthEngine>, writer: RelayWriter) -> Self {
        let config = *writer.config();
        Self {
            engine,
            writer,
            loop_max_count: config.loop_max_count,
            feed_out_remain: config.feed_out_remain,
            feed_out_count: 0,
            step: 0,
            last_slot: None,
            halted: false,
        }
    }

    #[inline]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Whether production is over (end marker armed or engine failed).
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn engine(&self) -> &dyn SynthEngine {
        self.engine.as_ref()
    }

    pub fn writer(&self) -> &RelayWriter {
        &self.writer
    }

    /// Render one chunk into `slot`, advance the step counter and arm the
    /// fade-out / end markers from the reported loop count.
    ///
    /// An engine failure halts the session: markers are set so the already
    /// published chunks play out and no further chunk is produced.
    pub fn generate_step(&mut self, slot: usize) -> Result<(), EngineFault> {
        if self.halted {
            return Ok(());
        }

        let loops = match self.engine.play() {
            Ok(loops) => loops,
            Err(fault) => {
                error!("engine failed at step {}: {}", self.step + 1, fault);
                self.halted = true;
                self.writer.halt();
                return Err(fault);
            }
        };

        // Markers go out before the chunk is published so the reader sees
        // them no later than the chunk itself.
        let step = self.step + 1;
        self.track_loops(loops, step);

        let published = self
            .writer
            .write(slot, self.engine.sampling_l(), self.engine.sampling_r());
        debug_assert_eq!(published, step);

        self.step = step;
        self.last_slot = Some(slot);
        Ok(())
    }

    fn track_loops(&mut self, loops: usize, step: u64) {
        if loops < self.loop_max_count {
            return;
        }

        if self.feed_out_count == 0 && loops > self.loop_max_count {
            // the track does not loop
            debug!("track ended without looping at step {}", step);
            self.end_at(step);
            return;
        }

        if self.feed_out_count == 0 {
            debug!("feed-out armed at step {}", step);
            self.writer.arm_feed_out(step);
        }
        if self.feed_out_count >= self.feed_out_remain {
            debug!("feed-out complete at step {}", step);
            self.end_at(step);
        }
        self.feed_out_count += 1;
    }

    fn end_at(&mut self, step: u64) {
        self.halted = true;
        self.writer.arm_end(step);
    }

    /// Block until the slot after the last written one is free, or the
    /// session is cancelled.
    pub fn wait_for_next_slot(&self) -> SlotWait {
        self.writer.wait_for_next_slot(self.last_slot)
    }

    /// Buffering loop: wait for a free slot, fill it, repeat until the end
    /// marker is armed or the session is stopped.
    ///
    /// Blocks; must not run on the audio thread.
    pub fn run(&mut self) -> RelayResult<RunOutcome> {
        loop {
            if self.halted {
                return Ok(RunOutcome::Ended);
            }
            match self.wait_for_next_slot() {
                SlotWait::Cancelled => {
                    debug!("generation cancelled after {} steps", self.step);
                    return Ok(RunOutcome::Cancelled);
                }
                SlotWait::Ready(slot) => self.generate_step(slot)?,
            }
        }
    }

    /// Fill every currently free slot without waiting. Returns the number
    /// of chunks generated.
    pub fn fill(&mut self) -> RelayResult<usize> {
        let mut generated = 0;
        while !self.halted {
            let Some(slot) = self.writer.try_next_slot() else {
                break;
            };
            self.generate_step(slot)?;
            generated += 1;
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::engine::{SequenceKind, load_engine};
    use crate::error::RelayError;
    use crate::relay::{self, ConsumeOutcome, RelayReader, SessionState};
    use crate::test::{FAULT, ScriptedFactory, scripted_track};

    fn session(loops: &[u32], config: RelayConfig) -> (Generator, RelayReader) {
        let factory = ScriptedFactory::new();
        let engine =
            load_engine(&factory, SequenceKind::Vgm, &scripted_track(loops), &config).unwrap();
        let (writer, reader) = relay::create(&config).unwrap();
        (Generator::new(engine, writer), reader)
    }

    fn drain_chunk(reader: &mut RelayReader) -> ConsumeOutcome {
        let quantum = reader.config().quantum;
        let mut l = vec![0.0; quantum];
        let mut r = vec![0.0; quantum];
        let mut outcome = ConsumeOutcome::Played;
        for _ in 0..reader.config().quanta_per_chunk() {
            match reader.consume_step(&mut l, &mut r) {
                ConsumeOutcome::Played => {}
                other => outcome = other,
            }
        }
        outcome
    }

    #[test]
    fn test_scenario_loop_sequence_feed_out_then_stop() {
        let config = RelayConfig::default()
            .with_chunk_size(768)
            .with_loop_max_count(2)
            .with_feed_out_remain(2);
        let (mut generator, mut reader) = session(&[0, 0, 1, 1, 2, 2, 3], config);

        let mut outcomes = Vec::new();
        while !generator.is_halted() {
            generator.fill().unwrap();
            outcomes.push(drain_chunk(&mut reader));
        }
        while reader.status().state() != SessionState::Stopped {
            outcomes.push(drain_chunk(&mut reader));
        }

        let status = reader.status();
        // first step reporting loop == 2 is step 5
        assert_eq!(status.feed_out_step(), Some(5));
        assert_eq!(status.end_step(), Some(7));
        assert!(status.end_step().unwrap() - status.feed_out_step().unwrap() <= 2);
        assert_eq!(generator.step(), 7);

        assert_eq!(outcomes[4], ConsumeOutcome::FeedOutStarted);
        assert_eq!(outcomes.last(), Some(&ConsumeOutcome::Ended));
        assert_eq!(outcomes.len(), 7);
    }

    #[test]
    fn test_non_looping_track_ends_immediately() {
        let config = RelayConfig::default().with_chunk_size(256).with_loop_max_count(2);
        let (mut generator, mut reader) = session(&[0, 0, 3], config);
        assert_eq!(generator.fill().unwrap(), 2);
        assert!(!generator.is_halted());
        drain_chunk(&mut reader);
        assert_eq!(generator.fill().unwrap(), 1);

        let status = reader.status();
        assert!(generator.is_halted());
        assert_eq!(status.feed_out_step(), None);
        assert_eq!(status.end_step(), Some(3));
    }

    #[test]
    fn test_engine_fault_halts_session() {
        let config = RelayConfig::default().with_chunk_size(256);
        let (mut generator, reader) = session(&[0, FAULT], config);
        let result = generator.fill();
        assert!(matches!(result, Err(RelayError::EngineFailure(_))));
        assert!(generator.is_halted());
        assert!(reader.status().is_faulted());
        assert_eq!(reader.status().end_step(), Some(1));
        assert_eq!(generator.fill().unwrap(), 0);
    }

    #[test]
    fn test_fault_on_first_step_stops_session() {
        let config = RelayConfig::default().with_chunk_size(256);
        let (mut generator, reader) = session(&[FAULT], config);
        assert!(generator.generate_step(0).is_err());
        assert_eq!(reader.status().state(), SessionState::Stopped);
    }

    #[test]
    fn test_run_exits_on_stop() {
        let config = RelayConfig::default().with_chunk_size(256);
        let (mut generator, reader) = session(&[0], config);
        let stop = reader.stop_handle();

        let handle = std::thread::spawn(move || generator.run());
        std::thread::sleep(std::time::Duration::from_millis(20));
        // ring is full and nobody consumes: the loop is parked
        assert_eq!(reader.status().produced(), 2);
        stop.stop();
        assert_eq!(handle.join().unwrap().unwrap(), RunOutcome::Cancelled);
        assert_eq!(reader.status().produced(), 2);
    }
}
