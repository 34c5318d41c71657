// src/test.rs
//
// Scripted engine shared by unit tests.
//
// Input format: b"SCRP" followed by little-endian u32 loop counts, one per
// `play()` call. `FAULT` in the script makes that call fail. When the
// script runs out the last loop count repeats. Every output frame of step
// `n` (1-based) holds the value `n as f32`, so consumers can check which
// chunk they are reading and that it is not torn.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::{EngineFactory, SequenceKind, SynthEngine};
use crate::error::{EngineFault, RelayResult};

pub const MAGIC: &[u8; 4] = b"SCRP";
pub const FAULT: u32 = u32::MAX;

/// Build scripted input from a loop-count sequence.
pub fn scripted_track(loops: &[u32]) -> Vec<u8> {
    let mut data = MAGIC.to_vec();
    for &count in loops {
        data.extend_from_slice(&count.to_le_bytes());
    }
    data
}

pub struct ScriptedEngine {
    input: Vec<u8>,
    script: Vec<u32>,
    step: usize,
    left: Vec<f32>,
    right: Vec<f32>,
    freed: Arc<AtomicUsize>,
}

impl SynthEngine for ScriptedEngine {
    fn seq_data_mut(&mut self) -> &mut [u8] {
        &mut self.input
    }

    fn init(&mut self) -> bool {
        if self.input.len() < 8 || &self.input[..4] != MAGIC || (self.input.len() - 4) % 4 != 0 {
            return false;
        }
        self.script = self.input[4..]
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        true
    }

    fn play(&mut self) -> Result<usize, EngineFault> {
        let index = self.step.min(self.script.len() - 1);
        let loops = self.script[index];
        self.step += 1;
        if loops == FAULT {
            return Err(EngineFault::new(format!("scripted fault at step {}", self.step)));
        }
        let value = self.step as f32;
        self.left.fill(value);
        self.right.fill(value);
        Ok(loops as usize)
    }

    fn sampling_l(&self) -> &[f32] {
        &self.left
    }

    fn sampling_r(&self) -> &[f32] {
        &self.right
    }

    fn seq_gd3(&self) -> String {
        r#"{"track_name":"Scripted","game_name":"Test Suite","track_author":"wgmplay"}"#.to_string()
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory counting constructed and released engines.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    constructed: Arc<AtomicUsize>,
    freed: Arc<AtomicUsize>,
    fail_compile: bool,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_compile() -> Self {
        Self {
            fail_compile: true,
            ..Self::default()
        }
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }
}

impl EngineFactory for ScriptedFactory {
    fn compile(&mut self) -> RelayResult<()> {
        if self.fail_compile {
            return Err(crate::error::RelayError::Unavailable(
                "scripted engine module missing".into(),
            ));
        }
        Ok(())
    }

    fn construct(
        &self,
        _kind: SequenceKind,
        _sampling_rate: u32,
        chunk_size: usize,
        input_len: usize,
    ) -> RelayResult<Box<dyn SynthEngine>> {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            input: vec![0; input_len],
            script: Vec::new(),
            step: 0,
            left: vec![0.0; chunk_size],
            right: vec![0.0; chunk_size],
            freed: Arc::clone(&self.freed),
        }))
    }
}

