//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! A browser audio callback may not block, so the web player runs in
//! single-context pull mode: the host calls [`WebPlayer::fill`] whenever it
//! has time (e.g. after each `process`), and [`WebPlayer::process`] once per
//! render quantum.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { wgm_init, WebPlayer, WebEvent } from './wgmplay.js';
//!
//! await init();
//! wgm_init();
//!
//! // `chipModule.construct(kind, samplingRate, chunkSize, inputLen)` returns
//! // an engine object with setSeqData/init/play/getSamplingL/getSamplingR/
//! // getSeqGd3/free.
//! const player = new WebPlayer(chipModule, location.hash, null);
//! const gd3 = JSON.parse(player.create("01 title.vgm", bytes));
//! player.fill();
//!
//! // AudioWorkletProcessor.process
//! const event = player.process(outputs[0][0], outputs[0][1]);
//! if (event === WebEvent.Ended) playNext();
//! player.fill();
//! ```

use wasm_bindgen::prelude::*;

use crate::config::RelayConfig;
use crate::engine::{EngineFactory, SequenceKind, SynthEngine, load_engine};
use crate::error::{EngineFault, RelayError, RelayResult};
use crate::gd3::Gd3;
use crate::generator::Generator;
use crate::relay::{self, ConsumeOutcome, RelayReader, SessionState};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn wgm_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// JS-hosted Engine
// ═══════════════════════════════════════════════════════════════════════════

#[wasm_bindgen]
extern "C" {
    /// The compiled synthesis module.
    pub type ChipModule;

    #[wasm_bindgen(method)]
    fn construct(
        this: &ChipModule,
        kind: u32,
        sampling_rate: u32,
        chunk_size: u32,
        input_len: u32,
    ) -> Option<ChipEngine>;

    /// One engine instance.
    pub type ChipEngine;

    #[wasm_bindgen(method, js_name = setSeqData)]
    fn set_seq_data(this: &ChipEngine, data: &[u8]);

    #[wasm_bindgen(method)]
    fn init(this: &ChipEngine) -> bool;

    #[wasm_bindgen(method, catch)]
    fn play(this: &ChipEngine) -> Result<i32, JsValue>;

    #[wasm_bindgen(method, js_name = getSamplingL)]
    fn get_sampling_l(this: &ChipEngine, out: &mut [f32]);

    #[wasm_bindgen(method, js_name = getSamplingR)]
    fn get_sampling_r(this: &ChipEngine, out: &mut [f32]);

    #[wasm_bindgen(method, js_name = getSeqGd3)]
    fn get_seq_gd3(this: &ChipEngine) -> String;

    #[wasm_bindgen(method)]
    fn free(this: &ChipEngine);
}

struct JsEngine {
    engine: ChipEngine,
    input: Vec<u8>,
    left: Vec<f32>,
    right: Vec<f32>,
}

// SAFETY: the web player is single-context; JS objects never leave the
// thread they were created on.
unsafe impl Send for JsEngine {}

impl SynthEngine for JsEngine {
    fn seq_data_mut(&mut self) -> &mut [u8] {
        &mut self.input
    }

    fn init(&mut self) -> bool {
        self.engine.set_seq_data(&self.input);
        self.engine.init()
    }

    fn play(&mut self) -> Result<usize, EngineFault> {
        let loops = self.engine.play().map_err(|e| {
            EngineFault::new(e.as_string().unwrap_or_else(|| format!("{e:?}")))
        })?;
        let loops = usize::try_from(loops)
            .map_err(|_| EngineFault::new(format!("play returned {loops}")))?;
        self.engine.get_sampling_l(&mut self.left);
        self.engine.get_sampling_r(&mut self.right);
        Ok(loops)
    }

    fn sampling_l(&self) -> &[f32] {
        &self.left
    }

    fn sampling_r(&self) -> &[f32] {
        &self.right
    }

    fn seq_gd3(&self) -> String {
        self.engine.get_seq_gd3()
    }
}

impl Drop for JsEngine {
    fn drop(&mut self) {
        self.engine.free();
    }
}

struct JsFactory {
    module: ChipModule,
}

// SAFETY: see `JsEngine`.
unsafe impl Send for JsFactory {}

impl EngineFactory for JsFactory {
    fn construct(
        &self,
        kind: SequenceKind,
        sampling_rate: u32,
        chunk_size: usize,
        input_len: usize,
    ) -> RelayResult<Box<dyn SynthEngine>> {
        let kind_id = match kind {
            SequenceKind::Vgm => 0,
            SequenceKind::Xgm => 1,
        };
        let engine = self
            .module
            .construct(kind_id, sampling_rate, chunk_size as u32, input_len as u32)
            .ok_or_else(|| RelayError::Unavailable("engine construct failed".into()))?;
        Ok(Box::new(JsEngine {
            engine,
            input: vec![0; input_len],
            left: vec![0.0; chunk_size],
            right: vec![0.0; chunk_size],
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Web Player
// ═══════════════════════════════════════════════════════════════════════════

/// What a call to [`WebPlayer::process`] produced.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebEvent {
    None = 0,
    FeedOut = 1,
    Ended = 2,
    Underrun = 3,
    Stopped = 4,
}

impl From<ConsumeOutcome> for WebEvent {
    fn from(outcome: ConsumeOutcome) -> Self {
        match outcome {
            ConsumeOutcome::Played => Self::None,
            ConsumeOutcome::FeedOutStarted => Self::FeedOut,
            ConsumeOutcome::Ended => Self::Ended,
            ConsumeOutcome::Underrun => Self::Underrun,
            ConsumeOutcome::Stopped => Self::Stopped,
        }
    }
}

/// Single-context player for the browser.
#[wasm_bindgen]
pub struct WebPlayer {
    factory: JsFactory,
    config: RelayConfig,
    session: Option<(Generator, RelayReader)>,
    meta: Gd3,
}

fn js_error(e: RelayError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
impl WebPlayer {
    /// Create a player.
    ///
    /// `hash` is the page location hash (`#s=48000` selects the sampling
    /// rate); `options_json` optionally overrides relay options using the
    /// `create` option names (`chunkSize`, `loopMaxCount`, ...).
    #[wasm_bindgen(constructor)]
    pub fn new(
        module: ChipModule,
        hash: Option<String>,
        options_json: Option<String>,
    ) -> Result<WebPlayer, JsValue> {
        let mut config = match options_json {
            Some(json) => serde_json::from_str::<RelayConfig>(&json)
                .map_err(|e| JsValue::from_str(&format!("invalid options: {e}")))?,
            None => RelayConfig::default(),
        };
        if let Some(hash) = hash {
            config = config.with_sampling_rate_override(&hash);
        }
        config.validate().map_err(|e| js_error(e.into()))?;

        Ok(WebPlayer {
            factory: JsFactory { module },
            config,
            session: None,
            meta: Gd3::default(),
        })
    }

    pub fn sampling_rate(&self) -> u32 {
        self.config.sampling_rate
    }

    pub fn quantum(&self) -> u32 {
        self.config.quantum as u32
    }

    /// Create a session from a music-log file. Returns the GD3 metadata as
    /// JSON. Fails with "malformed input" when the engine rejects the data.
    pub fn create(&mut self, name: &str, data: &[u8]) -> Result<String, JsValue> {
        self.stop();
        self.session = None;

        let kind = SequenceKind::from_file_name(name);
        let engine = load_engine(&self.factory, kind, data, &self.config).map_err(js_error)?;
        self.meta = Gd3::from_json(&engine.seq_gd3()).unwrap_or_default();

        let (writer, reader) = relay::create(&self.config).map_err(js_error)?;
        self.session = Some((Generator::new(engine, writer), reader));
        log::info!("{}: {}", name, self.meta.game_track_name());
        Ok(self.meta.to_json())
    }

    /// Generate into every free slot. Returns the number of chunks produced.
    ///
    /// An engine failure is returned as an error (show it as an alert);
    /// chunks already produced still play out.
    pub fn fill(&mut self) -> Result<u32, JsValue> {
        let Some((generator, _)) = self.session.as_mut() else {
            return Ok(0);
        };
        generator
            .fill()
            .map(|n| n as u32)
            .map_err(js_error)
    }

    /// Render one quantum.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> WebEvent {
        match self.session.as_mut() {
            Some((_, reader)) => reader.consume_step(left, right).into(),
            None => {
                left.fill(0.0);
                right.fill(0.0);
                WebEvent::Stopped
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some((_, reader)) = &self.session {
            reader.stop();
        }
    }

    /// GD3 metadata of the current track as JSON.
    pub fn gd3_json(&self) -> String {
        self.meta.to_json()
    }

    /// "game | track" display line.
    pub fn title(&self) -> String {
        self.meta.game_track_name()
    }

    /// Session state: 0 idle, 1 buffering, 2 playing, 3 feed-out, 4 stopped.
    pub fn state(&self) -> u8 {
        state_code(self.session.as_ref().map(|(_, reader)| reader))
    }
}

/// A player with no session yet reports `idle`.
fn state_code(reader: Option<&RelayReader>) -> u8 {
    reader.map_or(SessionState::Idle, |reader| reader.status().state()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_code_without_session_is_idle() {
        assert_eq!(state_code(None), 0);

        let (_writer, reader) = relay::create(&RelayConfig::default()).unwrap();
        assert_eq!(state_code(Some(&reader)), SessionState::Idle as u8);
        reader.stop();
        assert_eq!(state_code(Some(&reader)), 4);
    }
}
