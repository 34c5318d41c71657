// src/engine.rs
//
// The synthesis engine seam.
//
// Chip emulation and command interpretation live in a separately compiled
// module. This crate only sees the capability set it exports: construct,
// a writable input buffer, init, play, the latest output chunk, GD3
// metadata and free (`Drop`).

use std::path::Path;

use log::{debug, warn};

use crate::config::RelayConfig;
use crate::error::{EngineFault, RelayError, RelayResult};

/// Music-log container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceKind {
    #[default]
    Vgm,
    Xgm,
}

impl SequenceKind {
    /// Guess the kind from a file name: `.xgm`/`.xgz` is XGM, anything else VGM.
    pub fn from_file_name(name: impl AsRef<Path>) -> Self {
        let is_xgm = name
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xgm") || ext.eq_ignore_ascii_case("xgz"))
            .unwrap_or(false);
        if is_xgm { Self::Xgm } else { Self::Vgm }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vgm => "vgm",
            Self::Xgm => "xgm",
        }
    }
}

/// A constructed engine instance (one per session).
///
/// Dropping the instance releases it.
pub trait SynthEngine: Send {
    /// Buffer the raw input bytes must be written into before `init`.
    fn seq_data_mut(&mut self) -> &mut [u8];

    /// Parse the written input. `false` means the input is malformed.
    fn init(&mut self) -> bool;

    /// Render one chunk. Returns the loop count observed so far.
    fn play(&mut self) -> Result<usize, EngineFault>;

    /// Left channel of the most recent chunk.
    fn sampling_l(&self) -> &[f32];

    /// Right channel of the most recent chunk.
    fn sampling_r(&self) -> &[f32];

    /// Serialized GD3 metadata (JSON).
    fn seq_gd3(&self) -> String;
}

/// Constructs engine instances.
pub trait EngineFactory: Send {
    /// Load/compile the engine module. Called once when the generation
    /// context is prepared.
    fn compile(&mut self) -> RelayResult<()> {
        Ok(())
    }

    fn construct(
        &self,
        kind: SequenceKind,
        sampling_rate: u32,
        chunk_size: usize,
        input_len: usize,
    ) -> RelayResult<Box<dyn SynthEngine>>;
}

/// Construct an engine, hand it `data` and run `init`.
///
/// On a failed `init` the engine is released before returning
/// [`RelayError::MalformedInput`].
pub fn load_engine(
    factory: &dyn EngineFactory,
    kind: SequenceKind,
    data: &[u8],
    config: &RelayConfig,
) -> RelayResult<Box<dyn SynthEngine>> {
    let mut engine = factory.construct(kind, config.sampling_rate, config.chunk_size, data.len())?;

    let input = engine.seq_data_mut();
    if input.len() != data.len() {
        return Err(RelayError::Unavailable(format!(
            "engine input buffer is {} bytes, expected {}",
            input.len(),
            data.len()
        )));
    }
    input.copy_from_slice(data);

    if !engine.init() {
        warn!("{} input rejected by engine ({} bytes)", kind.as_str(), data.len());
        drop(engine);
        return Err(RelayError::MalformedInput);
    }

    debug!("{} engine initialised ({} bytes)", kind.as_str(), data.len());
    Ok(engine)
}
