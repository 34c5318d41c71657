// src/lib.rs
//
// Library entry point for Rust, FFI (iOS/native) and wasm consumers.

pub mod chunk;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod gd3;
pub mod generator;
pub mod player;
pub mod protocol;
pub mod relay;
pub mod worker;
pub mod worklet;

pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

#[cfg(test)]
mod test;

// Re-export key types for Rust consumers
pub use config::RelayConfig;
pub use controller::{PlayerEvent, WgmController, prepare};
pub use engine::{EngineFactory, SequenceKind, SynthEngine, load_engine};
pub use error::{ConfigError, EngineFault, RelayError, RelayResult};
pub use gd3::Gd3;
pub use generator::{Generator, RunOutcome};
pub use player::{NowPlaying, Player, PlayerState, PlaylistItem};
pub use relay::{ConsumeOutcome, RelayReader, RelayWriter, SessionState, StopHandle};
pub use worklet::Worklet;
