// Control messages exchanged between the control, generation and audio
// contexts.
//
// Messages are the ONLY way one context asks another to do something. Sample
// data never travels through them; it goes through the relay.

use crate::config::RelayConfig;
use crate::engine::SequenceKind;
use crate::error::RelayError;
use crate::gd3::Gd3;
use crate::relay::RelayReader;

/// A control message.
///
/// Which context handles which message:
/// - generation context: `Compile`, `Create`, `Start`
/// - audio context: `Attach`, `Play`, `Stop`
/// - control context: `Callback`, `FeedOut`, `Retire`
#[derive(Debug)]
pub enum ControlMessage {
    /// Load the synthesis engine module.
    Compile,

    /// Create a session from a music-log file.
    Create {
        data: Vec<u8>,
        kind: SequenceKind,
        options: RelayConfig,
    },

    /// Start the buffering loop of the current session.
    Start,

    /// Hand the reader of a freshly created session to the audio context.
    Attach { reader: RelayReader },

    /// Start delivering audio.
    Play,

    /// Stop the current session.
    Stop,

    /// Reply to the control context.
    Callback(Callback),

    /// The fade-out window has begun.
    FeedOut,

    /// A reader replaced by `Attach`, handed back so its slots are freed
    /// outside the audio context.
    Retire { reader: RelayReader },
}

/// Payload of a [`ControlMessage::Callback`].
#[derive(Debug)]
pub enum Callback {
    /// The engine module is ready.
    Compiled,

    /// The engine module could not be loaded.
    CompileFailed { error: RelayError },

    /// A session was created.
    Created { meta: Gd3, reader: RelayReader },

    /// The input was malformed; the engine handle has been released.
    Rejected,

    /// The session could not be created.
    Failed { error: RelayError },

    /// Generation stopped with an error; chunks already buffered still play.
    Halted { error: RelayError },

    /// Playback reached the end of the track.
    Ended,
}

impl ControlMessage {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ControlMessage::Compile => "compile",
            ControlMessage::Create { .. } => "create",
            ControlMessage::Start => "start",
            ControlMessage::Attach { .. } => "attach",
            ControlMessage::Play => "play",
            ControlMessage::Stop => "stop",
            ControlMessage::Callback(_) => "callback",
            ControlMessage::FeedOut => "feedout",
            ControlMessage::Retire { .. } => "retire",
        }
    }
}
