// src/main.rs
//
// Demo player: a built-in tone engine stands in for the chip emulator, and
// the main thread plays the part of the audio callback.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info, warn};

use wgmplay::{
    EngineFactory, EngineFault, Player, PlayerState, PlaylistItem, RelayConfig, RelayResult,
    SequenceKind, SynthEngine, prepare,
};

/// ===============================
/// Demo Engine
/// ===============================

const DEMO_MAGIC: &[u8; 4] = b"DEMO";

/// Loop count reported once a non-looping track has finished.
const END_OF_TRACK: usize = usize::MAX;

/// Input: `DEMO`, then little-endian u32 intro chunks, loop length in
/// chunks (0 = no loop) and tone frequency in Hz.
fn demo_track(intro: u32, loop_len: u32, frequency: u32) -> Vec<u8> {
    let mut data = DEMO_MAGIC.to_vec();
    for value in [intro, loop_len, frequency] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

struct ToneEngine {
    input: Vec<u8>,
    sampling_rate: f32,
    intro: usize,
    loop_len: usize,
    frequency: f32,
    phase: f32,
    step: usize,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl SynthEngine for ToneEngine {
    fn seq_data_mut(&mut self) -> &mut [u8] {
        &mut self.input
    }

    fn init(&mut self) -> bool {
        let Some(fields) = self.input.strip_prefix(DEMO_MAGIC) else {
            return false;
        };
        let values: Vec<u32> = fields
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let [intro, loop_len, frequency] = values[..] else {
            return false;
        };
        if frequency == 0 {
            return false;
        }
        self.intro = intro as usize;
        self.loop_len = loop_len as usize;
        self.frequency = frequency as f32;
        true
    }

    fn play(&mut self) -> Result<usize, EngineFault> {
        let increment = self.frequency / self.sampling_rate;
        for (l, r) in self.left.iter_mut().zip(self.right.iter_mut()) {
            let value = (self.phase * std::f32::consts::TAU).sin() * 0.25;
            *l = value;
            *r = value;
            self.phase = (self.phase + increment).fract();
        }
        self.step += 1;

        let past_intro = self.step.saturating_sub(self.intro);
        let loops = match self.loop_len {
            0 if past_intro > 0 => END_OF_TRACK,
            0 => 0,
            len => past_intro / len,
        };
        Ok(loops)
    }

    fn sampling_l(&self) -> &[f32] {
        &self.left
    }

    fn sampling_r(&self) -> &[f32] {
        &self.right
    }

    fn seq_gd3(&self) -> String {
        format!(
            r#"{{"track_name":"{} Hz tone","game_name":"wgmplay demo","track_author":"wgmplay"}}"#,
            self.frequency
        )
    }
}

struct ToneFactory;

impl EngineFactory for ToneFactory {
    fn construct(
        &self,
        _kind: SequenceKind,
        sampling_rate: u32,
        chunk_size: usize,
        input_len: usize,
    ) -> RelayResult<Box<dyn SynthEngine>> {
        Ok(Box::new(ToneEngine {
            input: vec![0; input_len],
            sampling_rate: sampling_rate as f32,
            intro: 0,
            loop_len: 0,
            frequency: 0.0,
            phase: 0.0,
            step: 0,
            left: vec![0.0; chunk_size],
            right: vec![0.0; chunk_size],
        }))
    }
}

/// ===============================
/// CLI
/// ===============================

#[derive(Parser)]
#[command(name = "wgmplay")]
#[command(about = "Play a list of music-log files through the buffer relay")]
struct Cli {
    /// Files to queue instead of the built-in demo tracks
    files: Vec<PathBuf>,

    /// Sampling-rate override, e.g. "#s=48000"
    #[arg(long)]
    rate: Option<String>,

    /// Frames per engine chunk
    #[arg(long, default_value_t = wgmplay::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Loop count at which fade-out starts
    #[arg(long, default_value_t = wgmplay::config::DEFAULT_LOOP_MAX_COUNT)]
    loop_max_count: usize,

    /// Fade-out length in seconds
    #[arg(long, default_value_t = wgmplay::config::DEFAULT_FEED_OUT_SECONDS)]
    feed_out_seconds: u32,

    /// Pace the simulated audio callback in real time
    #[arg(long)]
    realtime: bool,
}

fn playlist(files: &[PathBuf]) -> Vec<PlaylistItem> {
    if files.is_empty() {
        return vec![
            PlaylistItem::new("01 title.vgm", demo_track(4, 8, 440)),
            PlaylistItem::new("02 corrupt.vgm", b"VGM \0\0\0\0".to_vec()),
            PlaylistItem::new("03 stage.xgm", demo_track(2, 6, 330)),
            PlaylistItem::new("04 jingle.vgm", demo_track(12, 0, 660)),
        ];
    }

    files
        .iter()
        .filter_map(|path| match std::fs::read(path) {
            Ok(data) => {
                let name = path.file_name()?.to_string_lossy().into_owned();
                Some(PlaylistItem::new(name, data))
            }
            Err(e) => {
                warn!("cannot read {}: {e}", path.display());
                None
            }
        })
        .collect()
}

/// ===============================
/// Main
/// ===============================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> RelayResult<()> {
    let mut config = RelayConfig::default();
    if let Some(hash) = &cli.rate {
        config = config.with_sampling_rate_override(hash);
    }
    let config = config
        .with_chunk_size(cli.chunk_size)
        .with_loop_max_count(cli.loop_max_count)
        .with_feed_out_seconds(cli.feed_out_seconds);

    let (controller, mut worklet) = prepare(Box::new(ToneFactory), config)?;
    let mut player = Player::new(controller);
    player.set_playlist(playlist(&cli.files));

    if player.next()?.is_none() {
        warn!("nothing playable");
        return Ok(());
    }

    let quantum = config.quantum;
    let period = Duration::from_secs_f64(quantum as f64 / config.sampling_rate as f64);
    let mut left = vec![0.0; quantum];
    let mut right = vec![0.0; quantum];
    let mut frames: u64 = 0;
    let mut last = (player.state().clone(), 0);
    let started = Instant::now();

    loop {
        worklet.process(&mut left, &mut right);
        frames += quantum as u64;
        player.tick()?;

        let current = (
            player.state().clone(),
            player.now_playing().map_or(0, |now| now.position),
        );
        if current != last {
            let state = &current.0;
            let at = frames as f64 / config.sampling_rate as f64;
            match (state, player.now_playing()) {
                (PlayerState::Playing, Some(now)) => {
                    info!("[{at:7.2}s] {} {}", now.position_label(), now.meta.game_track_name())
                }
                (PlayerState::FeedOut, _) => info!("[{at:7.2}s] fade-out"),
                (PlayerState::Error(message), _) => {
                    error!("[{at:7.2}s] {message}");
                    break;
                }
                (PlayerState::Idle, _) => break,
                _ => {}
            }
            last = current;
        }

        if cli.realtime {
            std::thread::sleep(period);
        } else {
            std::thread::yield_now();
        }
    }

    info!(
        "played {:.2}s of audio in {:.2?}",
        frames as f64 / config.sampling_rate as f64,
        started.elapsed()
    );
    Ok(())
}
