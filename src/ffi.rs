// C-compatible FFI bindings for native hosts (iOS/Swift, C/C++).
//
// The host supplies the compiled synthesis module as a table of function
// pointers and drives two handles:
// - `WgmPlayer` from the UI thread (playlist, play/stop, events)
// - `WgmWorklet` from the audio callback (`wgm_worklet_render`)
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - String parameters must be valid null-terminated UTF-8
// - Caller must call the corresponding _destroy function for each handle

use std::ffi::{CStr, c_char, c_void};
use std::ptr::NonNull;

use log::{debug, error, warn};

use crate::config::RelayConfig;
use crate::controller::prepare;
use crate::engine::{EngineFactory, SequenceKind, SynthEngine};
use crate::error::{EngineFault, RelayError, RelayResult};
use crate::player::{Player, PlayerState, PlaylistItem};
use crate::relay::{RelayReadback, SessionState};
use crate::worklet::Worklet;

#[cfg(feature = "ios")]
use log::LevelFilter;
#[cfg(feature = "ios")]
use oslog::OsLogger;

// Logger subsystem identifier
#[cfg(feature = "ios")]
const LOG_SUBSYSTEM: &str = "com.wgmplay.relay";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Output appears in Console.app and
/// Xcode's debug console.
#[cfg(feature = "ios")]
#[unsafe(no_mangle)]
pub extern "C" fn wgm_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine Function Table
// ═══════════════════════════════════════════════════════════════════════════

/// The synthesis module's exports.
///
/// `kind` passed to `construct` is 0 for VGM and 1 for XGM. A negative
/// `play` result is an engine failure.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WgmEngineVTable {
    pub construct: unsafe extern "C" fn(
        kind: u32,
        sampling_rate: u32,
        chunk_size: u32,
        input_len: u32,
    ) -> *mut c_void,
    pub get_seq_data_ref: unsafe extern "C" fn(handle: *mut c_void) -> *mut u8,
    pub init: unsafe extern "C" fn(handle: *mut c_void) -> bool,
    pub play: unsafe extern "C" fn(handle: *mut c_void) -> i32,
    pub get_sampling_l_ref: unsafe extern "C" fn(handle: *mut c_void) -> *const f32,
    pub get_sampling_r_ref: unsafe extern "C" fn(handle: *mut c_void) -> *const f32,
    pub get_seq_gd3: unsafe extern "C" fn(handle: *mut c_void) -> *const c_char,
    pub free: unsafe extern "C" fn(handle: *mut c_void),
}

/// One engine instance owned through the function table.
struct FfiEngine {
    vtable: WgmEngineVTable,
    handle: NonNull<c_void>,
    input_len: usize,
    chunk_size: usize,
}

// SAFETY: an instance is created, used and freed by the generation thread
// that owns its session; the host module holds no thread affinity.
unsafe impl Send for FfiEngine {}

impl SynthEngine for FfiEngine {
    fn seq_data_mut(&mut self) -> &mut [u8] {
        let data = unsafe { (self.vtable.get_seq_data_ref)(self.handle.as_ptr()) };
        if data.is_null() {
            return &mut [];
        }
        // SAFETY: the module allocated `input_len` bytes at construction.
        unsafe { std::slice::from_raw_parts_mut(data, self.input_len) }
    }

    fn init(&mut self) -> bool {
        unsafe { (self.vtable.init)(self.handle.as_ptr()) }
    }

    fn play(&mut self) -> Result<usize, EngineFault> {
        let loops = unsafe { (self.vtable.play)(self.handle.as_ptr()) };
        usize::try_from(loops).map_err(|_| EngineFault::new(format!("play returned {loops}")))
    }

    fn sampling_l(&self) -> &[f32] {
        let samples = unsafe { (self.vtable.get_sampling_l_ref)(self.handle.as_ptr()) };
        self.samples(samples)
    }

    fn sampling_r(&self) -> &[f32] {
        let samples = unsafe { (self.vtable.get_sampling_r_ref)(self.handle.as_ptr()) };
        self.samples(samples)
    }

    fn seq_gd3(&self) -> String {
        let json = unsafe { (self.vtable.get_seq_gd3)(self.handle.as_ptr()) };
        if json.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(json).to_string_lossy().into_owned() }
    }
}

impl FfiEngine {
    fn samples(&self, samples: *const f32) -> &[f32] {
        if samples.is_null() {
            return &[];
        }
        // SAFETY: the module keeps `chunk_size` samples per channel alive
        // until the next `play`.
        unsafe { std::slice::from_raw_parts(samples, self.chunk_size) }
    }
}

impl Drop for FfiEngine {
    fn drop(&mut self) {
        unsafe { (self.vtable.free)(self.handle.as_ptr()) };
    }
}

/// Engine factory backed by the host's function table.
pub struct FfiEngineFactory {
    vtable: WgmEngineVTable,
}

impl FfiEngineFactory {
    pub fn new(vtable: WgmEngineVTable) -> Self {
        Self { vtable }
    }
}

impl EngineFactory for FfiEngineFactory {
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
        let (Ok(chunk), Ok(len)) = (u32::try_from(chunk_size), u32::try_from(input_len)) else {
            return Err(RelayError::Unavailable("input too large for engine".into()));
        };
        let handle = unsafe { (self.vtable.construct)(kind_id, sampling_rate, chunk, len) };
        let handle = NonNull::new(handle)
            .ok_or_else(|| RelayError::Unavailable("engine construct returned null".into()))?;

        Ok(Box::new(FfiEngine {
            vtable: self.vtable,
            handle,
            input_len,
            chunk_size,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to the player (UI-side).
pub struct WgmPlayer {
    inner: Player,
    /// Items added since the last `wgm_player_commit`.
    pending: Vec<PlaylistItem>,
}

/// Opaque handle to the worklet (audio-side).
pub struct WgmWorklet {
    inner: Worklet,
    quantum: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Value Types
// ═══════════════════════════════════════════════════════════════════════════

/// Relay configuration.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WgmConfig {
    pub sampling_rate: u32,
    pub chunk_size: u32,
    pub quantum: u32,
    pub slot_count: u32,
    pub loop_max_count: u32,
    pub feed_out_remain: u32,
}

impl Default for WgmConfig {
    fn default() -> Self {
        RelayConfig::default().into()
    }
}

impl From<RelayConfig> for WgmConfig {
    fn from(c: RelayConfig) -> Self {
        Self {
            sampling_rate: c.sampling_rate,
            chunk_size: c.chunk_size as u32,
            quantum: c.quantum as u32,
            slot_count: c.slot_count as u32,
            loop_max_count: c.loop_max_count as u32,
            feed_out_remain: c.feed_out_remain as u32,
        }
    }
}

impl From<WgmConfig> for RelayConfig {
    fn from(c: WgmConfig) -> Self {
        RelayConfig {
            sampling_rate: c.sampling_rate,
            chunk_size: c.chunk_size as usize,
            quantum: c.quantum as usize,
            slot_count: c.slot_count as usize,
            loop_max_count: c.loop_max_count as usize,
            feed_out_remain: c.feed_out_remain as usize,
        }
    }
}

/// Player state for UI display.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgmPlayerState {
    Idle = 0,
    Playing = 1,
    FeedOut = 2,
    Error = 3,
}

impl From<&PlayerState> for WgmPlayerState {
    fn from(state: &PlayerState) -> Self {
        match state {
            PlayerState::Idle => Self::Idle,
            PlayerState::Playing => Self::Playing,
            PlayerState::FeedOut => Self::FeedOut,
            PlayerState::Error(_) => Self::Error,
        }
    }
}

/// Relay readback (for UI displays). Step markers are 0 when unset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WgmReadback {
    /// 0 idle, 1 buffering, 2 playing, 3 feed-out, 4 stopped
    pub state: u32,
    pub playable_slot: u32,
    pub produced: u64,
    pub consumed: u64,
    pub end_step: u64,
    pub feed_out_step: u64,
}

impl From<RelayReadback> for WgmReadback {
    fn from(r: RelayReadback) -> Self {
        let state = match r.state {
            SessionState::Idle => 0,
            SessionState::Buffering => 1,
            SessionState::Playing => 2,
            SessionState::FeedOut => 3,
            SessionState::Stopped => 4,
        };
        Self {
            state,
            playable_slot: r.playable_slot as u32,
            produced: r.produced,
            consumed: r.consumed,
            end_step: r.end_step.unwrap_or(0),
            feed_out_step: r.feed_out_step.unwrap_or(0),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════════════════════

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn wgm_default_config() -> WgmConfig {
    WgmConfig::default()
}

/// Load the engine module and create a player/worklet pair.
///
/// Returns NULL if the configuration is invalid or the engine module is
/// unavailable. The worklet handle is returned via `out_worklet`.
///
/// # Safety
/// - `vtable` must point to a valid function table
/// - `config` must be a valid pointer or NULL (defaults)
/// - `out_worklet` must be a valid pointer to store the worklet handle
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_prepare(
    vtable: *const WgmEngineVTable,
    config: *const WgmConfig,
    out_worklet: *mut *mut WgmWorklet,
) -> *mut WgmPlayer {
    if vtable.is_null() || out_worklet.is_null() {
        error!("wgm_prepare: null vtable or out_worklet");
        return std::ptr::null_mut();
    }

    let config: RelayConfig = if config.is_null() {
        RelayConfig::default()
    } else {
        unsafe { std::ptr::read(config) }.into()
    };
    let factory = FfiEngineFactory::new(unsafe { std::ptr::read(vtable) });

    match prepare(Box::new(factory), config) {
        Ok((controller, worklet)) => {
            unsafe {
                *out_worklet = Box::into_raw(Box::new(WgmWorklet {
                    inner: worklet,
                    quantum: config.quantum,
                }));
            }
            debug!("wgm_prepare: ready");
            Box::into_raw(Box::new(WgmPlayer {
                inner: Player::new(controller),
                pending: Vec::new(),
            }))
        }
        Err(e) => {
            error!("wgm_prepare: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Destroy a player handle. Stops playback and joins the generation thread.
///
/// # Safety
/// `player` must be a valid pointer returned by `wgm_prepare`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_destroy(player: *mut WgmPlayer) {
    if !player.is_null() {
        unsafe { drop(Box::from_raw(player)) };
    }
}

/// Destroy a worklet handle.
///
/// # Safety
/// `worklet` must be a valid pointer returned via `wgm_prepare`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_worklet_destroy(worklet: *mut WgmWorklet) {
    if !worklet.is_null() {
        unsafe { drop(Box::from_raw(worklet)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Player - UI Thread
// ═══════════════════════════════════════════════════════════════════════════

/// Queue a file for the next `wgm_player_commit`.
///
/// # Safety
/// - `player` must be a valid player handle
/// - `name` must be a valid null-terminated string
/// - `data` must point to `len` readable bytes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_add(
    player: *mut WgmPlayer,
    name: *const c_char,
    data: *const u8,
    len: usize,
) {
    if player.is_null() || name.is_null() || (data.is_null() && len > 0) {
        return;
    }
    let name = unsafe { CStr::from_ptr(name).to_string_lossy().into_owned() };
    let data = if len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(data, len).to_vec() }
    };
    unsafe { (*player).pending.push(PlaylistItem::new(name, data)) };
}

/// Replace the playlist with the items added so far.
///
/// # Safety
/// `player` must be a valid player handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_commit(player: *mut WgmPlayer) {
    if player.is_null() {
        return;
    }
    let player = unsafe { &mut *player };
    let items = std::mem::take(&mut player.pending);
    player.inner.set_playlist(items);
}

/// Start the next playable item.
///
/// Returns its 1-based playlist position, 0 when the playlist is exhausted,
/// or -1 on error (see `wgm_player_state`).
///
/// # Safety
/// `player` must be a valid player handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_next(player: *mut WgmPlayer) -> i32 {
    if player.is_null() {
        return -1;
    }
    match unsafe { (*player).inner.next() } {
        Ok(Some(now)) => now.position as i32,
        Ok(None) => 0,
        Err(e) => {
            warn!("wgm_player_next: {e}");
            -1
        }
    }
}

/// Stop playback.
///
/// # Safety
/// `player` must be a valid player handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_stop(player: *mut WgmPlayer) {
    if !player.is_null() {
        unsafe { (*player).inner.stop() };
    }
}

/// Process pending events (advance on end of track) and return the state.
///
/// Call periodically from the UI thread.
///
/// # Safety
/// `player` must be a valid player handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_tick(player: *mut WgmPlayer) -> WgmPlayerState {
    if player.is_null() {
        return WgmPlayerState::Idle;
    }
    let player = unsafe { &mut *player };
    if let Err(e) = player.inner.tick() {
        warn!("wgm_player_tick: {e}");
    }
    player.inner.state().into()
}

/// Current player state.
///
/// # Safety
/// `player` must be a valid player handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_state(player: *const WgmPlayer) -> WgmPlayerState {
    if player.is_null() {
        return WgmPlayerState::Idle;
    }
    unsafe { (*player).inner.state().into() }
}

/// Copy the current track title ("game | track"), or the alert text in the
/// error state, into `buf` as a null-terminated string.
///
/// Returns the full length in bytes (excluding the terminator); the copy is
/// truncated when `cap` is too small.
///
/// # Safety
/// - `player` must be a valid player handle
/// - `buf` must point to `cap` writable bytes, or be NULL with `cap == 0`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_player_title(
    player: *const WgmPlayer,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    if player.is_null() {
        return 0;
    }
    let player = unsafe { &(*player).inner };
    let title = match (player.state(), player.now_playing()) {
        (PlayerState::Error(message), _) => message.clone(),
        (_, Some(now)) => now.meta.game_track_name(),
        _ => String::new(),
    };
    unsafe { copy_c_string(&title, buf, cap) }
}

unsafe fn copy_c_string(text: &str, buf: *mut c_char, cap: usize) -> usize {
    let bytes = text.as_bytes();
    if !buf.is_null() && cap > 0 {
        let n = bytes.len().min(cap - 1);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf as *mut u8, n);
            *buf.add(n) = 0;
        }
    }
    bytes.len()
}

// ═══════════════════════════════════════════════════════════════════════════
// Worklet - Audio Thread
// ═══════════════════════════════════════════════════════════════════════════

/// Render `frames` frames of planar stereo audio.
///
/// Returns `false` once the player has been destroyed.
///
/// # Safety
/// - Must be called from the audio thread
/// - Output buffers must be valid and have space for `frames` samples
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_worklet_render(
    worklet: *mut WgmWorklet,
    frames: u32,
    output_left: *mut f32,
    output_right: *mut f32,
) -> bool {
    let total_frames = frames as usize;

    // Fill with silence if invalid
    if worklet.is_null() || output_left.is_null() || output_right.is_null() {
        if !output_left.is_null() {
            unsafe { std::ptr::write_bytes(output_left, 0, total_frames) };
        }
        if !output_right.is_null() {
            unsafe { std::ptr::write_bytes(output_right, 0, total_frames) };
        }
        return false;
    }

    let worklet = unsafe { &mut *worklet };
    let out_left = unsafe { std::slice::from_raw_parts_mut(output_left, total_frames) };
    let out_right = unsafe { std::slice::from_raw_parts_mut(output_right, total_frames) };

    // One relay step per quantum
    let mut alive = true;
    for (left, right) in out_left
        .chunks_mut(worklet.quantum)
        .zip(out_right.chunks_mut(worklet.quantum))
    {
        alive = worklet.inner.process(left, right);
    }
    alive
}

/// Relay readback for UI displays.
///
/// # Safety
/// `worklet` must be a valid worklet handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgm_worklet_readback(worklet: *const WgmWorklet) -> WgmReadback {
    if worklet.is_null() {
        return WgmReadback::default();
    }
    unsafe { (*worklet).inner.readback() }
        .map(WgmReadback::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::time::{Duration, Instant};

    const CHUNK: usize = 256;

    /// Module stand-in: each `play` fills the chunk with the step number
    /// and reports loop count `step / 2`.
    struct FakeModule {
        input: Vec<u8>,
        step: i32,
        left: Vec<f32>,
        right: Vec<f32>,
        gd3: CString,
    }

    unsafe extern "C" fn construct(_kind: u32, _rate: u32, chunk: u32, len: u32) -> *mut c_void {
        let module = FakeModule {
            input: vec![0; len as usize],
            step: 0,
            left: vec![0.0; chunk as usize],
            right: vec![0.0; chunk as usize],
            gd3: CString::new(r#"{"game_name":"FFI","track_name":"Fake"}"#).unwrap(),
        };
        Box::into_raw(Box::new(module)) as *mut c_void
    }

    unsafe extern "C" fn get_seq_data_ref(handle: *mut c_void) -> *mut u8 {
        unsafe { (*(handle as *mut FakeModule)).input.as_mut_ptr() }
    }

    unsafe extern "C" fn init(handle: *mut c_void) -> bool {
        unsafe { (*(handle as *mut FakeModule)).input.starts_with(b"Vgm ") }
    }

    unsafe extern "C" fn play(handle: *mut c_void) -> i32 {
        let module = unsafe { &mut *(handle as *mut FakeModule) };
        module.step += 1;
        module.left.fill(module.step as f32);
        module.right.fill(module.step as f32);
        if module.input.get(4) == Some(&0xff) && module.step == 2 {
            return -1;
        }
        module.step / 2
    }

    unsafe extern "C" fn get_sampling_l_ref(handle: *mut c_void) -> *const f32 {
        unsafe { (*(handle as *mut FakeModule)).left.as_ptr() }
    }

    unsafe extern "C" fn get_sampling_r_ref(handle: *mut c_void) -> *const f32 {
        unsafe { (*(handle as *mut FakeModule)).right.as_ptr() }
    }

    unsafe extern "C" fn get_seq_gd3(handle: *mut c_void) -> *const c_char {
        unsafe { (*(handle as *mut FakeModule)).gd3.as_ptr() }
    }

    unsafe extern "C" fn free(handle: *mut c_void) {
        unsafe { drop(Box::from_raw(handle as *mut FakeModule)) };
    }

    fn vtable() -> WgmEngineVTable {
        WgmEngineVTable {
            construct,
            get_seq_data_ref,
            init,
            play,
            get_sampling_l_ref,
            get_sampling_r_ref,
            get_seq_gd3,
            free,
        }
    }

    fn config() -> RelayConfig {
        RelayConfig::default()
            .with_chunk_size(CHUNK)
            .with_loop_max_count(2)
            .with_feed_out_remain(1)
    }

    #[test]
    fn test_vtable_engine_roundtrip() {
        let factory = FfiEngineFactory::new(vtable());
        let mut engine = factory
            .construct(SequenceKind::Vgm, 44_100, CHUNK, 8)
            .unwrap();
        engine.seq_data_mut().copy_from_slice(b"Vgm \0\0\0\0");
        assert!(engine.init());
        assert_eq!(engine.play(), Ok(0));
        assert_eq!(engine.play(), Ok(1));
        assert_eq!(engine.sampling_l().len(), CHUNK);
        assert!(engine.sampling_r().iter().all(|&s| s == 2.0));
        assert!(engine.seq_gd3().contains("FFI"));
    }

    #[test]
    fn test_negative_play_is_engine_fault() {
        let factory = FfiEngineFactory::new(vtable());
        let mut engine = factory
            .construct(SequenceKind::Xgm, 44_100, CHUNK, 8)
            .unwrap();
        engine.seq_data_mut().copy_from_slice(b"Vgm \xff\0\0\0");
        assert!(engine.init());
        assert!(engine.play().is_ok());
        assert!(engine.play().is_err());
    }

    #[test]
    fn test_config_conversion() {
        let config = config();
        let back: RelayConfig = WgmConfig::from(config).into();
        assert_eq!(back, config);
    }

    #[test]
    fn test_title_copy_truncates() {
        let mut buf = [0 as c_char; 4];
        let len = unsafe { copy_c_string("Sonic | Green Hill", buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 18);
        let copied = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(copied.to_str().unwrap(), "Son");
    }

    #[test]
    fn test_prepare_play_and_render() {
        let config: WgmConfig = config().into();
        let mut worklet = std::ptr::null_mut();
        let player = unsafe { wgm_prepare(&vtable(), &config, &mut worklet) };
        assert!(!player.is_null() && !worklet.is_null());

        let bad = CString::new("01 bad.vgm").unwrap();
        let good = CString::new("02 good.vgm").unwrap();
        let data = b"Vgm \0\0\0\0";
        unsafe {
            wgm_player_add(player, bad.as_ptr(), b"junk".as_ptr(), 4);
            wgm_player_add(player, good.as_ptr(), data.as_ptr(), data.len());
            wgm_player_commit(player);
            assert_eq!(wgm_player_next(player), 2);
        }

        let mut title = [0 as c_char; 64];
        unsafe { wgm_player_title(player, title.as_mut_ptr(), title.len()) };
        let title = unsafe { CStr::from_ptr(title.as_ptr()) };
        assert_eq!(title.to_str().unwrap(), "FFI | Fake");

        let mut left = vec![0.0f32; 512];
        let mut right = vec![0.0f32; 512];
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut state = WgmPlayerState::Playing;
        while state != WgmPlayerState::Idle {
            assert!(Instant::now() < deadline, "timed out in {state:?}");
            unsafe {
                wgm_worklet_render(worklet, 512, left.as_mut_ptr(), right.as_mut_ptr());
                state = wgm_player_tick(player);
            }
            std::thread::yield_now();
        }

        unsafe {
            let readback = wgm_worklet_readback(worklet);
            // fade-out armed at step 4 (loop 2), end one chunk later
            assert_eq!(readback.feed_out_step, 4);
            assert_eq!(readback.end_step, 5);
            assert_eq!(readback.state, 4);
            wgm_player_destroy(player);
            assert!(!wgm_worklet_render(worklet, 512, left.as_mut_ptr(), right.as_mut_ptr()));
            wgm_worklet_destroy(worklet);
        }
    }
}
