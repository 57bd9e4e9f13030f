// SPDX-License-Identifier: MPL-2.0
//! Playback session orchestration and the audio-master synchronization
//! loop.
//!
//! [`Player`] drives the Open/Start/Pause/Seek/Close lifecycle across its
//! collaborators: a demuxer, a video decoder, an audio decoder, the
//! [`Resampler`], an audio sink, and a video view. Collaborators are
//! injected at construction and owned by the player for its whole life;
//! closing a session stops and clears them but keeps them attached, so the
//! same player can open another source. Missing collaborators degrade the
//! session (audio-only, video-only, headless) instead of failing it;
//! only the demuxer is mandatory.
//!
//! # Synchronization
//!
//! Playback uses a pull-model audio-master clock. A dedicated loop thread
//! copies the audio sink's playback position into the video decoder's sync
//! target every tick; the video decoder paces its own frame delivery
//! against that target. Video always follows audio, never the reverse.
//!
//! # Thread Safety
//!
//! One controller mutex guards the collaborator set. The sync loop reads
//! timestamps under that same mutex, so it can never observe collaborators
//! mid-swap. [`Player::seek`] holds the mutex for its entire packet loop;
//! position queries and pause changes block until the seek lands. The
//! pause and exit flags are atomics read without the lock.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::media::MediaParameters;
use crate::port::{AudioSink, Decoder, Demuxer, SharedWindow, VideoView};
use crate::resample::Resampler;

/// Collaborators injected into a [`Player`].
///
/// Every slot is optional; the player runs degraded with whatever subset
/// is attached. The player takes ownership of the boxed collaborators;
/// the sink and view are shared so the embedder's decode wiring can keep
/// handles to them.
#[derive(Default)]
pub struct Collaborators {
    pub demuxer: Option<Box<dyn Demuxer>>,
    pub video_decoder: Option<Box<dyn Decoder>>,
    pub audio_decoder: Option<Box<dyn Decoder>>,
    pub audio_sink: Option<Arc<dyn AudioSink>>,
    pub video_view: Option<Arc<dyn VideoView>>,
}

struct SessionState {
    demuxer: Option<Box<dyn Demuxer>>,
    video_decoder: Option<Box<dyn Decoder>>,
    audio_decoder: Option<Box<dyn Decoder>>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    video_view: Option<Arc<dyn VideoView>>,
    /// Output audio parameters of the current source; defaults to the
    /// source's native audio parameters on open.
    out_params: MediaParameters,
}

/// Playback session controller.
pub struct Player {
    state: Arc<Mutex<SessionState>>,
    resampler: Arc<Resampler>,
    paused: Arc<AtomicBool>,
    exit: Arc<AtomicBool>,
    sync_thread: Mutex<Option<JoinHandle<()>>>,
    config: EngineConfig,
}

impl Player {
    /// Builds a player owning `collaborators`, configured by `config`
    /// (sanitized on the way in).
    #[must_use]
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                demuxer: collaborators.demuxer,
                video_decoder: collaborators.video_decoder,
                audio_decoder: collaborators.audio_decoder,
                audio_sink: collaborators.audio_sink,
                video_view: collaborators.video_view,
                out_params: MediaParameters::default(),
            })),
            resampler: Arc::new(Resampler::new()),
            paused: Arc::new(AtomicBool::new(false)),
            exit: Arc::new(AtomicBool::new(false)),
            sync_thread: Mutex::new(None),
            config: config.sanitized(),
        }
    }

    /// The session's audio format converter.
    ///
    /// Configured on every [`open`](Self::open) for the source's audio
    /// parameters; the embedder's audio decode wiring pulls converted
    /// buffers through this handle.
    #[must_use]
    pub fn resampler(&self) -> Arc<Resampler> {
        Arc::clone(&self.resampler)
    }

    /// Opens `path` for playback, closing any prior session first.
    ///
    /// The demuxer must open; decoder and resampler failures are logged
    /// and the session continues degraded (audio-only or video-only).
    ///
    /// # Errors
    ///
    /// Fails when no demuxer is attached or the demuxer rejects `path`.
    pub fn open(&self, path: &Path) -> Result<()> {
        self.close();
        // A fresh session is neither paused nor exiting. The pause reset
        // goes through the collaborators like any other pause change.
        self.set_pause(false);
        self.exit.store(false, Ordering::Relaxed);

        let mut state = self.lock_state(|| Error::Open("controller state poisoned".to_string()))?;
        let state = &mut *state;

        let Some(demuxer) = state.demuxer.as_mut() else {
            return Err(Error::Open("no demuxer attached".to_string()));
        };
        demuxer.open(path)?;

        let audio_params = demuxer.audio_params();
        let video_params = demuxer.video_params();
        state.out_params = audio_params.unwrap_or_default();

        if let Some(decoder) = state.video_decoder.as_mut() {
            match video_params {
                Some(params) => {
                    if let Err(err) = decoder.open(&params, self.config.prefer_hardware_decode) {
                        log::warn!("Video decoder unavailable, continuing without video: {err}");
                    }
                }
                None => log::info!("Source has no video stream"),
            }
        }
        if let Some(decoder) = state.audio_decoder.as_mut() {
            match audio_params {
                Some(params) => {
                    if let Err(err) = decoder.open(&params, self.config.prefer_hardware_decode) {
                        log::warn!("Audio decoder unavailable, continuing without audio: {err}");
                    }
                }
                None => log::info!("Source has no audio stream"),
            }
        }
        if let Some(params) = audio_params {
            if let Err(err) = self.resampler.open(&params, &state.out_params) {
                log::warn!("Audio conversion unavailable: {err}");
            }
        }

        Ok(())
    }

    /// Starts playback: decoders first, then the demuxer, then the audio
    /// path, then the sync loop. Calling it on a running session is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails when no demuxer is attached, when the demuxer refuses to
    /// start, or when the sync-loop thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        {
            let Ok(thread) = self.sync_thread.lock() else {
                return Err(Error::Open("sync loop state poisoned".to_string()));
            };
            if thread.is_some() {
                return Ok(());
            }
        }

        {
            let mut state =
                self.lock_state(|| Error::Open("controller state poisoned".to_string()))?;
            let state = &mut *state;

            // Decoders must be ready to accept packets before the demuxer
            // begins pushing them.
            if let Some(decoder) = state.video_decoder.as_mut() {
                decoder.start();
            }
            let Some(demuxer) = state.demuxer.as_mut() else {
                return Err(Error::Open("no demuxer attached".to_string()));
            };
            demuxer.start()?;
            if let Some(decoder) = state.audio_decoder.as_mut() {
                decoder.start();
            }
            if let Some(sink) = state.audio_sink.as_ref() {
                let params = state.out_params;
                if let Err(err) = sink.start_play(&params) {
                    log::warn!("Audio output unavailable, continuing without sound: {err}");
                }
            }
        }

        self.exit.store(false, Ordering::Relaxed);
        let state = Arc::clone(&self.state);
        let paused = Arc::clone(&self.paused);
        let exit = Arc::clone(&self.exit);
        let interval = Duration::from_millis(self.config.sync_interval_ms);
        let handle = std::thread::Builder::new()
            .name("playback-sync".to_string())
            .spawn(move || sync_loop(&state, &paused, &exit, interval))?;

        if let Ok(mut thread) = self.sync_thread.lock() {
            *thread = Some(handle);
        }
        Ok(())
    }

    /// Tears the session down: sync loop first, then stop every
    /// collaborator, clear their queues, and close the output modules.
    /// Idempotent; collaborators stay attached for a later open.
    pub fn close(&self) {
        self.exit.store(true, Ordering::Relaxed);
        let handle = match self.sync_thread.lock() {
            Ok(mut thread) => thread.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let state = &mut *state;

        if let Some(demuxer) = state.demuxer.as_mut() {
            demuxer.stop();
        }
        if let Some(decoder) = state.video_decoder.as_mut() {
            decoder.stop();
        }
        if let Some(decoder) = state.audio_decoder.as_mut() {
            decoder.stop();
        }

        if let Some(decoder) = state.video_decoder.as_mut() {
            decoder.clear();
        }
        if let Some(decoder) = state.audio_decoder.as_mut() {
            decoder.clear();
        }
        if let Some(sink) = state.audio_sink.as_ref() {
            sink.clear();
        }

        if let Some(sink) = state.audio_sink.as_ref() {
            sink.close();
        }
        if let Some(view) = state.video_view.as_ref() {
            view.close();
        }
        self.resampler.close();
    }

    /// Pauses or resumes playback, propagating the flag to the sync loop
    /// and every attached collaborator. Callable at any time.
    pub fn set_pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let state = &mut *state;
        if let Some(demuxer) = state.demuxer.as_mut() {
            demuxer.set_pause(paused);
        }
        if let Some(decoder) = state.video_decoder.as_mut() {
            decoder.set_pause(paused);
        }
        if let Some(decoder) = state.audio_decoder.as_mut() {
            decoder.set_pause(paused);
        }
        if let Some(sink) = state.audio_sink.as_ref() {
            sink.set_pause(paused);
        }
    }

    /// Current playback position as a fraction of total duration.
    ///
    /// Exactly `0.0` without a demuxer (or a video decoder, or a known
    /// duration). The ratio is not clamped: near end of stream a video
    /// timestamp past the container duration reports a value above 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // millisecond counts fit f64 exactly
    pub fn play_pos(&self) -> f64 {
        let Ok(state) = self.state.lock() else {
            return 0.0;
        };
        let Some(demuxer) = state.demuxer.as_ref() else {
            return 0.0;
        };
        let total_ms = demuxer.total_duration_ms();
        if total_ms <= 0 {
            return 0.0;
        }
        let Some(decoder) = state.video_decoder.as_ref() else {
            return 0.0;
        };
        decoder.pts_ms() as f64 / total_ms as f64
    }

    /// Seeks to fraction `pos` of the source and lands on the first video
    /// frame at or past the target.
    ///
    /// Playback pauses for the duration of the seek and resumes on every
    /// exit path. The controller lock is held across the whole packet
    /// loop, so the call is synchronous and blocks proportionally to the
    /// keyframe distance; the session exit flag is the only cancellation.
    ///
    /// # Errors
    ///
    /// Fails when `pos` is outside `[0, 1]`, no demuxer is attached, or
    /// the demuxer rejects the seek.
    pub fn seek(&self, pos: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&pos) {
            return Err(Error::Seek(format!("position {pos} out of range")));
        }

        self.set_pause(true);
        let result = match self.state.lock() {
            Ok(mut state) => seek_locked(&mut state, pos, &self.exit),
            Err(_) => Err(Error::Seek("controller state poisoned".to_string())),
        };
        self.set_pause(false);
        result
    }

    /// Rebinds the video view to `window`, closing any prior binding
    /// first. A no-op without an attached view.
    pub fn init_view(&self, window: SharedWindow) {
        let Ok(state) = self.state.lock() else {
            return;
        };
        if let Some(view) = state.video_view.as_ref() {
            view.close();
            view.set_render(window);
        }
    }

    /// Whether playback is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn lock_state<F>(&self, err: F) -> Result<MutexGuard<'_, SessionState>>
    where
        F: FnOnce() -> Error,
    {
        self.state.lock().map_err(|_| err())
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

/// Audio-master clock loop. Each tick copies the sink's playback position
/// into the video decoder's sync target; paused or incomplete sessions
/// just sleep.
fn sync_loop(
    state: &Mutex<SessionState>,
    paused: &AtomicBool,
    exit: &AtomicBool,
    interval: Duration,
) {
    while !exit.load(Ordering::Relaxed) {
        if !paused.load(Ordering::Relaxed) {
            if let Ok(mut state) = state.lock() {
                let state = &mut *state;
                if let (Some(sink), Some(decoder)) =
                    (state.audio_sink.as_ref(), state.video_decoder.as_mut())
                {
                    decoder.set_sync_target_ms(sink.position_ms());
                }
            }
        }
        std::thread::sleep(interval);
    }
}

/// The seek state machine, run under the controller lock.
#[allow(clippy::cast_possible_truncation)] // target stays within the i64 duration
#[allow(clippy::cast_precision_loss)]
fn seek_locked(state: &mut SessionState, pos: f64, exit: &AtomicBool) -> Result<()> {
    // Discard stale buffers so nothing from before the jump plays.
    if let Some(decoder) = state.video_decoder.as_mut() {
        decoder.clear();
    }
    if let Some(decoder) = state.audio_decoder.as_mut() {
        decoder.clear();
    }
    if let Some(sink) = state.audio_sink.as_ref() {
        sink.clear();
    }

    let Some(demuxer) = state.demuxer.as_mut() else {
        return Err(Error::Seek("no demuxer attached".to_string()));
    };
    demuxer.seek(pos)?;

    let target_ms = (pos * demuxer.total_duration_ms() as f64) as i64;
    let Some(video_decoder) = state.video_decoder.as_mut() else {
        // Without video there is no frame to land on; the demux-level
        // seek is the whole operation.
        return Ok(());
    };

    loop {
        if exit.load(Ordering::Relaxed) {
            break;
        }
        let Some(packet) = demuxer.read() else {
            break;
        };

        if packet.is_audio {
            // Audio before the target is stale; audio at or past it goes
            // straight back to the output queue without a decode pass.
            if packet.pts_ms >= target_ms {
                demuxer.notify(packet);
            }
            continue;
        }

        if !video_decoder.send_packet(packet) {
            continue;
        }
        while let Some(frame) = video_decoder.recv_frame() {
            if frame.pts_ms >= target_ms {
                return Ok(());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use super::*;
    use crate::media::{MediaBuffer, SampleFormat};

    // ==================== scripted collaborators ====================

    #[derive(Default)]
    struct DemuxInner {
        packets: VecDeque<MediaBuffer>,
        notified: Vec<i64>,
        audio: Option<MediaParameters>,
        video: Option<MediaParameters>,
        total_ms: i64,
        opened_with: Option<PathBuf>,
        start_calls: usize,
        stop_calls: usize,
        seeked_to: Option<f64>,
        pause_history: Vec<bool>,
        fail_open: bool,
        fail_start: bool,
        fail_seek: bool,
    }

    #[derive(Clone)]
    struct ScriptedDemuxer(Arc<Mutex<DemuxInner>>);

    impl ScriptedDemuxer {
        fn new(inner: DemuxInner) -> Self {
            Self(Arc::new(Mutex::new(inner)))
        }

        fn inner(&self) -> std::sync::MutexGuard<'_, DemuxInner> {
            self.0.lock().unwrap()
        }
    }

    impl Demuxer for ScriptedDemuxer {
        fn open(&mut self, path: &Path) -> Result<()> {
            let mut inner = self.inner();
            if inner.fail_open {
                return Err(Error::Open("scripted demux failure".to_string()));
            }
            inner.opened_with = Some(path.to_path_buf());
            Ok(())
        }

        fn start(&mut self) -> Result<()> {
            let mut inner = self.inner();
            if inner.fail_start {
                return Err(Error::Open("scripted start failure".to_string()));
            }
            inner.start_calls += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.inner().stop_calls += 1;
        }

        fn seek(&mut self, position: f64) -> Result<()> {
            let mut inner = self.inner();
            if inner.fail_seek {
                return Err(Error::Seek("scripted seek failure".to_string()));
            }
            inner.seeked_to = Some(position);
            Ok(())
        }

        fn read(&mut self) -> Option<MediaBuffer> {
            self.inner().packets.pop_front()
        }

        fn notify(&mut self, buffer: MediaBuffer) {
            self.inner().notified.push(buffer.pts_ms);
        }

        fn set_pause(&mut self, paused: bool) {
            self.inner().pause_history.push(paused);
        }

        fn audio_params(&self) -> Option<MediaParameters> {
            self.inner().audio
        }

        fn video_params(&self) -> Option<MediaParameters> {
            self.inner().video
        }

        fn total_duration_ms(&self) -> i64 {
            self.inner().total_ms
        }
    }

    #[derive(Default)]
    struct DecoderInner {
        opened: bool,
        prefer_hardware: Option<bool>,
        start_calls: usize,
        stop_calls: usize,
        clear_calls: usize,
        sent: Vec<i64>,
        /// Frames produced one-for-one from sent packets.
        pending: VecDeque<MediaBuffer>,
        pts_ms: i64,
        sync_targets: Vec<i64>,
        pause_history: Vec<bool>,
        fail_open: bool,
    }

    #[derive(Clone)]
    struct ScriptedDecoder(Arc<Mutex<DecoderInner>>);

    impl ScriptedDecoder {
        fn new(inner: DecoderInner) -> Self {
            Self(Arc::new(Mutex::new(inner)))
        }

        fn inner(&self) -> std::sync::MutexGuard<'_, DecoderInner> {
            self.0.lock().unwrap()
        }
    }

    impl Decoder for ScriptedDecoder {
        fn open(&mut self, _params: &MediaParameters, prefer_hardware: bool) -> Result<()> {
            let mut inner = self.inner();
            if inner.fail_open {
                return Err(Error::Open("scripted decoder failure".to_string()));
            }
            inner.opened = true;
            inner.prefer_hardware = Some(prefer_hardware);
            Ok(())
        }

        fn start(&mut self) {
            self.inner().start_calls += 1;
        }

        fn stop(&mut self) {
            self.inner().stop_calls += 1;
        }

        fn clear(&mut self) {
            let mut inner = self.inner();
            inner.clear_calls += 1;
            inner.pending.clear();
        }

        fn send_packet(&mut self, packet: MediaBuffer) -> bool {
            let mut inner = self.inner();
            inner.sent.push(packet.pts_ms);
            // Decode is modeled one-for-one: every packet yields a frame
            // carrying the same timestamp.
            let frame = MediaBuffer::packet(packet.payload, packet.pts_ms, false);
            inner.pending.push_back(frame);
            true
        }

        fn recv_frame(&mut self) -> Option<MediaBuffer> {
            self.inner().pending.pop_front()
        }

        fn pts_ms(&self) -> i64 {
            self.inner().pts_ms
        }

        fn set_sync_target_ms(&mut self, target_ms: i64) {
            self.inner().sync_targets.push(target_ms);
        }

        fn set_pause(&mut self, paused: bool) {
            self.inner().pause_history.push(paused);
        }
    }

    #[derive(Default)]
    struct SinkInner {
        started_with: Option<MediaParameters>,
        clear_calls: usize,
        close_calls: usize,
        position_ms: i64,
        pause_history: Vec<bool>,
    }

    #[derive(Clone, Default)]
    struct ScriptedSink(Arc<Mutex<SinkInner>>);

    impl ScriptedSink {
        fn inner(&self) -> std::sync::MutexGuard<'_, SinkInner> {
            self.0.lock().unwrap()
        }
    }

    impl AudioSink for ScriptedSink {
        fn start_play(&self, params: &MediaParameters) -> Result<()> {
            self.inner().started_with = Some(*params);
            Ok(())
        }

        fn push(&self, _buffer: MediaBuffer) {}

        fn clear(&self) {
            self.inner().clear_calls += 1;
        }

        fn close(&self) {
            self.inner().close_calls += 1;
        }

        fn position_ms(&self) -> i64 {
            self.inner().position_ms
        }

        fn set_pause(&self, paused: bool) {
            self.inner().pause_history.push(paused);
        }
    }

    #[derive(Default)]
    struct ViewInner {
        set_render_calls: usize,
        close_calls: usize,
    }

    #[derive(Clone, Default)]
    struct ScriptedView(Arc<Mutex<ViewInner>>);

    impl VideoView for ScriptedView {
        fn set_render(&self, _window: SharedWindow) {
            self.0.lock().unwrap().set_render_calls += 1;
        }

        fn render(&self, _frame: &crate::media::FramePlanes) {}

        fn close(&self) {
            self.0.lock().unwrap().close_calls += 1;
        }
    }

    // ==================== fixtures ====================

    fn audio_params() -> MediaParameters {
        MediaParameters {
            sample_rate: 48_000,
            channels: 2,
            sample_format: SampleFormat::S16,
            total_duration_ms: 10_000,
        }
    }

    fn audio_packet(pts_ms: i64) -> MediaBuffer {
        MediaBuffer::packet(vec![0u8; 16], pts_ms, true)
    }

    fn video_packet(pts_ms: i64) -> MediaBuffer {
        MediaBuffer::packet(vec![0u8; 16], pts_ms, false)
    }

    fn demuxer_for(total_ms: i64) -> ScriptedDemuxer {
        ScriptedDemuxer::new(DemuxInner {
            audio: Some(audio_params()),
            video: Some(MediaParameters::default()),
            total_ms,
            ..DemuxInner::default()
        })
    }

    struct Fixture {
        player: Player,
        demuxer: ScriptedDemuxer,
        video: ScriptedDecoder,
        audio: ScriptedDecoder,
        sink: ScriptedSink,
        view: ScriptedView,
    }

    fn fixture_with(config: EngineConfig, demuxer: ScriptedDemuxer) -> Fixture {
        let video = ScriptedDecoder::new(DecoderInner::default());
        let audio = ScriptedDecoder::new(DecoderInner::default());
        let sink = ScriptedSink::default();
        let view = ScriptedView::default();
        let player = Player::new(
            config,
            Collaborators {
                demuxer: Some(Box::new(demuxer.clone())),
                video_decoder: Some(Box::new(video.clone())),
                audio_decoder: Some(Box::new(audio.clone())),
                audio_sink: Some(Arc::new(sink.clone())),
                video_view: Some(Arc::new(view.clone())),
            },
        );
        Fixture {
            player,
            demuxer,
            video,
            audio,
            sink,
            view,
        }
    }

    fn fixture(total_ms: i64) -> Fixture {
        fixture_with(EngineConfig::default(), demuxer_for(total_ms))
    }

    // ==================== open ====================

    #[test]
    fn open_fails_without_demuxer() {
        let player = Player::new(EngineConfig::default(), Collaborators::default());
        assert!(matches!(
            player.open(Path::new("movie.mp4")),
            Err(Error::Open(_))
        ));
    }

    #[test]
    fn open_reports_demux_failure_and_leaves_decoders_untouched() {
        let demuxer = ScriptedDemuxer::new(DemuxInner {
            fail_open: true,
            ..DemuxInner::default()
        });
        let fx = fixture_with(EngineConfig::default(), demuxer);

        assert!(fx.player.open(Path::new("movie.mp4")).is_err());
        assert!(!fx.video.inner().opened);
        assert!(!fx.audio.inner().opened);
    }

    #[test]
    fn open_continues_when_video_decoder_fails() {
        let fx = fixture(10_000);
        fx.video.inner().fail_open = true;

        assert!(fx.player.open(Path::new("movie.mp4")).is_ok());
        assert!(!fx.video.inner().opened);
        assert!(fx.audio.inner().opened);
    }

    #[test]
    fn open_plumbs_hardware_preference_into_decoders() {
        let config = EngineConfig {
            prefer_hardware_decode: true,
            ..EngineConfig::default()
        };
        let fx = fixture_with(config, demuxer_for(10_000));

        fx.player.open(Path::new("movie.mp4")).unwrap();

        assert_eq!(fx.video.inner().prefer_hardware, Some(true));
        assert_eq!(fx.audio.inner().prefer_hardware, Some(true));
    }

    #[test]
    fn open_closes_previous_session_first() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("first.mp4")).unwrap();

        fx.player.open(Path::new("second.mp4")).unwrap();

        assert!(fx.demuxer.inner().stop_calls >= 1);
        assert_eq!(
            fx.demuxer.inner().opened_with.as_deref(),
            Some(Path::new("second.mp4"))
        );
    }

    #[test]
    fn open_configures_the_resampler_for_the_source() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();

        // 48 kHz stereo S16 in and out: a converted buffer keeps its size.
        let input = MediaBuffer::audio(vec![0u8; 1024], 40);
        let output = fx.player.resampler().resample(input);
        assert_eq!(output.payload.len(), 1024);
        assert_eq!(output.pts_ms, 40);
    }

    #[test]
    fn open_unpauses_every_collaborator() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("first.mp4")).unwrap();
        fx.player.set_pause(true);

        fx.player.open(Path::new("second.mp4")).unwrap();

        assert!(!fx.player.is_paused());
        assert_eq!(fx.demuxer.inner().pause_history.last(), Some(&false));
        assert_eq!(fx.video.inner().pause_history.last(), Some(&false));
        assert_eq!(fx.audio.inner().pause_history.last(), Some(&false));
        assert_eq!(fx.sink.inner().pause_history.last(), Some(&false));
    }

    // ==================== start ====================

    #[test]
    fn start_fails_without_demuxer() {
        let player = Player::new(EngineConfig::default(), Collaborators::default());
        assert!(player.start().is_err());
    }

    #[test]
    fn start_aborts_when_demuxer_refuses() {
        let demuxer = ScriptedDemuxer::new(DemuxInner {
            audio: Some(audio_params()),
            fail_start: true,
            ..DemuxInner::default()
        });
        let fx = fixture_with(EngineConfig::default(), demuxer);
        fx.player.open(Path::new("movie.mp4")).unwrap();

        assert!(fx.player.start().is_err());

        // The video decoder starts ahead of the demuxer; everything after
        // the demux failure must not run.
        assert_eq!(fx.video.inner().start_calls, 1);
        assert_eq!(fx.audio.inner().start_calls, 0);
        assert!(fx.sink.inner().started_with.is_none());
    }

    #[test]
    fn start_hands_output_parameters_to_the_sink() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.start().unwrap();

        assert_eq!(fx.sink.inner().started_with, Some(audio_params()));
        fx.player.close();
    }

    #[test]
    fn start_twice_is_idempotent() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.start().unwrap();
        fx.player.start().unwrap();

        assert_eq!(fx.demuxer.inner().start_calls, 1);
        fx.player.close();
    }

    // ==================== sync loop ====================

    #[test]
    fn sync_loop_feeds_audio_position_to_video_decoder() {
        let config = EngineConfig {
            sync_interval_ms: 1,
            ..EngineConfig::default()
        };
        let fx = fixture_with(config, demuxer_for(10_000));
        fx.sink.inner().position_ms = 777;

        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        fx.player.close();

        assert!(fx.video.inner().sync_targets.contains(&777));
    }

    #[test]
    fn sync_loop_skips_ticks_while_paused() {
        let config = EngineConfig {
            sync_interval_ms: 1,
            ..EngineConfig::default()
        };
        let fx = fixture_with(config, demuxer_for(10_000));

        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.set_pause(true);
        fx.player.start().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(fx.video.inner().sync_targets.is_empty());

        fx.player.set_pause(false);
        std::thread::sleep(Duration::from_millis(30));
        assert!(!fx.video.inner().sync_targets.is_empty());
        fx.player.close();
    }

    // ==================== pause ====================

    #[test]
    fn pause_propagates_to_every_collaborator() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();

        fx.player.set_pause(true);

        assert!(fx.player.is_paused());
        assert_eq!(fx.demuxer.inner().pause_history.last(), Some(&true));
        assert_eq!(fx.video.inner().pause_history.last(), Some(&true));
        assert_eq!(fx.audio.inner().pause_history.last(), Some(&true));
        assert_eq!(fx.sink.inner().pause_history.last(), Some(&true));
    }

    // ==================== play_pos ====================

    #[test]
    fn play_pos_is_zero_without_demuxer() {
        let player = Player::new(EngineConfig::default(), Collaborators::default());
        assert!(player.play_pos().abs() < f64::EPSILON);
    }

    #[test]
    fn play_pos_is_zero_with_unknown_duration() {
        let fx = fixture(0);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        assert!(fx.player.play_pos().abs() < f64::EPSILON);
    }

    #[test]
    fn play_pos_tracks_the_video_clock() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.video.inner().pts_ms = 2_500;

        assert!((fx.player.play_pos() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn play_pos_is_not_clamped_above_one() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.video.inner().pts_ms = 12_000;

        assert!((fx.player.play_pos() - 1.2).abs() < 1e-9);
    }

    // ==================== seek ====================

    #[test]
    fn seek_rejects_positions_outside_unit_range() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();

        assert!(fx.player.seek(1.5).is_err());
        assert!(fx.player.seek(-0.1).is_err());
        // Argument validation happens before anything pauses.
        assert!(!fx.demuxer.inner().pause_history.contains(&true));
    }

    #[test]
    fn seek_clears_queues_and_lands_on_the_target_frame() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        {
            let mut demux = fx.demuxer.inner();
            demux.packets = VecDeque::from(vec![
                audio_packet(4_900),
                video_packet(4_950),
                audio_packet(5_010),
                video_packet(5_020),
                video_packet(5_060),
            ]);
        }

        fx.player.seek(0.5).unwrap();

        let demux = fx.demuxer.inner();
        let video = fx.video.inner();
        assert_eq!(demux.seeked_to, Some(0.5));
        // Stale audio (4900) dropped; post-target audio handed back.
        assert_eq!(demux.notified, vec![5_010]);
        // The loop stopped at the 5020 frame; 5060 was never read.
        assert_eq!(video.sent, vec![4_950, 5_020]);
        assert_eq!(demux.packets.len(), 1);
        assert!(video.clear_calls >= 1);
        assert!(fx.audio.inner().clear_calls >= 1);
        assert!(fx.sink.inner().clear_calls >= 1);
        // Playback resumed.
        assert!(!fx.player.is_paused());
    }

    #[test]
    fn seek_stops_at_end_of_data_before_the_target() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        {
            let mut demux = fx.demuxer.inner();
            demux.packets = VecDeque::from(vec![video_packet(9_000)]);
        }

        // Target 9.5 s, but the source runs out at 9.0 s.
        fx.player.seek(0.95).unwrap();

        assert!(fx.demuxer.inner().packets.is_empty());
        assert!(!fx.player.is_paused());
    }

    #[test]
    fn seek_unpauses_after_demux_failure() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.demuxer.inner().fail_seek = true;

        assert!(fx.player.seek(0.5).is_err());

        assert!(!fx.player.is_paused());
        assert_eq!(fx.demuxer.inner().pause_history.last(), Some(&false));
    }

    #[test]
    fn seek_without_video_decoder_skips_the_packet_loop() {
        let demuxer = demuxer_for(10_000);
        demuxer.inner().packets = VecDeque::from(vec![audio_packet(1), audio_packet(2)]);
        let player = Player::new(
            EngineConfig::default(),
            Collaborators {
                demuxer: Some(Box::new(demuxer.clone())),
                ..Collaborators::default()
            },
        );
        player.open(Path::new("movie.mp4")).unwrap();

        player.seek(0.5).unwrap();

        // No frame-precise loop without video: the packets stay queued.
        assert_eq!(demuxer.inner().packets.len(), 2);
        assert_eq!(demuxer.inner().seeked_to, Some(0.5));
    }

    // ==================== close ====================

    #[test]
    fn close_stops_clears_and_closes_everything() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.start().unwrap();

        fx.player.close();

        assert!(fx.demuxer.inner().stop_calls >= 1);
        assert!(fx.video.inner().stop_calls >= 1);
        assert!(fx.video.inner().clear_calls >= 1);
        assert!(fx.audio.inner().clear_calls >= 1);
        assert!(fx.sink.inner().clear_calls >= 1);
        assert!(fx.sink.inner().close_calls >= 1);
        assert!(fx.view.inner_close_calls() >= 1);
    }

    #[test]
    fn close_is_idempotent() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.close();
        fx.player.close();
    }

    #[test]
    fn drop_closes_the_session() {
        let fx = fixture(10_000);
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.start().unwrap();
        let sink = fx.sink.clone();

        drop(fx.player);

        assert!(sink.inner().close_calls >= 1);
    }

    // ==================== init_view ====================

    #[test]
    fn init_view_closes_the_prior_binding_first() {
        let fx = fixture(10_000);
        fx.player.init_view(test_window());

        assert_eq!(fx.view.inner_close_calls(), 1);
        assert_eq!(fx.view.inner_set_render_calls(), 1);
    }

    // ==================== pause/sync stress ====================

    #[test]
    fn pause_toggling_races_cleanly_with_sync_ticks_and_reopens() {
        let config = EngineConfig {
            sync_interval_ms: 1,
            ..EngineConfig::default()
        };
        let fx = fixture_with(config, demuxer_for(10_000));
        fx.player.open(Path::new("movie.mp4")).unwrap();
        fx.player.start().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..50 {
                    fx.player.set_pause(i % 2 == 0);
                    std::thread::sleep(Duration::from_millis(1));
                }
            });
            for _ in 0..10 {
                // Reopening swaps session state under the controller lock
                // while the sync loop and pause toggles are live.
                fx.player.open(Path::new("movie.mp4")).unwrap();
                fx.player.start().unwrap();
                let _ = fx.player.play_pos();
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        fx.player.close();
    }

    // ==================== helpers ====================

    impl ScriptedView {
        fn inner_close_calls(&self) -> usize {
            self.0.lock().unwrap().close_calls
        }

        fn inner_set_render_calls(&self) -> usize {
            self.0.lock().unwrap().set_render_calls
        }
    }

    fn test_window() -> SharedWindow {
        use raw_window_handle::{
            DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
        };

        struct HeadlessWindow;

        impl HasWindowHandle for HeadlessWindow {
            fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
                Err(HandleError::Unavailable)
            }
        }

        impl HasDisplayHandle for HeadlessWindow {
            fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
                Err(HandleError::Unavailable)
            }
        }

        impl crate::port::RenderWindow for HeadlessWindow {
            fn surface_size(&self) -> (u32, u32) {
                (640, 360)
            }
        }

        Arc::new(HeadlessWindow)
    }
}
