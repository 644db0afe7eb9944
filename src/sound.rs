//! Sound handles: one loaded asset, its playback channel and its analysis tap.

use crate::backend::{AudioBackend, BackendResult, ChannelId, DspId, SoundResourceId};
use crate::config::LoopMode;
use crate::error::{BackendError, Result, SoundstageError};
use crate::session::SoundId;
use crate::spectrum::{self, SpectrumChannel, SpectrumIter};
use std::rc::Rc;

/// Combined pause state of a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Playing,
    UserPaused,
    EngineForcedPaused,
    BothPaused,
}

impl PauseState {
    pub fn is_paused(self) -> bool {
        self != Self::Playing
    }
}

/// The two independent pause requests a sound tracks.
///
/// `user` is owned by the host's pause/resume calls, `engine` by the
/// session's force pause/resume. Neither side ever writes the other's flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseFlags {
    pub user: bool,
    pub engine: bool,
}

impl PauseFlags {
    /// The only place the channel's pause state is derived
    pub fn channel_paused(self) -> bool {
        self.user || self.engine
    }

    pub fn state(self) -> PauseState {
        match (self.user, self.engine) {
            (false, false) => PauseState::Playing,
            (true, false) => PauseState::UserPaused,
            (false, true) => PauseState::EngineForcedPaused,
            (true, true) => PauseState::BothPaused,
        }
    }
}

/// Spectrum analysis availability for a sound
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisStatus {
    /// Not played yet; the FFT unit is created on the first `play()`
    Pending,
    /// The FFT unit taps the current channel
    Attached,
    /// Creating or attaching the FFT unit failed; never retried
    Unavailable(BackendError),
}

/// A loaded, playable sound owned by a [`SoundstageSession`](crate::SoundstageSession).
pub struct SoundstageSound {
    id: SoundId,
    path: String,
    backend: Rc<dyn AudioBackend>,
    resource: SoundResourceId,
    channel: Option<ChannelId>,
    dsp: Option<DspId>,
    analysis: AnalysisStatus,
    flags: PauseFlags,
    loop_enabled: bool,
}

impl SoundstageSound {
    pub(crate) fn new(
        id: SoundId,
        path: String,
        backend: Rc<dyn AudioBackend>,
        resource: SoundResourceId,
        loop_enabled: bool,
    ) -> Self {
        Self {
            id,
            path,
            backend,
            resource,
            channel: None,
            dsp: None,
            analysis: AnalysisStatus::Pending,
            flags: PauseFlags::default(),
            loop_enabled,
        }
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    /// Resolved path the sound was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Start playback from the beginning on a fresh channel.
    ///
    /// Clears the user pause. If the session currently forces a pause, the
    /// channel starts paused and begins playing on force resume. A channel
    /// left over from a previous `play()` is stopped once the new one exists.
    pub fn play(&mut self) -> Result<()> {
        let flags = PauseFlags {
            user: false,
            engine: self.flags.engine,
        };

        let channel = self
            .backend
            .play_sound(self.resource, flags.channel_paused())
            .map_err(|e| {
                log::error!("{} play error! ({}) {}", self.id, e.code(), e);
                SoundstageError::Backend(e)
            })?;

        if let Some(previous) = self.channel.replace(channel) {
            if let Err(e) = self.backend.stop_channel(previous) {
                log::debug!("{} previous {} already gone: {}", self.id, previous, e);
            }
        }
        self.flags = flags;

        if let Err(e) = self.apply_loop(channel) {
            log::warn!("{} failed to apply loop mode ({}) {}", self.id, e.code(), e);
        }
        self.attach_analysis(channel);

        log::debug!("{} playing on {} (state: {:?})", self.id, channel, self.flags.state());
        Ok(())
    }

    fn apply_loop(&self, channel: ChannelId) -> BackendResult<()> {
        if self.loop_enabled {
            self.backend.set_channel_loop_mode(channel, LoopMode::Normal)?;
            self.backend.set_channel_loop_count(channel, -1)
        } else {
            self.backend.set_channel_loop_mode(channel, LoopMode::Off)?;
            self.backend.set_channel_loop_count(channel, 0)
        }
    }

    /// Create the FFT unit on first use and move it onto `channel`
    fn attach_analysis(&mut self, channel: ChannelId) {
        if matches!(self.analysis, AnalysisStatus::Unavailable(_)) {
            return;
        }

        let dsp = match self.dsp {
            Some(dsp) => dsp,
            None => match self.backend.create_fft_dsp() {
                Ok(dsp) => {
                    self.dsp = Some(dsp);
                    dsp
                }
                Err(e) => {
                    log::error!("{} FFT DSP error! ({}) {}", self.id, e.code(), e);
                    self.analysis = AnalysisStatus::Unavailable(e);
                    return;
                }
            },
        };

        match self.backend.attach_dsp(channel, dsp) {
            Ok(()) => self.analysis = AnalysisStatus::Attached,
            Err(e) => {
                log::error!("{} FFT attach error! ({}) {}", self.id, e.code(), e);
                if let Some(dsp) = self.dsp.take() {
                    let _ = self.backend.release_dsp(dsp);
                }
                self.analysis = AnalysisStatus::Unavailable(e);
            }
        }
    }

    /// Stop the active channel. The sound stays loaded and can be played again.
    pub fn stop(&mut self) -> Result<()> {
        let channel = self.channel.take().ok_or(SoundstageError::NoActiveChannel(self.id))?;
        self.backend
            .stop_channel(channel)
            .map_err(|e| self.channel_error(e))?;
        log::debug!("{} stopped {}", self.id, channel);
        Ok(())
    }

    /// User pause
    pub fn pause(&mut self) {
        self.flags.user = true;
        self.reconcile();
    }

    /// Clear the user pause. The channel keeps waiting while a forced pause is active.
    pub fn resume(&mut self) {
        self.flags.user = false;
        self.reconcile();
    }

    /// Forced pause from the session. Returns false when nothing changed.
    pub(crate) fn set_engine_paused(&mut self, paused: bool) -> bool {
        if self.flags.engine == paused {
            return false;
        }
        self.flags.engine = paused;
        self.reconcile();
        true
    }

    fn reconcile(&self) {
        let Some(channel) = self.channel else {
            return;
        };
        let paused = self.flags.channel_paused();
        match self.backend.set_channel_paused(channel, paused) {
            Ok(()) => log::debug!("{} {:?}", self.id, self.flags.state()),
            // Ended channels have nothing left to pause
            Err(e) => log::debug!("{} could not set paused={} on {}: {}", self.id, paused, channel, e),
        }
    }

    /// User pause flag
    pub fn is_paused(&self) -> bool {
        self.flags.user
    }

    /// Forced pause flag
    pub fn is_engine_paused(&self) -> bool {
        self.flags.engine
    }

    pub fn pause_flags(&self) -> PauseFlags {
        self.flags
    }

    pub fn pause_state(&self) -> PauseState {
        self.flags.state()
    }

    /// Pause state as reported by the engine for the active channel
    pub fn is_channel_paused(&self) -> Result<bool> {
        self.with_channel(|backend, channel| backend.channel_paused(channel))
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.with_channel(|backend, channel| backend.set_channel_volume(channel, volume))
    }

    pub fn volume(&self) -> Result<f32> {
        self.with_channel(|backend, channel| backend.channel_volume(channel))
    }

    pub fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.with_channel(|backend, channel| backend.set_channel_pitch(channel, pitch))
    }

    pub fn pitch(&self) -> Result<f32> {
        self.with_channel(|backend, channel| backend.channel_pitch(channel))
    }

    /// Seek the active channel, in seconds
    pub fn set_current_time(&mut self, seconds: f32) -> Result<()> {
        let position_ms = (seconds.max(0.0) * 1000.0).round() as u32;
        self.with_channel(|backend, channel| backend.set_channel_position_ms(channel, position_ms))
    }

    /// Position of the active channel in seconds, at millisecond resolution
    pub fn current_time(&self) -> Result<f32> {
        let position_ms =
            self.with_channel(|backend, channel| backend.channel_position_ms(channel))?;
        Ok(position_ms as f32 / 1000.0)
    }

    /// Loop forever when enabled, play once when disabled.
    ///
    /// Stored for every future `play()` and applied to the active channel if
    /// there is one.
    pub fn set_loop_enabled(&mut self, enabled: bool) -> Result<()> {
        self.loop_enabled = enabled;
        match self.channel {
            Some(channel) => self.apply_loop(channel).map_err(|e| self.channel_error(e)),
            None => Ok(()),
        }
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn analysis_status(&self) -> &AnalysisStatus {
        &self.analysis
    }

    /// Snapshot of the latest analysis window.
    ///
    /// Empty when analysis is unavailable or has not produced a full window yet.
    pub fn fft_spectrum(&self, channel: SpectrumChannel) -> SpectrumIter {
        let Some(dsp) = self.dsp else {
            return SpectrumIter::empty();
        };
        match self.backend.fft_spectrum(dsp) {
            Ok(Some(result)) => SpectrumIter::new(spectrum::combine(&result, channel)),
            Ok(None) => SpectrumIter::empty(),
            Err(e) => {
                log::warn!("{} spectrum error! ({}) {}", self.id, e.code(), e);
                SpectrumIter::empty()
            }
        }
    }

    /// Mean magnitude of [`fft_spectrum`](Self::fft_spectrum), 0 when empty
    pub fn average_spectrum_amplitude(&self, channel: SpectrumChannel) -> f32 {
        spectrum::average(self.fft_spectrum(channel))
    }

    fn with_channel<T>(
        &self,
        f: impl FnOnce(&dyn AudioBackend, ChannelId) -> BackendResult<T>,
    ) -> Result<T> {
        let channel = self.channel.ok_or(SoundstageError::NoActiveChannel(self.id))?;
        f(self.backend.as_ref(), channel).map_err(|e| self.channel_error(e))
    }

    /// A channel the engine no longer knows has finished playing
    fn channel_error(&self, error: BackendError) -> SoundstageError {
        match error {
            BackendError::InvalidHandle(_) => SoundstageError::NoActiveChannel(self.id),
            other => SoundstageError::Backend(other),
        }
    }
}

impl Drop for SoundstageSound {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            // Fine if it already ended
            let _ = self.backend.stop_channel(channel);
        }
        if let Some(dsp) = self.dsp.take() {
            if let Err(e) = self.backend.release_dsp(dsp) {
                log::warn!("{} failed to release {}: {}", self.id, dsp, e);
            }
        }
        if let Err(e) = self.backend.release_sound(self.resource) {
            log::warn!("{} failed to release {}: {}", self.id, self.resource, e);
        }
        log::debug!("{} destroyed", self.id);
    }
}

impl std::fmt::Debug for SoundstageSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundstageSound")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("channel", &self.channel)
            .field("flags", &self.flags)
            .field("loop_enabled", &self.loop_enabled)
            .field("analysis", &self.analysis)
            .finish()
    }
}
