//! Engine capability interface.
//!
//! [`AudioBackend`] is everything the session and its sounds need from an
//! audio engine: sound resources, playback channels, FFT DSP units and the
//! periodic update tick. Handles are opaque, never reused, and only valid
//! for the backend that issued them.
//!
//! - [`NativeBackend`]: symphonia + rubato + cpal + rustfft implementation
//! - `MockBackend` (tests only): records channel state without audio

pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use crate::config::{LoopMode, OutputMode, SoundMode};
use crate::error::BackendError;
pub use native::NativeBackend;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Loaded sound resource owned by the backend
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SoundResourceId(pub(crate) u64);

/// Playback channel allocated by `play_sound`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub(crate) u64);

/// FFT analysis unit
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DspId(pub(crate) u64);

impl std::fmt::Display for SoundResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoundResourceId({})", self.0)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl std::fmt::Display for DspId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DspId({})", self.0)
    }
}

/// Magnitude spectrum reported by an FFT unit.
///
/// `spectrum[channel][bin]`, with `length` bins per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FftSpectrum {
    pub length: usize,
    pub spectrum: Vec<Vec<f32>>,
}

impl FftSpectrum {
    pub fn num_channels(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0 || self.spectrum.is_empty()
    }
}

/// Capability set consumed from the underlying audio engine.
///
/// Methods take `&self`; implementations keep their mutable state behind
/// interior mutability so sounds can share one backend through `Rc`.
pub trait AudioBackend {
    /// Initialize with a channel budget. Called once by the session.
    fn init(&self, max_channels: u32, output: OutputMode) -> BackendResult<()>;

    fn is_initialized(&self) -> bool;

    /// Advance internal mixing/streaming state. Called once per host frame.
    fn update(&self) -> BackendResult<()>;

    fn create_sound(&self, path: &str, mode: &SoundMode) -> BackendResult<SoundResourceId>;

    fn release_sound(&self, sound: SoundResourceId) -> BackendResult<()>;

    /// Allocate a fresh channel playing `sound` from the start.
    fn play_sound(&self, sound: SoundResourceId, paused: bool) -> BackendResult<ChannelId>;

    fn stop_channel(&self, channel: ChannelId) -> BackendResult<()>;

    fn set_channel_paused(&self, channel: ChannelId, paused: bool) -> BackendResult<()>;

    fn channel_paused(&self, channel: ChannelId) -> BackendResult<bool>;

    fn set_channel_volume(&self, channel: ChannelId, volume: f32) -> BackendResult<()>;

    fn channel_volume(&self, channel: ChannelId) -> BackendResult<f32>;

    fn set_channel_pitch(&self, channel: ChannelId, pitch: f32) -> BackendResult<()>;

    fn channel_pitch(&self, channel: ChannelId) -> BackendResult<f32>;

    fn set_channel_position_ms(&self, channel: ChannelId, position_ms: u32) -> BackendResult<()>;

    fn channel_position_ms(&self, channel: ChannelId) -> BackendResult<u32>;

    fn set_channel_loop_mode(&self, channel: ChannelId, mode: LoopMode) -> BackendResult<()>;

    /// `-1` loops forever, `0` plays once, `n` repeats `n` more times.
    fn set_channel_loop_count(&self, channel: ChannelId, count: i32) -> BackendResult<()>;

    fn create_fft_dsp(&self) -> BackendResult<DspId>;

    /// Insert the unit into the channel's signal path. A unit taps one channel
    /// at a time; attaching again moves it.
    fn attach_dsp(&self, channel: ChannelId, dsp: DspId) -> BackendResult<()>;

    /// Latest spectrum, or `None` before the unit has seen a full window.
    fn fft_spectrum(&self, dsp: DspId) -> BackendResult<Option<FftSpectrum>>;

    fn release_dsp(&self, dsp: DspId) -> BackendResult<()>;
}
