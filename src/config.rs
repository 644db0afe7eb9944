//! Configuration for Soundstage

use crate::error::{Result, SoundstageError};
use crate::platform::Platform;
use std::time::Duration;

/// Default number of simultaneously allocated channels.
pub const DEFAULT_MAX_CHANNELS: u32 = 512;

/// Where the engine sends its mixed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Open the default output device.
    #[default]
    Device,
    /// No device; every `update()` tick renders one block internally.
    NoSound,
}

/// Configuration descriptor for a Soundstage session
#[derive(Debug, Clone)]
pub struct SoundstageSessionDesc {
    /// Channel budget handed to the engine on initialization
    pub max_channels: u32,
    pub output: OutputMode,
    /// Mixer sample rate; loaded sounds are resampled to it
    pub sample_rate: u32,
    /// Number of output channels (typically 2 for stereo)
    pub channels: u16,
    /// Frames rendered per block (device buffer size, or per tick in `NoSound` mode)
    pub block_size: usize,
    /// FFT window length in frames; must be a power of two
    pub fft_window_size: usize,
    /// Root prepended to relative paths (None = directory of the running executable)
    pub resource_root: Option<String>,
    /// Platform override (None = compile-time target)
    pub platform: Option<Platform>,
}

impl Default for SoundstageSessionDesc {
    fn default() -> Self {
        Self {
            max_channels: DEFAULT_MAX_CHANNELS,
            output: OutputMode::Device,
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
            fft_window_size: 2048,
            resource_root: None,
            platform: None,
        }
    }
}

impl SoundstageSessionDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_channels(mut self, max: u32) -> Self {
        self.max_channels = max;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn fft_window_size(mut self, size: usize) -> Self {
        self.fft_window_size = size;
        self
    }

    pub fn resource_root(mut self, root: impl Into<String>) -> Self {
        self.resource_root = Some(root.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_channels == 0 {
            return Err(SoundstageError::Configuration(
                "max_channels must be greater than 0".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(SoundstageError::Configuration(
                "sample_rate must be greater than 0".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(SoundstageError::Configuration(
                "channels must be greater than 0".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(SoundstageError::Configuration(
                "block_size must be greater than 0".to_string(),
            ));
        }
        if self.fft_window_size < 64 || !self.fft_window_size.is_power_of_two() {
            return Err(SoundstageError::Configuration(format!(
                "fft_window_size must be a power of two >= 64 (got {})",
                self.fft_window_size
            )));
        }
        Ok(())
    }
}

/// Loop behaviour of a sound or channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play once and end
    #[default]
    Off,
    /// Wrap to the start; the loop count decides how many times
    Normal,
}

/// Load mode for a single sound.
///
/// The default is a plain one-shot: no looping, full length, original channel layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundMode {
    pub loop_mode: LoopMode,
    /// Maximum duration to decode (None = entire file)
    pub max_duration: Option<Duration>,
    /// Downmix to mono after decoding
    pub convert_to_mono: bool,
}

impl SoundMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn looping() -> Self {
        Self {
            loop_mode: LoopMode::Normal,
            ..Self::default()
        }
    }

    pub fn loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn convert_to_mono(mut self, convert: bool) -> Self {
        self.convert_to_mono = convert;
        self
    }
}
