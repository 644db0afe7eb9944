use super::resampler::RateConverter;
use crate::backend::BackendResult;
use crate::error::BackendError;
use std::time::Duration;

/// Decoded PCM for one sound resource.
///
/// Samples are stored **interleaved** (`[L0, R0, L1, R1, ...]` for stereo),
/// the layout both symphonia and cpal hand us, so playback reads one frame at
/// a time without gathering from separate buffers.
#[derive(Debug, Clone)]
pub(crate) struct SampleData {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    total_frames: usize,
}

impl SampleData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let total_frames = samples.len() / channels.max(1) as usize;
        Self {
            samples,
            sample_rate,
            channels,
            total_frames,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames as f64 / self.sample_rate as f64)
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample at `frame` for `channel`; channels past the source layout read
    /// the last source channel so mono feeds every output channel.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        let channel = channel.min(channels - 1);
        self.samples[frame * channels + channel]
    }

    /// Downmix all channels to one
    pub fn to_mono(&self) -> Self {
        if self.channels == 1 {
            return self.clone();
        }

        let mono_samples: Vec<f32> = self
            .samples
            .chunks(self.channels as usize)
            .map(|frame| {
                let sum: f32 = frame.iter().sum();
                sum / self.channels as f32
            })
            .collect();

        Self::new(mono_samples, self.sample_rate, 1)
    }

    /// Resample to `target_sample_rate` using rubato
    pub fn resample(&self, target_sample_rate: u32) -> BackendResult<Self> {
        if target_sample_rate == self.sample_rate {
            return Ok(self.clone());
        }

        let converter = RateConverter::new(self.sample_rate, target_sample_rate, self.channels)?;
        let resampled = converter.convert(&self.samples)?;
        if resampled.is_empty() && !self.samples.is_empty() {
            return Err(BackendError::Format(
                "Resampling produced no output".to_string(),
            ));
        }

        Ok(Self::new(resampled, target_sample_rate, self.channels))
    }
}
