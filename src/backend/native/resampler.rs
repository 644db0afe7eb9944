// Offline sample-rate conversion for decoded sounds.
//
// Sounds are converted once at load time so the mixer only ever steps
// through PCM at its own rate.

use crate::backend::BackendResult;
use crate::error::BackendError;
use rubato::{FftFixedIn, Resampler};

const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts whole interleaved buffers between two fixed rates
pub(crate) struct RateConverter {
    from_rate: u32,
    to_rate: u32,
    channels: usize,
}

impl RateConverter {
    pub fn new(from_rate: u32, to_rate: u32, channels: u16) -> BackendResult<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(BackendError::Format(format!(
                "cannot convert {} Hz -> {} Hz",
                from_rate, to_rate
            )));
        }
        if channels == 0 {
            return Err(BackendError::Format("cannot convert zero channels".to_string()));
        }
        Ok(Self {
            from_rate,
            to_rate,
            channels: channels as usize,
        })
    }

    /// Output length for `frames` input frames, rounded up
    pub fn output_frames(&self, frames: usize) -> usize {
        (frames as u64 * self.to_rate as u64).div_ceil(self.from_rate as u64) as usize
    }

    pub fn convert(&self, interleaved: &[f32]) -> BackendResult<Vec<f32>> {
        if self.from_rate == self.to_rate {
            return Ok(interleaved.to_vec());
        }

        let frames = interleaved.len() / self.channels;
        let planar = self.deinterleave(interleaved, frames);

        let mut rubato = FftFixedIn::<f32>::new(
            self.from_rate as usize,
            self.to_rate as usize,
            CHUNK_FRAMES,
            SUB_CHUNKS,
            self.channels,
        )
        .map_err(|e| BackendError::Format(format!("resampler setup failed: {}", e)))?;

        let mut converted: Vec<Vec<f32>> = vec![Vec::new(); self.channels];
        let mut chunk: Vec<Vec<f32>> = vec![vec![0.0; CHUNK_FRAMES]; self.channels];
        let mut offset = 0;

        while offset < frames {
            let take = (frames - offset).min(CHUNK_FRAMES);
            for (lane, source) in chunk.iter_mut().zip(&planar) {
                lane[..take].copy_from_slice(&source[offset..offset + take]);
                // Pad the final chunk with silence; the surplus is cut below
                lane[take..].fill(0.0);
            }

            let out = rubato
                .process(&chunk, None)
                .map_err(|e| BackendError::Format(format!("resampling failed: {}", e)))?;
            for (lane, produced) in converted.iter_mut().zip(out) {
                lane.extend(produced);
            }
            offset += take;
        }

        let out_frames = converted
            .iter()
            .map(Vec::len)
            .min()
            .unwrap_or(0)
            .min(self.output_frames(frames));
        Ok(interleave(&converted, out_frames))
    }

    fn deinterleave(&self, interleaved: &[f32], frames: usize) -> Vec<Vec<f32>> {
        (0..self.channels)
            .map(|channel| {
                (0..frames)
                    .map(|frame| interleaved[frame * self.channels + channel])
                    .collect()
            })
            .collect()
    }
}

fn interleave(planar: &[Vec<f32>], frames: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        out.extend(planar.iter().map(|lane| lane[frame]));
    }
    out
}
