//! A single playing channel inside the native mixer.

use super::fft::CaptureTap;
use super::sample_data::SampleData;
use crate::backend::{ChannelId, SoundResourceId};
use crate::config::LoopMode;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Voice {
    pub id: ChannelId,
    pub sound: SoundResourceId,
    data: Arc<SampleData>,
    /// Fractional frame position, advanced by `pitch` per output frame
    cursor: f64,
    pub paused: bool,
    pub volume: f32,
    pitch: f32,
    pub loop_mode: LoopMode,
    /// `-1` forever, `0` no more repeats, `n` repeats left
    pub loop_count: i32,
    tap: Option<CaptureTap>,
    ended: bool,
    end_reported: bool,
}

impl Voice {
    pub fn new(
        id: ChannelId,
        sound: SoundResourceId,
        data: Arc<SampleData>,
        loop_mode: LoopMode,
        paused: bool,
    ) -> Self {
        Self {
            id,
            sound,
            data,
            cursor: 0.0,
            paused,
            volume: 1.0,
            pitch: 1.0,
            loop_mode,
            loop_count: -1,
            tap: None,
            ended: false,
            end_reported: false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.max(0.0);
    }

    /// Position in whole milliseconds, rounded down.
    pub fn position_ms(&self) -> u32 {
        let rate = self.data.sample_rate().max(1) as u64;
        let frame = self.cursor.min(self.data.total_frames() as f64) as u64;
        (frame * 1000 / rate) as u32
    }

    /// Seek to the first frame at or after `position_ms`, so reading the
    /// position back yields the same millisecond.
    pub fn set_position_ms(&mut self, position_ms: u32) {
        let rate = self.data.sample_rate() as u64;
        let frame = (position_ms as u64 * rate).div_ceil(1000);
        self.cursor = frame.min(self.data.total_frames() as u64) as f64;
        log::debug!("{} seek to {} ms (frame {})", self.id, position_ms, frame);
    }

    pub fn set_tap(&mut self, tap: Option<CaptureTap>) {
        self.tap = tap;
    }

    pub fn has_tap(&self) -> bool {
        self.tap.is_some()
    }

    /// Take the end notification once; the mixer forwards it to the main thread.
    pub fn take_end_notification(&mut self) -> bool {
        if self.ended && !self.end_reported {
            self.end_reported = true;
            true
        } else {
            false
        }
    }

    /// Wrap the cursor if looping is allowed, otherwise mark the voice ended.
    /// Returns false when playback is over.
    fn handle_end(&mut self) -> bool {
        let total = self.data.total_frames() as f64;
        if self.loop_mode == LoopMode::Normal && self.loop_count != 0 && total > 0.0 {
            self.cursor %= total;
            if self.loop_count > 0 {
                self.loop_count -= 1;
            }
            log::trace!("{} looped ({} repeats left)", self.id, self.loop_count);
            true
        } else {
            self.ended = true;
            false
        }
    }

    /// Mix this voice into an interleaved buffer.
    ///
    /// Returns the number of frames written. Paused and ended voices write
    /// nothing and keep their position.
    pub fn mix_into(&mut self, buffer: &mut [f32], channels: u16) -> usize {
        if self.ended || self.paused {
            return 0;
        }

        let channels = channels as usize;
        let frame_count = buffer.len() / channels;
        let total_frames = self.data.total_frames();

        let mut frames_filled = 0;
        for frame_idx in 0..frame_count {
            if self.cursor >= total_frames as f64 && !self.handle_end() {
                break;
            }

            let source_frame = self.cursor as usize;
            for channel in 0..channels {
                let value = self.data.sample(source_frame, channel) * self.volume;
                buffer[frame_idx * channels + channel] += value;
                if let Some(tap) = self.tap.as_mut() {
                    tap.stage(channel, value);
                }
            }
            if let Some(tap) = self.tap.as_mut() {
                tap.commit();
            }

            self.cursor += self.pitch as f64;
            frames_filled += 1;
        }

        // A one-shot that lands exactly on its last frame ends now, not next block
        if self.cursor >= total_frames as f64 && self.loop_mode == LoopMode::Off {
            self.ended = true;
        }

        frames_filled
    }
}
