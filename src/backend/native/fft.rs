// FFT DSP unit
//
// The mixer pushes a voice's post-volume output into a lock-free queue.
// On every engine update the unit drains that queue into a rolling window
// on the main thread and turns the window into a per-channel magnitude
// spectrum.

use crate::backend::{ChannelId, FftSpectrum};
use rtrb::{Consumer, Producer, RingBuffer};
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Rolling window of the last `window_size` output frames, one lane per channel.
#[derive(Debug)]
struct CaptureRing {
    lanes: Vec<Vec<f32>>,
    write_pos: usize,
    filled: usize,
}

impl CaptureRing {
    pub fn new(window_size: usize, channels: u16) -> Self {
        Self {
            lanes: vec![vec![0.0; window_size]; channels as usize],
            write_pos: 0,
            filled: 0,
        }
    }

    fn window_size(&self) -> usize {
        self.lanes.first().map(Vec::len).unwrap_or(0)
    }

    #[inline]
    pub fn write(&mut self, channel: usize, value: f32) {
        if let Some(lane) = self.lanes.get_mut(channel) {
            lane[self.write_pos] = value;
        }
    }

    /// Commit the frame written since the last call
    #[inline]
    pub fn advance(&mut self) {
        let window_size = self.window_size();
        if window_size == 0 {
            return;
        }
        self.write_pos = (self.write_pos + 1) % window_size;
        self.filled = (self.filled + 1).min(window_size);
    }

    pub fn is_full(&self) -> bool {
        self.filled > 0 && self.filled == self.window_size()
    }

    /// Copy a lane out oldest-first
    fn unroll(&self, channel: usize, out: &mut Vec<f32>) {
        out.clear();
        let lane = &self.lanes[channel];
        out.extend_from_slice(&lane[self.write_pos..]);
        out.extend_from_slice(&lane[..self.write_pos]);
    }

    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.fill(0.0);
        }
        self.write_pos = 0;
        self.filled = 0;
    }
}

/// Hann-windowed magnitude spectrum of a fixed-size frame
pub(crate) struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    /// Scale so a full-scale sine peaks near 1.0
    normalization: f32,
}

impl FftProcessor {
    pub fn new(fft_size: usize) -> Self {
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();
        let window_sum: f32 = window.iter().sum();

        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            window,
            normalization: 2.0 / window_sum,
        }
    }

    /// Number of bins produced per channel
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    pub fn compute_magnitude_spectrum(&self, audio: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = (0..self.fft_size)
            .map(|i| {
                let sample = audio.get(i).copied().unwrap_or(0.0);
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();

        self.fft.process(&mut buffer);

        buffer[..self.bins()]
            .iter()
            .map(|c| c.norm() * self.normalization)
            .collect()
    }
}

/// Audio-thread end of an FFT unit's capture queue.
///
/// Samples of one frame are staged first and pushed together, so the queue
/// only ever holds whole frames. A frame that does not fit is counted and
/// dropped.
pub(crate) struct CaptureTap {
    producer: Producer<f32>,
    frame: Vec<f32>,
    dropped: Arc<AtomicUsize>,
}

impl CaptureTap {
    #[inline]
    pub fn stage(&mut self, channel: usize, value: f32) {
        if let Some(slot) = self.frame.get_mut(channel) {
            *slot = value;
        }
    }

    /// Push the staged frame
    #[inline]
    pub fn commit(&mut self) {
        if self.producer.slots() < self.frame.len() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        for &value in &self.frame {
            let _ = self.producer.push(value);
        }
    }
}

impl fmt::Debug for CaptureTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureTap")
            .field("channels", &self.frame.len())
            .field("free_slots", &self.producer.slots())
            .finish()
    }
}

/// One FFT analysis unit as seen by the backend
pub(crate) struct FftUnit {
    processor: FftProcessor,
    channels: usize,
    /// Frames the queue holds before the audio thread starts dropping
    queue_frames: usize,
    consumer: Option<Consumer<f32>>,
    dropped: Arc<AtomicUsize>,
    window: CaptureRing,
    frames_captured: u64,
    latest: Option<FftSpectrum>,
    pub attached: Option<ChannelId>,
    scratch: Vec<f32>,
}

impl FftUnit {
    pub fn new(window_size: usize, channels: u16, queue_frames: usize) -> Self {
        Self {
            processor: FftProcessor::new(window_size),
            channels: channels as usize,
            queue_frames: queue_frames.max(window_size),
            consumer: None,
            dropped: Arc::new(AtomicUsize::new(0)),
            window: CaptureRing::new(window_size, channels),
            frames_captured: 0,
            latest: None,
            attached: None,
            scratch: Vec::with_capacity(window_size),
        }
    }

    /// Start a fresh capture and hand out the producer end.
    ///
    /// Any previous tap is orphaned and the window starts empty.
    pub fn open_tap(&mut self) -> CaptureTap {
        let capacity = (self.queue_frames * self.channels).max(1);
        let (producer, consumer) = RingBuffer::<f32>::new(capacity);
        self.consumer = Some(consumer);
        self.dropped = Arc::new(AtomicUsize::new(0));
        self.window.clear();
        self.frames_captured = 0;
        self.latest = None;

        CaptureTap {
            producer,
            frame: vec![0.0; self.channels],
            dropped: self.dropped.clone(),
        }
    }

    pub fn close_tap(&mut self) {
        self.consumer = None;
    }

    pub fn latest(&self) -> Option<&FftSpectrum> {
        self.latest.as_ref()
    }

    /// Total frames moved from the queue into the window since the tap opened
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Drain queued frames into the window and recompute the spectrum.
    pub fn refresh(&mut self) {
        if let Some(consumer) = self.consumer.as_mut() {
            while self.channels > 0 && consumer.slots() >= self.channels {
                for channel in 0..self.channels {
                    let value = consumer.pop().unwrap_or(0.0);
                    self.window.write(channel, value);
                }
                self.window.advance();
                self.frames_captured += 1;
            }
        }

        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!("FFT capture queue full, dropped {} frames", dropped);
        }

        if !self.window.is_full() {
            return;
        }

        let mut spectrum = Vec::with_capacity(self.channels);
        for channel in 0..self.channels {
            self.window.unroll(channel, &mut self.scratch);
            spectrum.push(self.processor.compute_magnitude_spectrum(&self.scratch));
        }

        self.latest = Some(FftSpectrum {
            length: self.processor.bins(),
            spectrum,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn sine_peaks_in_expected_bin() {
        let processor = FftProcessor::new(1024);
        // bin 32 of a 1024-point FFT at 48 kHz
        let frequency = 32.0 * 48000.0 / 1024.0;
        let spectrum = processor.compute_magnitude_spectrum(&sine(frequency, 48000.0, 1024));

        assert_eq!(spectrum.len(), 512);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 32);
        approx::assert_abs_diff_eq!(spectrum[32], 1.0, epsilon = 0.05);
    }

    #[test]
    fn silence_is_flat_zero() {
        let processor = FftProcessor::new(256);
        let spectrum = processor.compute_magnitude_spectrum(&[0.0; 256]);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn ring_unrolls_oldest_first() {
        let mut ring = CaptureRing::new(4, 1);
        for value in 1..=6 {
            ring.write(0, value as f32);
            ring.advance();
        }
        assert!(ring.is_full());

        let mut out = Vec::new();
        ring.unroll(0, &mut out);
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0]);

        ring.clear();
        assert!(!ring.is_full());
    }

    #[test]
    fn unit_reports_nothing_until_window_is_full() {
        let mut unit = FftUnit::new(64, 2, 128);
        unit.refresh();
        assert!(unit.latest().is_none());

        let mut tap = unit.open_tap();
        for _ in 0..64 {
            tap.stage(0, 0.5);
            tap.stage(1, -0.5);
            tap.commit();
        }
        unit.refresh();

        let spectrum = unit.latest().unwrap();
        assert_eq!(spectrum.length, 32);
        assert_eq!(spectrum.num_channels(), 2);
    }

    #[test]
    fn full_queue_drops_whole_frames() {
        let mut unit = FftUnit::new(4, 2, 4);
        let mut tap = unit.open_tap();
        for value in 1..=6 {
            tap.stage(0, value as f32);
            tap.stage(1, -(value as f32));
            tap.commit();
        }
        assert_eq!(unit.dropped.load(Ordering::Relaxed), 2);
        unit.refresh();

        assert_eq!(unit.frames_captured(), 4);
        // The four frames that fit arrive intact and in order
        let mut left = Vec::new();
        let mut right = Vec::new();
        unit.window.unroll(0, &mut left);
        unit.window.unroll(1, &mut right);
        assert_eq!(left, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(right, vec![-1.0, -2.0, -3.0, -4.0]);
        assert_eq!(unit.dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn capture_continues_while_the_unit_refreshes() {
        const FRAMES: usize = 50_000;
        let mut unit = FftUnit::new(256, 2, FRAMES);
        let mut tap = unit.open_tap();

        let writer = std::thread::spawn(move || {
            for i in 0..FRAMES {
                tap.stage(0, i as f32);
                tap.stage(1, -(i as f32));
                tap.commit();
            }
        });
        while !writer.is_finished() {
            unit.refresh();
        }
        writer.join().unwrap();
        unit.refresh();

        assert_eq!(unit.frames_captured(), FRAMES as u64);
        let mut left = Vec::new();
        unit.window.unroll(0, &mut left);
        let expected: Vec<f32> = (FRAMES - 256..FRAMES).map(|i| i as f32).collect();
        assert_eq!(left, expected);
    }

    #[test]
    fn reopening_the_tap_starts_an_empty_window() {
        let mut unit = FftUnit::new(4, 1, 8);
        let mut first = unit.open_tap();
        for _ in 0..4 {
            first.stage(0, 1.0);
            first.commit();
        }
        unit.refresh();
        assert!(unit.latest().is_some());

        let mut second = unit.open_tap();
        // Writes through the orphaned tap never reach the unit
        first.stage(0, 1.0);
        first.commit();
        second.stage(0, 0.25);
        second.commit();
        unit.refresh();

        assert!(unit.latest().is_none());
        assert_eq!(unit.frames_captured(), 1);
    }
}
