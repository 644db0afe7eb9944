//! Native audio engine.
//!
//! Sounds are decoded up front with symphonia and resampled to the mixer rate
//! with rubato. Playing a sound allocates a [`Voice`](voice::Voice) in a voice
//! table shared with the mixer, which runs either inside a cpal output stream
//! ([`OutputMode::Device`]) or once per `update()` on the calling thread
//! ([`OutputMode::NoSound`]). FFT units tap a voice's output through a lock-free
//! queue and are drained on every `update()`.

mod decoder;
mod fft;
mod mixer;
mod output;
mod resampler;
mod sample_data;
mod voice;

use crate::backend::{
    AudioBackend, BackendResult, ChannelId, DspId, FftSpectrum, SoundResourceId,
};
use crate::config::{LoopMode, OutputMode, SoundMode, SoundstageSessionDesc};
use crate::error::BackendError;
use crossbeam_channel::{Receiver, Sender};
use fft::FftUnit;
use mixer::VoiceTable;
use sample_data::SampleData;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, MutexGuard};
use voice::Voice;

struct LoadedSound {
    data: Arc<SampleData>,
    loop_mode: LoopMode,
}

struct BackendState {
    initialized: bool,
    output: OutputMode,
    max_channels: u32,
    next_handle: u64,
    sounds: HashMap<SoundResourceId, LoadedSound>,
    dsps: HashMap<DspId, FftUnit>,
}

impl BackendState {
    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn ensure_initialized(&self) -> BackendResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(BackendError::NotInitialized)
        }
    }
}

/// Audio engine built on symphonia, rubato, cpal and rustfft
pub struct NativeBackend {
    desc: SoundstageSessionDesc,
    state: RefCell<BackendState>,
    voices: Arc<VoiceTable>,
    ended_tx: Sender<ChannelId>,
    ended_rx: Receiver<ChannelId>,
    stream: RefCell<Option<cpal::Stream>>,
    /// Render target for `NoSound` ticks
    scratch: RefCell<Vec<f32>>,
}

impl NativeBackend {
    pub fn new(desc: SoundstageSessionDesc) -> BackendResult<Self> {
        desc.validate()
            .map_err(|e| BackendError::Configuration(e.to_string()))?;

        let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
        let scratch = vec![0.0; desc.block_size * desc.channels as usize];

        Ok(Self {
            state: RefCell::new(BackendState {
                initialized: false,
                output: desc.output,
                max_channels: desc.max_channels,
                next_handle: 1,
                sounds: HashMap::new(),
                dsps: HashMap::new(),
            }),
            desc,
            voices: Arc::new(VoiceTable::default()),
            ended_tx,
            ended_rx,
            stream: RefCell::new(None),
            scratch: RefCell::new(scratch),
        })
    }

    pub fn desc(&self) -> &SoundstageSessionDesc {
        &self.desc
    }

    /// Channels currently allocated (playing or paused)
    pub fn active_channels(&self) -> usize {
        self.voices
            .lock()
            .map(|voices| voices.values().filter(|v| !v.is_ended()).count())
            .unwrap_or(0)
    }

    fn lock_voices(&self) -> BackendResult<MutexGuard<'_, HashMap<ChannelId, voice::Voice>>> {
        self.voices
            .lock()
            .map_err(|_| BackendError::Output("Voice table lock poisoned".to_string()))
    }

    fn with_voice<T>(
        &self,
        channel: ChannelId,
        f: impl FnOnce(&mut Voice) -> T,
    ) -> BackendResult<T> {
        self.state.borrow().ensure_initialized()?;
        let mut voices = self.lock_voices()?;
        match voices.get_mut(&channel) {
            Some(voice) if !voice.is_ended() => Ok(f(voice)),
            _ => Err(BackendError::InvalidHandle(channel.to_string())),
        }
    }

    /// Remove voices the mixer reported as ended since the last tick
    fn reap_ended_voices(&self) -> BackendResult<()> {
        let ended: Vec<ChannelId> = self.ended_rx.try_iter().collect();
        if ended.is_empty() {
            return Ok(());
        }

        let mut voices = self.lock_voices()?;
        for channel in ended {
            if voices.remove(&channel).is_some() {
                log::debug!("{} ended and was released", channel);
            }
        }
        Ok(())
    }
}

impl AudioBackend for NativeBackend {
    fn init(&self, max_channels: u32, output: OutputMode) -> BackendResult<()> {
        let mut state = self.state.borrow_mut();
        if state.initialized {
            log::warn!("Native backend already initialized");
            return Ok(());
        }

        if max_channels == 0 {
            return Err(BackendError::Configuration(
                "max_channels must be greater than 0".to_string(),
            ));
        }

        if output == OutputMode::Device {
            let config = output::OutputConfig {
                sample_rate: self.desc.sample_rate,
                channels: self.desc.channels,
                block_size: self.desc.block_size,
            };
            let stream =
                output::open_output_stream(&config, self.voices.clone(), self.ended_tx.clone())?;
            *self.stream.borrow_mut() = Some(stream);
        }

        state.max_channels = max_channels;
        state.output = output;
        state.initialized = true;
        log::info!(
            "Native backend initialized: {} channels, {:?} output",
            max_channels,
            output
        );
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    fn update(&self) -> BackendResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_initialized()?;

        if state.output == OutputMode::NoSound {
            let mut scratch = self.scratch.borrow_mut();
            mixer::mix_voices(&mut scratch, self.desc.channels, &self.voices, &self.ended_tx);
        }

        self.reap_ended_voices()?;

        for unit in state.dsps.values_mut() {
            unit.refresh();
        }
        Ok(())
    }

    fn create_sound(&self, path: &str, mode: &SoundMode) -> BackendResult<SoundResourceId> {
        self.state.borrow().ensure_initialized()?;

        let data = decoder::decode_file(path, mode, self.desc.sample_rate)?;

        let mut state = self.state.borrow_mut();
        let id = SoundResourceId(state.next_handle());
        state.sounds.insert(
            id,
            LoadedSound {
                data: Arc::new(data),
                loop_mode: mode.loop_mode,
            },
        );
        log::debug!("Created {} from {}", id, path);
        Ok(id)
    }

    fn release_sound(&self, sound: SoundResourceId) -> BackendResult<()> {
        let mut state = self.state.borrow_mut();
        if state.sounds.remove(&sound).is_none() {
            return Err(BackendError::InvalidHandle(sound.to_string()));
        }

        // Releasing a sound stops every channel still playing it
        let mut voices = self.lock_voices()?;
        voices.retain(|_, voice| voice.sound != sound);
        log::debug!("Released {}", sound);
        Ok(())
    }

    fn play_sound(&self, sound: SoundResourceId, paused: bool) -> BackendResult<ChannelId> {
        let mut state = self.state.borrow_mut();
        state.ensure_initialized()?;

        let loaded = state
            .sounds
            .get(&sound)
            .ok_or_else(|| BackendError::InvalidHandle(sound.to_string()))?;
        let data = loaded.data.clone();
        let loop_mode = loaded.loop_mode;

        let mut voices = self.lock_voices()?;
        let active = voices.values().filter(|v| !v.is_ended()).count();
        if active >= state.max_channels as usize {
            return Err(BackendError::ChannelLimit(state.max_channels));
        }

        let id = ChannelId(state.next_handle());
        voices.insert(id, Voice::new(id, sound, data, loop_mode, paused));
        log::debug!("{} playing {} (paused: {})", id, sound, paused);
        Ok(id)
    }

    fn stop_channel(&self, channel: ChannelId) -> BackendResult<()> {
        self.state.borrow().ensure_initialized()?;
        let mut voices = self.lock_voices()?;
        match voices.remove(&channel) {
            Some(voice) if !voice.is_ended() => {
                log::debug!("{} stopped", channel);
                Ok(())
            }
            _ => Err(BackendError::InvalidHandle(channel.to_string())),
        }
    }

    fn set_channel_paused(&self, channel: ChannelId, paused: bool) -> BackendResult<()> {
        self.with_voice(channel, |voice| voice.paused = paused)
    }

    fn channel_paused(&self, channel: ChannelId) -> BackendResult<bool> {
        self.with_voice(channel, |voice| voice.paused)
    }

    fn set_channel_volume(&self, channel: ChannelId, volume: f32) -> BackendResult<()> {
        self.with_voice(channel, |voice| voice.volume = volume)
    }

    fn channel_volume(&self, channel: ChannelId) -> BackendResult<f32> {
        self.with_voice(channel, |voice| voice.volume)
    }

    fn set_channel_pitch(&self, channel: ChannelId, pitch: f32) -> BackendResult<()> {
        self.with_voice(channel, |voice| voice.set_pitch(pitch))
    }

    fn channel_pitch(&self, channel: ChannelId) -> BackendResult<f32> {
        self.with_voice(channel, |voice| voice.pitch())
    }

    fn set_channel_position_ms(&self, channel: ChannelId, position_ms: u32) -> BackendResult<()> {
        self.with_voice(channel, |voice| voice.set_position_ms(position_ms))
    }

    fn channel_position_ms(&self, channel: ChannelId) -> BackendResult<u32> {
        self.with_voice(channel, |voice| voice.position_ms())
    }

    fn set_channel_loop_mode(&self, channel: ChannelId, mode: LoopMode) -> BackendResult<()> {
        self.with_voice(channel, |voice| voice.loop_mode = mode)
    }

    fn set_channel_loop_count(&self, channel: ChannelId, count: i32) -> BackendResult<()> {
        self.with_voice(channel, |voice| voice.loop_count = count.max(-1))
    }

    fn create_fft_dsp(&self) -> BackendResult<DspId> {
        let mut state = self.state.borrow_mut();
        state.ensure_initialized()?;

        let id = DspId(state.next_handle());
        // Half a second of queued output covers any realistic gap between updates
        let queue_frames = (self.desc.sample_rate as usize / 2).max(self.desc.block_size * 4);
        state.dsps.insert(
            id,
            FftUnit::new(self.desc.fft_window_size, self.desc.channels, queue_frames),
        );
        log::debug!("Created FFT {} ({} frame window)", id, self.desc.fft_window_size);
        Ok(id)
    }

    fn attach_dsp(&self, channel: ChannelId, dsp: DspId) -> BackendResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_initialized()?;

        let unit = state
            .dsps
            .get_mut(&dsp)
            .ok_or_else(|| BackendError::InvalidHandle(dsp.to_string()))?;

        let mut voices = self.lock_voices()?;
        match voices.get(&channel) {
            Some(voice) if !voice.is_ended() => {
                if voice.has_tap() && unit.attached != Some(channel) {
                    return Err(BackendError::Dsp(format!(
                        "{} already has an analysis unit attached",
                        channel
                    )));
                }
            }
            _ => return Err(BackendError::InvalidHandle(channel.to_string())),
        }

        if let Some(previous) = unit.attached.take() {
            if let Some(voice) = voices.get_mut(&previous) {
                voice.set_tap(None);
            }
        }

        if let Some(voice) = voices.get_mut(&channel) {
            voice.set_tap(Some(unit.open_tap()));
        }
        unit.attached = Some(channel);
        log::debug!("Attached FFT {} to {}", dsp, channel);
        Ok(())
    }

    fn fft_spectrum(&self, dsp: DspId) -> BackendResult<Option<FftSpectrum>> {
        let state = self.state.borrow();
        let unit = state
            .dsps
            .get(&dsp)
            .ok_or_else(|| BackendError::InvalidHandle(dsp.to_string()))?;
        Ok(unit.latest().cloned())
    }

    fn release_dsp(&self, dsp: DspId) -> BackendResult<()> {
        let mut state = self.state.borrow_mut();
        let mut unit = state
            .dsps
            .remove(&dsp)
            .ok_or_else(|| BackendError::InvalidHandle(dsp.to_string()))?;

        unit.close_tap();
        if let Some(channel) = unit.attached {
            let mut voices = self.lock_voices()?;
            if let Some(voice) = voices.get_mut(&channel) {
                voice.set_tap(None);
            }
        }
        log::debug!("Released FFT {}", dsp);
        Ok(())
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        if self.stream.get_mut().take().is_some() {
            log::debug!("Native backend output stream closed");
        }
    }
}
