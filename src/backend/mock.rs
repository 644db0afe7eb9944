//! In-memory backend for unit tests: records every channel operation and
//! lets tests inject failures and spectrum data.

use crate::backend::{
    AudioBackend, BackendResult, ChannelId, DspId, FftSpectrum, SoundResourceId,
};
use crate::config::{LoopMode, OutputMode, SoundMode};
use crate::error::BackendError;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockChannel {
    pub sound: SoundResourceId,
    pub paused: bool,
    pub volume: f32,
    pub pitch: f32,
    pub position_ms: u32,
    pub loop_mode: LoopMode,
    pub loop_count: i32,
    pub stopped: bool,
    pub dsp: Option<DspId>,
}

#[derive(Default)]
pub(crate) struct MockBackend {
    pub fail_init: Cell<bool>,
    pub fail_play: Cell<bool>,
    pub fail_dsp_create: Cell<bool>,
    pub fail_attach: Cell<bool>,
    pub missing_paths: RefCell<HashSet<String>>,
    pub spectrum: RefCell<Option<FftSpectrum>>,

    initialized: Cell<bool>,
    pub init_calls: Cell<usize>,
    next_handle: Cell<u64>,
    pub update_calls: Cell<usize>,
    pub loaded_paths: RefCell<Vec<String>>,
    pub sounds: RefCell<HashMap<SoundResourceId, LoopMode>>,
    pub channels: RefCell<HashMap<ChannelId, MockChannel>>,
    pub dsps: RefCell<HashSet<DspId>>,
    pub dsp_creations: Cell<usize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&self) -> u64 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        handle
    }

    fn ensure_initialized(&self) -> BackendResult<()> {
        if self.initialized.get() {
            Ok(())
        } else {
            Err(BackendError::NotInitialized)
        }
    }

    pub fn channel(&self, channel: ChannelId) -> MockChannel {
        self.channels.borrow()[&channel].clone()
    }

    fn with_channel<T>(
        &self,
        channel: ChannelId,
        f: impl FnOnce(&mut MockChannel) -> T,
    ) -> BackendResult<T> {
        self.ensure_initialized()?;
        match self.channels.borrow_mut().get_mut(&channel) {
            Some(state) if !state.stopped => Ok(f(state)),
            _ => Err(BackendError::InvalidHandle(channel.to_string())),
        }
    }
}

impl AudioBackend for MockBackend {
    fn init(&self, _max_channels: u32, _output: OutputMode) -> BackendResult<()> {
        self.init_calls.set(self.init_calls.get() + 1);
        if self.fail_init.get() {
            return Err(BackendError::Output("mock init failure".to_string()));
        }
        self.initialized.set(true);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn update(&self) -> BackendResult<()> {
        self.ensure_initialized()?;
        self.update_calls.set(self.update_calls.get() + 1);
        Ok(())
    }

    fn create_sound(&self, path: &str, mode: &SoundMode) -> BackendResult<SoundResourceId> {
        self.ensure_initialized()?;
        if self.missing_paths.borrow().contains(path) {
            return Err(BackendError::FileNotFound(path.to_string()));
        }
        let id = SoundResourceId(self.next_handle());
        self.sounds.borrow_mut().insert(id, mode.loop_mode);
        self.loaded_paths.borrow_mut().push(path.to_string());
        Ok(id)
    }

    fn release_sound(&self, sound: SoundResourceId) -> BackendResult<()> {
        self.sounds
            .borrow_mut()
            .remove(&sound)
            .map(|_| ())
            .ok_or_else(|| BackendError::InvalidHandle(sound.to_string()))
    }

    fn play_sound(&self, sound: SoundResourceId, paused: bool) -> BackendResult<ChannelId> {
        self.ensure_initialized()?;
        if self.fail_play.get() {
            return Err(BackendError::ChannelLimit(0));
        }
        let loop_mode = *self
            .sounds
            .borrow()
            .get(&sound)
            .ok_or_else(|| BackendError::InvalidHandle(sound.to_string()))?;

        let id = ChannelId(self.next_handle());
        self.channels.borrow_mut().insert(
            id,
            MockChannel {
                sound,
                paused,
                volume: 1.0,
                pitch: 1.0,
                position_ms: 0,
                loop_mode,
                loop_count: -1,
                stopped: false,
                dsp: None,
            },
        );
        Ok(id)
    }

    fn stop_channel(&self, channel: ChannelId) -> BackendResult<()> {
        self.with_channel(channel, |state| state.stopped = true)
    }

    fn set_channel_paused(&self, channel: ChannelId, paused: bool) -> BackendResult<()> {
        self.with_channel(channel, |state| state.paused = paused)
    }

    fn channel_paused(&self, channel: ChannelId) -> BackendResult<bool> {
        self.with_channel(channel, |state| state.paused)
    }

    fn set_channel_volume(&self, channel: ChannelId, volume: f32) -> BackendResult<()> {
        self.with_channel(channel, |state| state.volume = volume)
    }

    fn channel_volume(&self, channel: ChannelId) -> BackendResult<f32> {
        self.with_channel(channel, |state| state.volume)
    }

    fn set_channel_pitch(&self, channel: ChannelId, pitch: f32) -> BackendResult<()> {
        self.with_channel(channel, |state| state.pitch = pitch)
    }

    fn channel_pitch(&self, channel: ChannelId) -> BackendResult<f32> {
        self.with_channel(channel, |state| state.pitch)
    }

    fn set_channel_position_ms(&self, channel: ChannelId, position_ms: u32) -> BackendResult<()> {
        self.with_channel(channel, |state| state.position_ms = position_ms)
    }

    fn channel_position_ms(&self, channel: ChannelId) -> BackendResult<u32> {
        self.with_channel(channel, |state| state.position_ms)
    }

    fn set_channel_loop_mode(&self, channel: ChannelId, mode: LoopMode) -> BackendResult<()> {
        self.with_channel(channel, |state| state.loop_mode = mode)
    }

    fn set_channel_loop_count(&self, channel: ChannelId, count: i32) -> BackendResult<()> {
        self.with_channel(channel, |state| state.loop_count = count)
    }

    fn create_fft_dsp(&self) -> BackendResult<DspId> {
        self.ensure_initialized()?;
        self.dsp_creations.set(self.dsp_creations.get() + 1);
        if self.fail_dsp_create.get() {
            return Err(BackendError::Dsp("mock DSP creation failure".to_string()));
        }
        let id = DspId(self.next_handle());
        self.dsps.borrow_mut().insert(id);
        Ok(id)
    }

    fn attach_dsp(&self, channel: ChannelId, dsp: DspId) -> BackendResult<()> {
        if self.fail_attach.get() {
            return Err(BackendError::Dsp("mock attach failure".to_string()));
        }
        if !self.dsps.borrow().contains(&dsp) {
            return Err(BackendError::InvalidHandle(dsp.to_string()));
        }
        self.with_channel(channel, |state| state.dsp = Some(dsp))
    }

    fn fft_spectrum(&self, dsp: DspId) -> BackendResult<Option<FftSpectrum>> {
        if !self.dsps.borrow().contains(&dsp) {
            return Err(BackendError::InvalidHandle(dsp.to_string()));
        }
        Ok(self.spectrum.borrow().clone())
    }

    fn release_dsp(&self, dsp: DspId) -> BackendResult<()> {
        if self.dsps.borrow_mut().remove(&dsp) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle(dsp.to_string()))
        }
    }
}
