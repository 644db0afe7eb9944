//! cpal output stream driving the native mixer.

use super::mixer::{VoiceTable, mix_voices};
use crate::backend::{BackendResult, ChannelId};
use crate::error::BackendError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Everything the device callback needs to render a block
pub(crate) struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize,
}

/// Open the default output device and start rendering `voices` into it.
///
/// The returned stream plays until dropped.
pub(crate) fn open_output_stream(
    config: &OutputConfig,
    voices: Arc<VoiceTable>,
    ended_tx: Sender<ChannelId>,
) -> BackendResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| BackendError::Output("No default output device available".into()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
    log::info!("Opening output device: {} ({:?})", device_name, host.id());

    let default_config = device
        .default_output_config()
        .map_err(|e| BackendError::Output(format!("Failed to get default config: {}", e)))?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(config.block_size as u32),
    };

    let stream = match default_config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &stream_config, voices, ended_tx)?
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &stream_config, voices, ended_tx)?
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &stream_config, voices, ended_tx)?
        }
        other => {
            return Err(BackendError::Output(format!(
                "Unsupported sample format: {:?}",
                other
            )));
        }
    };

    stream
        .play()
        .map_err(|e| BackendError::Output(format!("Failed to start stream: {}", e)))?;

    log::info!(
        "Output stream running: {} Hz, {} ch, block {}",
        config.sample_rate,
        config.channels,
        config.block_size
    );

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voices: Arc<VoiceTable>,
    ended_tx: Sender<ChannelId>,
) -> BackendResult<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels;
    // Grown on the first callback only if the device hands us a bigger buffer
    let mut mix_buffer: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if mix_buffer.len() < data.len() {
                    mix_buffer.resize(data.len(), 0.0);
                }
                let block = &mut mix_buffer[..data.len()];

                mix_voices(block, channels, &voices, &ended_tx);

                for (out, &sample) in data.iter_mut().zip(block.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| BackendError::Output(format!("Failed to build stream: {}", e)))
}
