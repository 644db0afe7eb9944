use super::sample_data::SampleData;
use crate::backend::BackendResult;
use crate::config::SoundMode;
use crate::error::BackendError;
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Decode `path` into interleaved f32 at `target_sample_rate`.
pub(crate) fn decode_file(
    path: &str,
    mode: &SoundMode,
    target_sample_rate: u32,
) -> BackendResult<SampleData> {
    let file = File::open(path).map_err(|e| BackendError::FileNotFound(format!("{}: {}", path, e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BackendError::Format(format!("Failed to probe audio format: {:?}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| BackendError::Format("No default audio track found".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| BackendError::Format("Sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| BackendError::Format("Channel count not found".to_string()))?
        .count() as u16;

    if channels == 0 {
        return Err(BackendError::Format("Track has no channels".to_string()));
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BackendError::Format(format!("Failed to create decoder: {:?}", e)))?;

    let max_frames = mode
        .max_duration
        .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
        .unwrap_or(usize::MAX);

    let mut samples: Vec<f32> = Vec::new();
    let mut frames_decoded = 0;

    while frames_decoded < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break, // end-of-file
            Err(Error::ResetRequired) => break,
            Err(e) => {
                return Err(BackendError::Format(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet in {}: {}", path, e);
                continue;
            }
            Err(e) => {
                return Err(BackendError::Format(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();

        let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        tmp.copy_interleaved_ref(decoded);
        samples.extend_from_slice(tmp.samples());

        frames_decoded += frames;
    }

    if max_frames != usize::MAX {
        samples.truncate(max_frames * channels as usize);
    }

    let mut data = SampleData::new(samples, sample_rate, channels);

    if mode.convert_to_mono {
        data = data.to_mono();
    }

    if data.sample_rate() != target_sample_rate {
        data = data.resample(target_sample_rate)?;
    }

    log::debug!(
        "Decoded {}: {} frames, {} ch, {} Hz ({:?})",
        path,
        data.total_frames(),
        data.channels(),
        data.sample_rate(),
        data.duration()
    );

    Ok(data)
}
