// Mixer module - sums every live voice into one interleaved block.
// Runs on the device callback thread, or on the main thread in NoSound mode.

use super::voice::Voice;
use crate::backend::ChannelId;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Mutex;

/// Shared voice table; the main thread edits it, the mixer reads it every block
pub(crate) type VoiceTable = Mutex<HashMap<ChannelId, Voice>>;

/// Render one block.
///
/// The buffer is cleared first, then every playing voice is mixed in. Voices
/// that ended during this block are reported once through `ended_tx`; the
/// engine update on the main thread removes them.
///
/// Returns the largest number of frames any voice produced.
pub(crate) fn mix_voices(
    buffer: &mut [f32],
    channels: u16,
    voices: &VoiceTable,
    ended_tx: &Sender<ChannelId>,
) -> usize {
    buffer.fill(0.0);

    let Ok(mut voices) = voices.try_lock() else {
        log::warn!("Failed to acquire voice table lock in mixer");
        return 0;
    };

    let mut frames_filled_max = 0;

    for (channel_id, voice) in voices.iter_mut() {
        let frames_filled = voice.mix_into(buffer, channels);
        frames_filled_max = frames_filled_max.max(frames_filled);

        if voice.take_end_notification() {
            log::debug!("Mixer: {} reached end", channel_id);
            // Receiver lives as long as the backend; a send error means shutdown
            let _ = ended_tx.send(*channel_id);
        }
    }

    frames_filled_max
}
