// Drives the native engine without an output device: every update renders
// one 1024-frame block at 48 kHz.

use soundstage::{
    AnalysisStatus, OutputMode, SessionStatus, SoundMode, SoundstageError, SoundstageSession,
    SoundstageSessionDesc, SpectrumChannel,
};
use std::path::Path;
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 48000;
const BLOCK: usize = 1024;

fn write_tone(path: &Path, frequency: f32, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (SAMPLE_RATE as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let value = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5;
        let sample = (value * i16::MAX as f32) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn session_in(dir: &TempDir) -> SoundstageSession {
    let _ = env_logger::builder().is_test(true).try_init();
    let desc = SoundstageSessionDesc::new()
        .output(OutputMode::NoSound)
        .sample_rate(SAMPLE_RATE)
        .block_size(BLOCK)
        .fft_window_size(BLOCK)
        .resource_root(dir.path().to_string_lossy());
    let session = SoundstageSession::new(desc);
    assert_eq!(session.status(), &SessionStatus::Ready);
    session
}

#[test]
fn playback_advances_once_per_update() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("tone.wav"), 440.0, 1.0);
    let mut session = session_in(&dir);

    let id = session.create_sound("tone.wav").unwrap();
    session.sound_mut(id).unwrap().play().unwrap();

    for _ in 0..10 {
        session.update();
    }

    let elapsed = session.sound(id).unwrap().current_time().unwrap();
    let expected = (10 * BLOCK) as f32 / SAMPLE_RATE as f32;
    approx::assert_abs_diff_eq!(elapsed, expected, epsilon = 0.002);
}

#[test]
fn seeking_reads_back_the_requested_millisecond() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("tone.wav"), 440.0, 1.0);
    let mut session = session_in(&dir);

    let id = session.create_sound("tone.wav").unwrap();
    let sound = session.sound_mut(id).unwrap();
    sound.play().unwrap();
    sound.pause();

    for ms in [1u32, 3, 7, 333, 501, 999] {
        sound.set_current_time(ms as f32 / 1000.0).unwrap();
        let read_back = sound.current_time().unwrap();
        assert_eq!((read_back * 1000.0).round() as u32, ms);
    }
}

#[test]
fn forced_pause_holds_position_until_resumed() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("tone.wav"), 440.0, 1.0);
    let mut session = session_in(&dir);

    let id = session.create_sound("tone.wav").unwrap();
    session.sound_mut(id).unwrap().play().unwrap();
    session.update();

    session.force_pause_all();
    let paused_at = session.sound(id).unwrap().current_time().unwrap();
    for _ in 0..5 {
        session.update();
    }
    assert_eq!(session.sound(id).unwrap().current_time().unwrap(), paused_at);

    // A user resume alone does not override the forced pause
    session.sound_mut(id).unwrap().resume();
    session.update();
    assert_eq!(session.sound(id).unwrap().current_time().unwrap(), paused_at);

    session.force_resume_all();
    session.update();
    assert!(session.sound(id).unwrap().current_time().unwrap() > paused_at);
}

#[test]
fn spectrum_peaks_at_tone_frequency() {
    let dir = TempDir::new().unwrap();
    // Centered on bin 32 of a 1024-point window
    let frequency = 32.0 * SAMPLE_RATE as f32 / BLOCK as f32;
    write_tone(&dir.path().join("tone.wav"), frequency, 1.0);
    let mut session = session_in(&dir);

    let id = session.create_sound("tone.wav").unwrap();
    let sound = session.sound_mut(id).unwrap();
    assert_eq!(sound.average_spectrum_amplitude(SpectrumChannel::Stereo), 0.0);
    sound.play().unwrap();
    assert_eq!(sound.analysis_status(), &AnalysisStatus::Attached);

    session.update();

    let sound = session.sound(id).unwrap();
    let left: Vec<f32> = sound.fft_spectrum(SpectrumChannel::Left).collect();
    assert_eq!(left.len(), BLOCK / 2);

    let peak = left
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(bin, _)| bin)
        .unwrap();
    assert_eq!(peak, 32);
    approx::assert_abs_diff_eq!(left[32], 0.5, epsilon = 0.05);

    // Identical channels: stereo reads 1.5x the left channel
    let stereo: Vec<f32> = sound.fft_spectrum(SpectrumChannel::Stereo).collect();
    approx::assert_abs_diff_eq!(stereo[32], left[32] * 1.5, epsilon = 1e-4);
    assert!(sound.average_spectrum_amplitude(SpectrumChannel::Stereo) > 0.0);
}

#[test]
fn one_shot_channel_ends_and_frees_its_handle() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("blip.wav"), 440.0, 0.01);
    let mut session = session_in(&dir);

    let id = session.create_sound("blip.wav").unwrap();
    session.sound_mut(id).unwrap().play().unwrap();
    session.update();

    assert!(matches!(
        session.sound(id).unwrap().volume(),
        Err(SoundstageError::NoActiveChannel(_))
    ));

    // The sound itself stays loaded and plays again
    session.sound_mut(id).unwrap().play().unwrap();
    assert_eq!(session.sound(id).unwrap().volume().unwrap(), 1.0);
}

#[test]
fn looping_sound_keeps_playing() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("loop.wav"), 440.0, 0.05);
    let mut session = session_in(&dir);

    let id = session
        .create_sound_with_mode("loop.wav", &SoundMode::looping())
        .unwrap();
    session.sound_mut(id).unwrap().play().unwrap();
    for _ in 0..8 {
        session.update();
    }

    let sound = session.sound(id).unwrap();
    assert!(sound.is_loop_enabled());
    assert!(sound.current_time().unwrap() < 0.05);
}

#[test]
fn missing_file_reports_resolved_path() {
    let dir = TempDir::new().unwrap();
    let mut session = session_in(&dir);

    match session.create_sound("nope.wav") {
        Err(SoundstageError::SoundLoad { path, source }) => {
            assert!(path.ends_with("nope.wav"));
            assert!(path.starts_with(&*dir.path().to_string_lossy()));
            assert_eq!(source.code(), 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(session.is_empty());
}

#[test]
fn destroying_a_sound_releases_it() {
    let dir = TempDir::new().unwrap();
    write_tone(&dir.path().join("tone.wav"), 440.0, 1.0);
    let mut session = session_in(&dir);

    let a = session.create_sound("tone.wav").unwrap();
    let b = session.create_sound("tone.wav").unwrap();
    session.sound_mut(a).unwrap().play().unwrap();
    session.sound_mut(b).unwrap().play().unwrap();

    assert!(session.destroy_sound(a));
    assert!(!session.destroy_sound(a));
    session.update();

    assert_eq!(session.sound_ids(), &[b]);
    assert!(session.sound(b).unwrap().current_time().unwrap() > 0.0);
}
