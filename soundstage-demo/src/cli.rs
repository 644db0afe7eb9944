use anyhow::{Context, Result, bail};
use clap::Parser;
use soundstage::{
    OutputMode, SessionStatus, SoundId, SoundMode, SoundstageSession, SoundstageSessionDesc,
    SpectrumChannel,
};
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(
    name = "soundstage-demo",
    about = "Play a sound file, print its spectrum level and exercise pause control"
)]
pub struct Options {
    /// Sound file, relative to the current directory or absolute
    pub path: String,
    /// Loop the sound instead of playing it once
    #[arg(long = "loop")]
    pub looping: bool,
    /// Render without an output device
    #[arg(long)]
    pub no_sound: bool,
    /// How long to run the host loop
    #[arg(long, default_value_t = 8)]
    pub seconds: u64,
}

/// Host loop: play the file, tick the session every frame, print the
/// spectrum level, and exercise forced and user pause along the way.
pub fn run(options: &Options) -> Result<()> {
    let output = if options.no_sound {
        OutputMode::NoSound
    } else {
        OutputMode::Device
    };
    let desc = SoundstageSessionDesc::new()
        .output(output)
        .resource_root(std::env::current_dir()?.to_string_lossy());

    let mut session = SoundstageSession::new(desc);
    if let SessionStatus::InitFailed(e) = session.status() {
        bail!("audio engine unavailable ({}): {}", e.code(), e);
    }

    let mode = if options.looping {
        SoundMode::looping()
    } else {
        SoundMode::new()
    };
    let id = session.create_sound_with_mode(&options.path, &mode)?;
    let sound = session.sound_mut(id).context("sound vanished after load")?;
    sound.play()?;
    log::info!("Playing {} as {}", sound.path(), id);

    let total = Duration::from_secs(options.seconds);
    let start = Instant::now();
    let mut frame: u64 = 0;

    while start.elapsed() < total {
        session.update();
        let elapsed = start.elapsed();

        // Timeline: forced pause at 25%, user pause at 40%, forced resume at
        // 50%, user resume at 65%
        let progress = elapsed.as_secs_f32() / total.as_secs_f32();
        step_timeline(&mut session, id, progress)?;

        if frame % 15 == 0 {
            if let Some(sound) = session.sound(id) {
                let level = sound.average_spectrum_amplitude(SpectrumChannel::Stereo);
                let time = sound.current_time().unwrap_or(0.0);
                println!(
                    "{:6.2}s  pos {:6.2}s  {:?}  {}",
                    elapsed.as_secs_f32(),
                    time,
                    sound.pause_state(),
                    meter(level)
                );
            }
        }

        frame += 1;
        std::thread::sleep(FRAME);
    }

    session.destroy_sound(id);
    log::info!("Demo finished after {} frames", frame);
    Ok(())
}

fn step_timeline(session: &mut SoundstageSession, id: SoundId, progress: f32) -> Result<()> {
    let Some(sound) = session.sound(id) else {
        bail!("{} was destroyed", id);
    };
    let flags = sound.pause_flags();

    if (0.25..0.5).contains(&progress) && !flags.engine {
        log::info!("force_pause_all");
        session.force_pause_all();
    }
    if (0.4..0.65).contains(&progress) && !flags.user {
        log::info!("user pause");
        if let Some(sound) = session.sound_mut(id) {
            sound.pause();
        }
    }
    if progress >= 0.5 && flags.engine {
        log::info!("force_resume_all");
        session.force_resume_all();
    }
    if progress >= 0.65 && flags.user {
        log::info!("user resume");
        if let Some(sound) = session.sound_mut(id) {
            sound.resume();
        }
    }
    Ok(())
}

fn meter(level: f32) -> String {
    let width = ((level * 400.0).clamp(0.0, 40.0)) as usize;
    format!("{:<40} {:.4}", "#".repeat(width), level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_play_once_for_eight_seconds() {
        let options = Options::try_parse_from(["soundstage-demo", "tone.wav"]).unwrap();
        assert_eq!(options.path, "tone.wav");
        assert!(!options.looping);
        assert!(!options.no_sound);
        assert_eq!(options.seconds, 8);
    }

    #[test]
    fn flags_and_seconds_are_parsed() {
        let options = Options::try_parse_from([
            "soundstage-demo",
            "--loop",
            "--no-sound",
            "--seconds",
            "3",
            "music/theme.ogg",
        ])
        .unwrap();
        assert_eq!(options.path, "music/theme.ogg");
        assert!(options.looping);
        assert!(options.no_sound);
        assert_eq!(options.seconds, 3);
    }

    #[test]
    fn missing_path_and_bad_seconds_are_rejected() {
        assert!(Options::try_parse_from(["soundstage-demo"]).is_err());
        assert!(Options::try_parse_from(["soundstage-demo", "a.wav", "--seconds", "x"]).is_err());
    }
}
