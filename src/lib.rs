//! Soundstage: a small audio layer for game hosts.
//!
//! A [`SoundstageSession`] owns the connection to an audio engine and every
//! sound loaded through it. Each [`SoundstageSound`] plays on at most one
//! channel at a time, tracks a user pause and a session-forced pause
//! independently, and carries an FFT tap for spectrum readouts.
//!
//! ```no_run
//! use soundstage::{SoundstageSession, SoundstageSessionDesc, SpectrumChannel};
//!
//! let mut session = SoundstageSession::new(SoundstageSessionDesc::default());
//! let id = session.create_sound("music/theme.ogg")?;
//! session.sound_mut(id).unwrap().play()?;
//!
//! loop {
//!     session.update();
//!     let level = session
//!         .sound(id)
//!         .map(|s| s.average_spectrum_amplitude(SpectrumChannel::Stereo))
//!         .unwrap_or(0.0);
//!     # let _ = level;
//!     # break;
//! }
//! # Ok::<(), soundstage::SoundstageError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod sound;
pub mod spectrum;

pub use backend::{AudioBackend, FftSpectrum, NativeBackend};
pub use config::{DEFAULT_MAX_CHANNELS, LoopMode, OutputMode, SoundMode, SoundstageSessionDesc};
pub use error::{BackendError, Result, SoundstageError};
pub use platform::{DefaultHost, HostServices, Platform};
pub use session::{SessionStatus, SoundId, SoundstageSession, global};
pub use sound::{AnalysisStatus, PauseFlags, PauseState, SoundstageSound};
pub use spectrum::{SpectrumChannel, SpectrumIter};
