//! Engine session: the single connection to the audio engine and the owner
//! of every loaded sound.

use crate::backend::{AudioBackend, NativeBackend};
use crate::config::{LoopMode, SoundMode, SoundstageSessionDesc};
use crate::error::{BackendError, Result, SoundstageError};
use crate::platform::{ANDROID_ASSET_SCHEME, DefaultHost, HostServices, Platform};
use crate::sound::SoundstageSound;
use std::collections::HashMap;
use std::rc::Rc;

/// Identifier of a sound within its session. Never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub(crate) u64);

impl SoundId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoundId({})", self.0)
    }
}

/// Outcome of creating and initializing the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Ready,
    InitFailed(BackendError),
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Owns the engine connection and every [`SoundstageSound`] created through it.
pub struct SoundstageSession {
    // Dropped before `backend`: sounds release engine resources on drop
    sounds: HashMap<SoundId, SoundstageSound>,
    order: Vec<SoundId>,
    next_id: u64,
    backend: Option<Rc<dyn AudioBackend>>,
    host: Box<dyn HostServices>,
    status: SessionStatus,
    desc: SoundstageSessionDesc,
}

impl SoundstageSession {
    /// Create the native engine and initialize it.
    ///
    /// Never fails: an engine that cannot be created or initialized is logged
    /// and reported through [`status`](Self::status), and every later load
    /// fails with a [`SoundstageError::SoundLoad`].
    pub fn new(desc: SoundstageSessionDesc) -> Self {
        let host = Box::new(default_host(&desc));
        match NativeBackend::new(desc.clone()) {
            Ok(backend) => Self::with_backend(desc, Rc::new(backend), host),
            Err(e) => {
                log::error!("engine create error! ({}) {}", e.code(), e);
                Self::from_parts(desc, None, host, SessionStatus::InitFailed(e))
            }
        }
    }

    /// Build a session around any engine and host implementation.
    ///
    /// An engine the host already initialized is shared as is.
    pub fn with_backend(
        desc: SoundstageSessionDesc,
        backend: Rc<dyn AudioBackend>,
        host: Box<dyn HostServices>,
    ) -> Self {
        let init = if backend.is_initialized() {
            log::debug!("Engine already initialized, skipping init");
            Ok(())
        } else {
            backend.init(desc.max_channels, desc.output)
        };
        let status = match init {
            Ok(()) => {
                log::info!(
                    "Soundstage session ready ({} channels, {:?} output)",
                    desc.max_channels,
                    desc.output
                );
                SessionStatus::Ready
            }
            Err(e) => {
                log::error!("engine init error! ({}) {}", e.code(), e);
                SessionStatus::InitFailed(e)
            }
        };
        Self::from_parts(desc, Some(backend), host, status)
    }

    fn from_parts(
        desc: SoundstageSessionDesc,
        backend: Option<Rc<dyn AudioBackend>>,
        host: Box<dyn HostServices>,
        status: SessionStatus,
    ) -> Self {
        Self {
            sounds: HashMap::new(),
            order: Vec::new(),
            next_id: 0,
            backend,
            host,
            status,
            desc,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn desc(&self) -> &SoundstageSessionDesc {
        &self.desc
    }

    /// The engine behind this session, for calls the session does not wrap.
    ///
    /// `None` when the native engine could not be created.
    pub fn backend(&self) -> Option<&Rc<dyn AudioBackend>> {
        self.backend.as_ref()
    }

    /// Map a host resource path to one the engine can open.
    ///
    /// Absolute paths pass through. Relative paths are prefixed with the
    /// Android asset scheme on Android and with the host's resource root
    /// everywhere else.
    pub fn resolve_path(&self, path: &str) -> String {
        if self.host.is_absolute_path(path) {
            return path.to_string();
        }
        match self.host.target_platform() {
            Platform::Android => format!("{}{}", ANDROID_ASSET_SCHEME, path),
            _ => format!("{}{}", self.host.default_resource_root(), path),
        }
    }

    /// Load a one-shot sound
    pub fn create_sound(&mut self, path: &str) -> Result<SoundId> {
        self.create_sound_with_mode(path, &SoundMode::default())
    }

    /// Load a sound. No identifier is consumed when loading fails.
    pub fn create_sound_with_mode(&mut self, path: &str, mode: &SoundMode) -> Result<SoundId> {
        let resolved = self.resolve_path(path);

        let loaded = match &self.backend {
            Some(backend) => backend
                .create_sound(&resolved, mode)
                .map(|resource| (backend.clone(), resource)),
            None => Err(BackendError::NotInitialized),
        };

        let (backend, resource) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                log::error!("engine error! ({}) {}", e.code(), e);
                return Err(SoundstageError::SoundLoad {
                    path: resolved,
                    source: e,
                });
            }
        };

        let id = SoundId(self.next_id);
        self.next_id += 1;

        let looping = mode.loop_mode == LoopMode::Normal;
        let sound = SoundstageSound::new(id, resolved, backend, resource, looping);
        log::debug!("Created {} from {}", id, sound.path());

        self.sounds.insert(id, sound);
        self.order.push(id);
        Ok(id)
    }

    /// Destroy a sound, stopping its channel and releasing its resources.
    ///
    /// Returns false for an unknown or already destroyed id.
    pub fn destroy_sound(&mut self, id: SoundId) -> bool {
        if let Some(index) = self.order.iter().position(|&other| other == id) {
            self.order.remove(index);
        }

        match self.sounds.remove(&id) {
            Some(sound) => {
                drop(sound);
                true
            }
            None => {
                log::warn!("destroy_sound: {} is not a live sound", id);
                false
            }
        }
    }

    /// Advance the engine. Call once per host frame.
    pub fn update(&mut self) {
        if !self.status.is_ready() {
            return;
        }
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.update() {
                log::error!("engine update error! ({}) {}", e.code(), e);
            }
        }
    }

    /// Force-pause one sound, independently of its user pause
    pub fn force_pause(&mut self, id: SoundId) -> Result<()> {
        self.sound_entry(id)?.set_engine_paused(true);
        Ok(())
    }

    pub fn force_resume(&mut self, id: SoundId) -> Result<()> {
        self.sound_entry(id)?.set_engine_paused(false);
        Ok(())
    }

    /// Force-pause every sound, in creation order
    pub fn force_pause_all(&mut self) {
        self.set_engine_paused_all(true);
    }

    pub fn force_resume_all(&mut self) {
        self.set_engine_paused_all(false);
    }

    fn set_engine_paused_all(&mut self, paused: bool) {
        for id in &self.order {
            if let Some(sound) = self.sounds.get_mut(id) {
                sound.set_engine_paused(paused);
            }
        }
        log::debug!("Engine paused={} for {} sounds", paused, self.order.len());
    }

    fn sound_entry(&mut self, id: SoundId) -> Result<&mut SoundstageSound> {
        self.sounds
            .get_mut(&id)
            .ok_or(SoundstageError::UnknownSound(id))
    }

    pub fn sound(&self, id: SoundId) -> Option<&SoundstageSound> {
        self.sounds.get(&id)
    }

    pub fn sound_mut(&mut self, id: SoundId) -> Option<&mut SoundstageSound> {
        self.sounds.get_mut(&id)
    }

    /// Live sound ids in creation order
    pub fn sound_ids(&self) -> &[SoundId] {
        &self.order
    }

    pub fn contains(&self, id: SoundId) -> bool {
        self.sounds.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

fn default_host(desc: &SoundstageSessionDesc) -> DefaultHost {
    let platform = desc.platform.unwrap_or_else(Platform::current);
    match &desc.resource_root {
        Some(root) => DefaultHost::new(root.clone(), platform),
        None => DefaultHost::new(
            DefaultHost::from_executable_dir().default_resource_root(),
            platform,
        ),
    }
}

/// Lazily created session for hosts that want a process-wide accessor.
///
/// The session is not `Send`, so there is one per thread; hosts call it from
/// their main thread.
pub mod global {
    use super::SoundstageSession;
    use crate::config::SoundstageSessionDesc;
    use crate::error::{Result, SoundstageError};
    use std::cell::RefCell;

    thread_local! {
        static SESSION: RefCell<Option<SoundstageSession>> = const { RefCell::new(None) };
    }

    /// Create this thread's session from `desc`. Returns false if one exists already.
    pub fn install(desc: SoundstageSessionDesc) -> bool {
        SESSION.with(|cell| match cell.try_borrow_mut() {
            Ok(mut slot) if slot.is_none() => {
                *slot = Some(SoundstageSession::new(desc));
                true
            }
            _ => false,
        })
    }

    /// Run `f` against this thread's session, creating it with the default
    /// configuration on first use.
    ///
    /// Fails with [`SoundstageError::SessionBusy`] when called from inside `f`.
    pub fn with_session<R>(f: impl FnOnce(&mut SoundstageSession) -> R) -> Result<R> {
        SESSION.with(|cell| {
            let mut slot = cell.try_borrow_mut().map_err(|_| SoundstageError::SessionBusy)?;
            let session =
                slot.get_or_insert_with(|| SoundstageSession::new(SoundstageSessionDesc::default()));
            Ok(f(session))
        })
    }

    /// Drop this thread's session and everything it owns
    pub fn shutdown() -> bool {
        SESSION.with(|cell| match cell.try_borrow_mut() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => false,
        })
    }
}
