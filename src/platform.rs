//! Host framework services: path handling and platform identification.

use std::path::Path;

/// URI scheme the Android asset loader understands for packaged assets.
pub const ANDROID_ASSET_SCHEME: &str = "file:///android_asset/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Windows,
    MacOs,
    Linux,
    Web,
    Other,
}

impl Platform {
    /// Platform this crate was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_family = "wasm") {
            Self::Web
        } else {
            Self::Other
        }
    }
}

/// Services the host framework provides to the session.
///
/// Implement this to route path resolution through your engine's own asset
/// layer. [`DefaultHost`] covers plain desktop hosts.
pub trait HostServices {
    fn is_absolute_path(&self, path: &str) -> bool;

    /// Root prepended to relative resource paths, including the trailing separator
    fn default_resource_root(&self) -> String;

    fn target_platform(&self) -> Platform;
}

/// Filesystem-backed host services.
#[derive(Debug, Clone)]
pub struct DefaultHost {
    resource_root: String,
    platform: Platform,
}

impl DefaultHost {
    pub fn new(resource_root: impl Into<String>, platform: Platform) -> Self {
        let mut resource_root = resource_root.into();
        if !resource_root.is_empty() && !resource_root.ends_with(['/', '\\']) {
            resource_root.push('/');
        }
        Self {
            resource_root,
            platform,
        }
    }

    /// Resource root next to the running executable
    pub fn from_executable_dir() -> Self {
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.to_string_lossy().into_owned()))
            .unwrap_or_default();
        Self::new(root, Platform::current())
    }
}

impl Default for DefaultHost {
    fn default() -> Self {
        Self::from_executable_dir()
    }
}

impl HostServices for DefaultHost {
    fn is_absolute_path(&self, path: &str) -> bool {
        // Leading '/' counts on every platform, matching game-engine asset conventions
        path.starts_with('/') || Path::new(path).is_absolute()
    }

    fn default_resource_root(&self) -> String {
        self.resource_root.clone()
    }

    fn target_platform(&self) -> Platform {
        self.platform
    }
}
