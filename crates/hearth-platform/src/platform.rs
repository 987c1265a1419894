//! Runtime platform detection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::PlatformError;

/// Environment variable that forces the platform on non-wasm targets.
pub const PLATFORM_ENV_VAR: &str = "HEARTH_PLATFORM";

static CURRENT: OnceLock<Platform> = OnceLock::new();

/// The runtime environment the process executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// On-device SQL engine (desktop, iOS, Android shells)
    Native,
    /// Browser-hosted emulation persisted in web storage
    Browser,
}

impl Platform {
    /// Inspect the environment without caching.
    ///
    /// `wasm32` builds always run in a browser. Everything else is native
    /// unless `HEARTH_PLATFORM` names another platform.
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            return Platform::Browser;
        }

        std::env::var(PLATFORM_ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(Platform::Native)
    }

    pub fn is_native_platform(self) -> bool {
        self == Platform::Native
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Native => "native",
            Platform::Browser => "browser",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "ios" | "android" | "electron" => Ok(Platform::Native),
            "browser" | "web" => Ok(Platform::Browser),
            other => Err(PlatformError::UnknownPlatform(other.to_string())),
        }
    }
}

/// The platform of this process, detected on first call.
pub fn current_platform() -> Platform {
    *CURRENT.get_or_init(|| {
        let platform = Platform::detect();
        tracing::info!(platform = %platform, "Detected runtime platform");
        platform
    })
}

/// Pin the process platform before anything reads it.
///
/// Returns the effective platform. Once a platform has been observed it stays,
/// and a conflicting request is only logged.
pub fn init_platform(requested: Option<Platform>) -> Platform {
    let Some(requested) = requested else {
        return current_platform();
    };

    let platform = *CURRENT.get_or_init(|| {
        tracing::info!(platform = %requested, "Platform set by configuration");
        requested
    });

    if platform != requested {
        tracing::warn!(
            current = %platform,
            requested = %requested,
            "Platform already fixed for this process, ignoring override"
        );
    }

    platform
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_platform_is_stable() {
        let first = current_platform();
        for _ in 0..10 {
            assert_eq!(current_platform(), first);
        }
        assert_eq!(init_platform(None), first);
    }

    #[test]
    fn test_override_cannot_change_fixed_platform() {
        let fixed = current_platform();
        let other = match fixed {
            Platform::Native => Platform::Browser,
            Platform::Browser => Platform::Native,
        };

        assert_eq!(init_platform(Some(other)), fixed);
        assert_eq!(current_platform(), fixed);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("native".parse::<Platform>().unwrap(), Platform::Native);
        assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Native);
        assert_eq!(" web ".parse::<Platform>().unwrap(), Platform::Browser);
        assert!(matches!(
            "toaster".parse::<Platform>(),
            Err(PlatformError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Platform::Browser).unwrap();
        assert_eq!(json, "\"browser\"");
        let parsed: Platform = serde_json::from_str("\"native\"").unwrap();
        assert!(parsed.is_native_platform());
    }
}
