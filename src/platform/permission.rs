//! Permission gate interface and platform preconditions

use crate::platform::PermissionError;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Permission requested before a subscription may be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    /// Precise location while the app is in the foreground
    FineLocation,
    /// Approximate location
    CoarseLocation,
}

/// Answer from the permission subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Granted,
    Denied,
}

impl PermissionDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionDecision::Granted)
    }
}

impl From<bool> for PermissionDecision {
    fn from(granted: bool) -> Self {
        if granted {
            PermissionDecision::Granted
        } else {
            PermissionDecision::Denied
        }
    }
}

/// External permission subsystem
pub trait PermissionGate: Send + Sync {
    /// Check the permission and prompt the user if needed
    fn check_and_request(
        &self,
        kind: PermissionKind,
    ) -> impl Future<Output = Result<PermissionDecision, PermissionError>> + Send;
}

/// Host platform description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Android with its API level
    Android { api_level: u32 },
    /// iOS with its major version
    Ios { major_version: u32 },
}

/// First Android API level with runtime permission prompts
pub const ANDROID_RUNTIME_PERMISSION_API: u32 = 23;

impl Platform {
    /// True when location access is granted at install time, with no runtime prompt
    pub fn grants_without_prompt(&self) -> bool {
        match self {
            Platform::Android { api_level } => *api_level < ANDROID_RUNTIME_PERMISSION_API,
            Platform::Ios { .. } => false,
        }
    }
}

/// Gate that applies platform preconditions before delegating to `inner`
pub struct PlatformPermissionGate<G> {
    platform: Platform,
    inner: G,
}

impl<G: PermissionGate> PlatformPermissionGate<G> {
    pub fn new(platform: Platform, inner: G) -> Self {
        Self { platform, inner }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: PermissionGate> PermissionGate for PlatformPermissionGate<G> {
    fn check_and_request(
        &self,
        kind: PermissionKind,
    ) -> impl Future<Output = Result<PermissionDecision, PermissionError>> + Send {
        let short_circuit = self.platform.grants_without_prompt();
        let platform = self.platform;
        async move {
            if short_circuit {
                log::debug!("{:?} grants {:?} at install time", platform, kind);
                return Ok(PermissionDecision::Granted);
            }
            self.inner.check_and_request(kind).await
        }
    }
}
