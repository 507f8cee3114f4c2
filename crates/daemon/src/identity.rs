// SPDX-License-Identifier: MIT

//! Resolves an opaque SID to a display name and home directory.
//!
//! The corpus this service is grounded on has no binding to a native
//! passwd/user-profile lookup crate, so the production resolver uses the
//! fallback chain documented on `OsIdentityResolver` rather than reaching
//! for a dependency nothing else in the workspace needs.

use std::path::PathBuf;

use async_trait::async_trait;

/// `{ displayName, homeDirectory }`, as returned by a successful `resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    pub home_directory: PathBuf,
}

/// Collaborator contract: from an opaque user identifier, produce a display
/// name and home directory. A pure function of current OS state — callers
/// must tolerate a transient `None` (e.g. a profile not yet mounted).
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, sid: &str) -> Option<Identity>;
}

/// Production resolver. Consults, in order:
/// 1. `MAXBACKUP_HOME_<sid>` — an explicit per-SID override, the closest
///    analogue this workspace has to an authoritative profile-registry
///    lookup without introducing a new native dependency.
/// 2. `dirs::home_dir()` when `sid` names the current process user.
/// 3. `/home/<sid>` as a name-derived heuristic.
///
/// Returns `None` if the resulting directory does not exist, per the
/// contract's "transient None" requirement.
pub struct OsIdentityResolver;

#[async_trait]
impl IdentityResolver for OsIdentityResolver {
    async fn resolve(&self, sid: &str) -> Option<Identity> {
        let home = std::env::var(format!("MAXBACKUP_HOME_{sid}"))
            .ok()
            .map(PathBuf::from)
            .or_else(|| current_user_matches(sid).then(dirs::home_dir).flatten())
            .unwrap_or_else(|| PathBuf::from("/home").join(sid));

        if !home.is_dir() {
            return None;
        }

        Some(Identity { display_name: sid.to_string(), home_directory: home })
    }
}

fn current_user_matches(sid: &str) -> bool {
    std::env::var("USER").map(|u| u == sid).unwrap_or(false)
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// An `IdentityResolver` backed by an in-memory map, for daemon tests
    /// that must not touch the real filesystem's home directories.
    #[derive(Default)]
    pub struct FakeIdentityResolver {
        identities: RwLock<HashMap<String, Identity>>,
    }

    impl FakeIdentityResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert(&self, sid: impl Into<String>, identity: Identity) {
            self.identities.write().await.insert(sid.into(), identity);
        }

        pub async fn remove(&self, sid: &str) {
            self.identities.write().await.remove(sid);
        }
    }

    #[async_trait]
    impl IdentityResolver for FakeIdentityResolver {
        async fn resolve(&self, sid: &str) -> Option<Identity> {
            self.identities.read().await.get(sid).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_via_explicit_override() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("MAXBACKUP_HOME_S-TEST-1", dir.path());
        let identity = OsIdentityResolver.resolve("S-TEST-1").await;
        std::env::remove_var("MAXBACKUP_HOME_S-TEST-1");
        assert_eq!(identity.unwrap().home_directory, dir.path());
    }

    #[tokio::test]
    async fn returns_none_when_home_does_not_exist() {
        let identity = OsIdentityResolver.resolve("S-DOES-NOT-EXIST-XYZ").await;
        assert!(identity.is_none());
    }
}
