//! Registration store: the persistence seam and its YAML-backed implementation.
//!
//! # Ordering
//!
//! [`RegistrationStore::find_all`] returns registrations newest first: start
//! time descending, ties broken by id descending. A record inserted above the
//! currently loaded window therefore shifts the window down by one but never
//! reorders what is already below it.
//!
//! # Write flow
//!
//! Every mutation is applied to a copy of the in-memory state, the copy is
//! serialized → `.yaml.tmp` sibling → `chmod 0600` → `rename`, and only then
//! swapped in. A failed write leaves both disk and memory untouched.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::{NewRegistration, RegistrationId, TimeRegistration};

// ---------------------------------------------------------------------------
// 1. Trait
// ---------------------------------------------------------------------------

/// Persistence abstraction for time registrations.
///
/// List screens only rely on [`count`](Self::count),
/// [`find_all`](Self::find_all) and [`get_latest`](Self::get_latest); the
/// mutating operations serve punch-in/out and synchronization.
pub trait RegistrationStore: Send + Sync {
    fn count(&self) -> Result<usize, StoreError>;

    /// Up to `limit` registrations starting at `offset`, newest first.
    fn find_all(&self, offset: usize, limit: usize) -> Result<Vec<TimeRegistration>, StoreError>;

    /// The most recently started registration, if any.
    fn get_latest(&self) -> Result<Option<TimeRegistration>, StoreError>;

    fn find_by_id(&self, id: RegistrationId) -> Result<Option<TimeRegistration>, StoreError>;

    /// Persist `registration` under a freshly assigned, strictly positive id.
    fn insert(&self, registration: NewRegistration) -> Result<TimeRegistration, StoreError>;

    fn update(&self, registration: &TimeRegistration) -> Result<(), StoreError>;

    fn delete(&self, id: RegistrationId) -> Result<(), StoreError>;
}

impl<S: RegistrationStore + ?Sized> RegistrationStore for Arc<S> {
    fn count(&self) -> Result<usize, StoreError> {
        (**self).count()
    }

    fn find_all(&self, offset: usize, limit: usize) -> Result<Vec<TimeRegistration>, StoreError> {
        (**self).find_all(offset, limit)
    }

    fn get_latest(&self) -> Result<Option<TimeRegistration>, StoreError> {
        (**self).get_latest()
    }

    fn find_by_id(&self, id: RegistrationId) -> Result<Option<TimeRegistration>, StoreError> {
        (**self).find_by_id(id)
    }

    fn insert(&self, registration: NewRegistration) -> Result<TimeRegistration, StoreError> {
        (**self).insert(registration)
    }

    fn update(&self, registration: &TimeRegistration) -> Result<(), StoreError> {
        (**self).update(registration)
    }

    fn delete(&self, id: RegistrationId) -> Result<(), StoreError> {
        (**self).delete(id)
    }
}

// ---------------------------------------------------------------------------
// 2. On-disk document
// ---------------------------------------------------------------------------

const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    next_id: i64,
    #[serde(default)]
    registrations: Vec<TimeRegistration>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            next_id: 1,
            registrations: Vec::new(),
        }
    }
}

impl StoreFile {
    fn sort(&mut self) {
        self.registrations
            .sort_by(|a, b| b.start.cmp(&a.start).then_with(|| b.id.cmp(&a.id)));
    }

    fn position(&self, id: RegistrationId) -> Option<usize> {
        self.registrations.iter().position(|r| r.id == id)
    }
}

// ---------------------------------------------------------------------------
// 3. YamlStore
// ---------------------------------------------------------------------------

/// Registration store kept in memory and, unless ephemeral, mirrored to a
/// YAML file after every mutation.
#[derive(Debug)]
pub struct YamlStore {
    path: Option<PathBuf>,
    state: Mutex<StoreFile>,
}

impl YamlStore {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    ///
    /// Returns `StoreError::Parse` (with path + line context) if malformed YAML.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut state = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            serde_yaml::from_str::<StoreFile>(&contents)
                .map_err(|e| StoreError::Parse { path: path.clone(), source: e })?
        } else {
            StoreFile::default()
        };
        state.sort();
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// A store that never touches disk.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreFile::default()),
        }
    }

    /// Backing file, `None` for ephemeral stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreFile>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Apply `change` to a copy of the state, persist it, then swap it in.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreFile) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = change(&mut next)?;
        next.sort();
        if let Some(path) = &self.path {
            save_at(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }
}

impl RegistrationStore for YamlStore {
    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.registrations.len())
    }

    fn find_all(&self, offset: usize, limit: usize) -> Result<Vec<TimeRegistration>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .registrations
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_latest(&self) -> Result<Option<TimeRegistration>, StoreError> {
        Ok(self.lock()?.registrations.first().cloned())
    }

    fn find_by_id(&self, id: RegistrationId) -> Result<Option<TimeRegistration>, StoreError> {
        let state = self.lock()?;
        Ok(state.registrations.iter().find(|r| r.id == id).cloned())
    }

    fn insert(&self, registration: NewRegistration) -> Result<TimeRegistration, StoreError> {
        self.mutate(|state| {
            let id = RegistrationId(state.next_id);
            state.next_id += 1;
            let stored = registration.into_registration(id);
            state.registrations.push(stored.clone());
            Ok(stored)
        })
    }

    fn update(&self, registration: &TimeRegistration) -> Result<(), StoreError> {
        let id = registration.id;
        if !id.is_persistable() {
            return Err(StoreError::InvalidId { id });
        }
        self.mutate(|state| {
            let idx = state.position(id).ok_or(StoreError::NotFound { id })?;
            state.registrations[idx] = registration.clone();
            Ok(())
        })
    }

    fn delete(&self, id: RegistrationId) -> Result<(), StoreError> {
        if !id.is_persistable() {
            return Err(StoreError::InvalidId { id });
        }
        self.mutate(|state| {
            let idx = state.position(id).ok_or(StoreError::NotFound { id })?;
            state.registrations.remove(idx);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn save_at(path: &Path, state: &StoreFile) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(state)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
