//! # Database Handle
//!
//! [`Tcd`] names one database file and exposes list-like access to its
//! stations. Only one database is loaded at a time; every operation goes
//! through the [`Arbiter`], which holds a process-wide lock for the whole
//! call and swaps the loaded database when a different file is targeted.
//!
//! ## Operation Lifecycle
//!
//! 1. Block until the lock is held
//! 2. If another file is loaded, save it if dirty and load the target
//! 3. Run the operation against the in-memory store
//! 4. On success, save if anything changed; on failure (of the operation or
//!    of the save), drop the loaded store so unsaved changes are discarded
//!    and the next call reloads
//! 5. Release the lock (guard drop, on every path)

use parking_lot::{const_mutex, Mutex};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assembler;
use crate::constituent::{Constituent, ConstituentTable};
use crate::error::{Result, TcdError};
use crate::record::DbHeader;
use crate::station::Station;
use crate::store::{file, MemoryStore, TideStore};
use crate::strings::Category;

struct Active {
    path: PathBuf,
    store: MemoryStore,
}

/// Serializes access to the single loaded database.
pub struct Arbiter {
    active: Mutex<Option<Active>>,
}

static GLOBAL: Arbiter = Arbiter::new();

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Arbiter {
    pub const fn new() -> Self {
        Arbiter {
            active: const_mutex(None),
        }
    }

    /// The arbiter shared by every [`Tcd`] handle.
    pub fn global() -> &'static Arbiter {
        &GLOBAL
    }

    /// Run `op` against the database at `path` while holding the lock.
    pub fn with<T>(
        &self,
        path: &Path,
        op: impl FnOnce(&mut MemoryStore) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.active.lock();
        let active = activate(&mut guard, path)?;
        match op(&mut active.store) {
            Ok(value) => {
                if active.store.is_dirty() {
                    if let Err(e) = file::save(&mut active.store, &active.path) {
                        log::warn!("discarding changes to {}: {}", path.display(), e);
                        *guard = None;
                        return Err(e);
                    }
                }
                Ok(value)
            }
            Err(e) => {
                if active.store.is_dirty() {
                    log::warn!(
                        "discarding unsaved changes to {}: {}",
                        path.display(),
                        e
                    );
                    *guard = None;
                }
                Err(e)
            }
        }
    }

    /// Make a freshly created store the loaded database and write it out.
    pub fn install(&self, path: &Path, mut store: MemoryStore) -> Result<()> {
        let mut guard = self.active.lock();
        if let Some(mut previous) = guard.take() {
            if previous.store.is_dirty() {
                file::save(&mut previous.store, &previous.path)?;
            }
        }
        file::save(&mut store, path)?;
        *guard = Some(Active {
            path: path.to_path_buf(),
            store,
        });
        Ok(())
    }

    /// Unload the database at `path` if it is the loaded one.
    pub fn close(&self, path: &Path) -> Result<()> {
        let mut guard = self.active.lock();
        if guard.as_ref().map_or(false, |a| a.path == path) {
            if let Some(mut active) = guard.take() {
                if active.store.is_dirty() {
                    file::save(&mut active.store, &active.path)?;
                }
                log::debug!("closed {}", path.display());
            }
        }
        Ok(())
    }

    pub fn is_active(&self, path: &Path) -> bool {
        self.active.lock().as_ref().map_or(false, |a| a.path == path)
    }
}

/// Ensure `path` is the loaded database.
fn activate<'a>(slot: &'a mut Option<Active>, path: &Path) -> Result<&'a mut Active> {
    let active = match slot.take() {
        Some(active) if active.path == path => active,
        previous => {
            if let Some(mut previous) = previous {
                if previous.store.is_dirty() {
                    file::save(&mut previous.store, &previous.path)?;
                }
                log::debug!("closed {}", previous.path.display());
            }
            let store = file::load(path)?;
            log::debug!("opened {}", path.display());
            Active {
                path: path.to_path_buf(),
                store,
            }
        }
    };
    Ok(slot.insert(active))
}

/// Handle to one tide constituent database file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tcd {
    path: PathBuf,
}

impl Tcd {
    /// Create a new database holding `constituents`, replacing any file at `path`.
    ///
    /// The year range is the intersection of the constituents' node factor
    /// ranges.
    pub fn create(path: impl AsRef<Path>, constituents: &[Constituent]) -> Result<Tcd> {
        let table = ConstituentTable::build(constituents)?;
        let path = absolute(path.as_ref())?;
        log::info!(
            "creating {} with {} constituents, years {}..{}",
            path.display(),
            table.len(),
            table.start_year(),
            table.end_year()
        );
        Arbiter::global().install(&path, MemoryStore::new(table))?;
        Ok(Tcd { path })
    }

    /// Open an existing database.
    pub fn open(path: impl AsRef<Path>) -> Result<Tcd> {
        let path = path
            .as_ref()
            .canonicalize()
            .map_err(|source| TcdError::StoreUnavailable {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
        let tcd = Tcd { path };
        tcd.with(|_| Ok(()))?;
        Ok(tcd)
    }

    /// Unload the database if it is the active one.
    pub fn close(self) -> Result<()> {
        Arbiter::global().close(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this database is the one currently loaded.
    pub fn is_active(&self) -> bool {
        Arbiter::global().is_active(&self.path)
    }

    fn with<T>(&self, op: impl FnOnce(&mut MemoryStore) -> Result<T>) -> Result<T> {
        Arbiter::global().with(&self.path, op)
    }

    pub fn len(&self) -> Result<usize> {
        self.with(|store| Ok(store.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.with(|store| Ok(store.is_empty()))
    }

    pub fn header(&self) -> Result<DbHeader> {
        self.with(|store| Ok(store.header()))
    }

    pub fn constituents(&self) -> Result<Arc<ConstituentTable>> {
        self.with(|store| Ok(store.constituents().clone()))
    }

    /// Entries of one string category, in index order.
    pub fn strings(&self, category: Category) -> Result<Vec<String>> {
        self.with(|store| Ok(store.strings().table(category).iter().collect()))
    }

    /// Station at `index`; negative indices count from the end.
    pub fn get(&self, index: isize) -> Result<Station> {
        self.with(|store| {
            let index = position(store, index)?;
            assembler::unpack_record(store, &store.read(index)?)
        })
    }

    /// Replace the station at `index`.
    pub fn set(&self, index: isize, station: &Station) -> Result<()> {
        self.with(|store| {
            let index = position(store, index)?;
            let rec = assembler::pack_record(store, station)?;
            store.write(index, rec)
        })
    }

    /// Delete the station at `index`; later stations move down by one.
    pub fn remove(&self, index: isize) -> Result<()> {
        self.with(|store| {
            let index = position(store, index)?;
            store.delete(index)
        })
    }

    /// Add a station at the end and return its index.
    pub fn append(&self, station: &Station) -> Result<i32> {
        self.with(|store| {
            let rec = assembler::pack_record(store, station)?;
            store.append(rec)
        })
    }

    /// First station named exactly `name`.
    pub fn find(&self, name: &str) -> Result<Station> {
        self.with(|store| {
            let index = search(store, name)?
                .into_iter()
                .next()
                .ok_or_else(|| TcdError::NotFound(format!("station {:?}", name)))?;
            assembler::unpack_record(store, &store.read(index)?)
        })
    }

    /// Every station named exactly `name`, in record order.
    pub fn find_all(&self, name: &str) -> Result<Vec<Station>> {
        self.with(|store| {
            search(store, name)?
                .into_iter()
                .map(|i| assembler::unpack_record(store, &store.read(i)?))
                .collect()
        })
    }

    /// Index of the stored station with the same kind and name.
    pub fn index_of(&self, station: &Station) -> Result<i32> {
        self.with(|store| assembler::index_of(&*store, station))
    }

    /// Every station, in record order.
    pub fn stations(&self) -> Result<Vec<Station>> {
        self.with(|store| {
            (0..store.len() as i32)
                .map(|i| assembler::unpack_record(store, &store.read(i)?))
                .collect()
        })
    }
}

fn position<S: TideStore + ?Sized>(store: &S, index: isize) -> Result<i32> {
    let len = store.len() as isize;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Ok(resolved as i32)
    } else {
        Err(TcdError::NotFound(format!(
            "index {} of {} records",
            index, len
        )))
    }
}

fn search<S: TideStore + ?Sized>(store: &S, name: &str) -> Result<Vec<i32>> {
    Ok(store.search(&crate::text::encode(name)?))
}

/// Absolute form of a path whose file may not exist yet.
fn absolute(path: &Path) -> Result<PathBuf> {
    let unavailable = |source: io::Error| TcdError::StoreUnavailable {
        path: path.to_path_buf(),
        source,
    };
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let name = path.file_name().ok_or_else(|| unavailable(e))?;
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            Ok(parent.canonicalize().map_err(unavailable)?.join(name))
        }
        Err(e) => Err(unavailable(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituent::{NodeFactor, NodeFactors};
    use crate::record::{RawRecord, RecordKind};
    use crate::station::ReferenceStation;
    use tempfile::TempDir;

    fn constituents() -> Vec<Constituent> {
        let factors = vec![
            NodeFactor {
                equilibrium: 0.0,
                node_factor: 1.0,
            };
            2
        ];
        vec![Constituent::new("M2", 28.984_104_2, NodeFactors::new(2020, factors))]
    }

    #[test]
    fn test_position_negative_index() {
        let dir = TempDir::new().unwrap();
        let tcd = Tcd::create(dir.path().join("a.tcd"), &constituents()).unwrap();
        for name in ["A", "B", "C"] {
            let station = Station::Reference(ReferenceStation::new(name, Vec::new()));
            tcd.append(&station).unwrap();
        }
        assert_eq!(tcd.get(-1).unwrap().name(), "C");
        assert_eq!(tcd.get(-3).unwrap().name(), "A");
        assert!(matches!(tcd.get(-4), Err(TcdError::NotFound(_))));
        assert!(matches!(tcd.get(3), Err(TcdError::NotFound(_))));
    }

    #[test]
    fn test_failed_operation_discards_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("b.tcd");
        let arbiter = Arbiter::new();
        arbiter
            .install(&path, MemoryStore::new(ConstituentTable::build(&constituents()).unwrap()))
            .unwrap();

        let result: Result<()> = arbiter.with(&path, |store| {
            store.append(RawRecord {
                record_type: RecordKind::Reference as u8,
                ..RawRecord::with_sentinels()
            })?;
            Err(TcdError::NotFound("injected".to_string()))
        });
        assert!(result.is_err());
        assert!(!arbiter.is_active(&path));
        assert_eq!(arbiter.with(&path, |store| Ok(store.len())).unwrap(), 0);
        assert!(arbiter.is_active(&path));
    }

    #[test]
    fn test_swaps_between_databases() {
        let dir = TempDir::new().unwrap();
        let arbiter = Arbiter::new();
        let table = || ConstituentTable::build(&constituents()).unwrap();
        let (a, b) = (dir.path().join("a.tcd"), dir.path().join("b.tcd"));
        arbiter.install(&a, MemoryStore::new(table())).unwrap();
        arbiter.install(&b, MemoryStore::new(table())).unwrap();
        assert!(arbiter.is_active(&b));

        arbiter
            .with(&a, |store| {
                store.append(RawRecord {
                    record_type: RecordKind::Reference as u8,
                    ..RawRecord::with_sentinels()
                })
            })
            .unwrap();
        assert!(arbiter.is_active(&a));
        assert_eq!(arbiter.with(&b, |store| Ok(store.len())).unwrap(), 0);
        assert_eq!(arbiter.with(&a, |store| Ok(store.len())).unwrap(), 1);

        arbiter.close(&a).unwrap();
        assert!(!arbiter.is_active(&a));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Tcd::open(dir.path().join("missing.tcd")),
            Err(TcdError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_absolute_for_new_file() {
        let dir = TempDir::new().unwrap();
        let path = absolute(&dir.path().join("new.tcd")).unwrap();
        assert!(path.is_absolute());
        assert_eq!(path.file_name().unwrap(), "new.tcd");
    }
}
