//! # Record Store
//!
//! The store allocates record slots, keeps the string tables and the
//! constituent table, and hands out packed records one at a time. The codec
//! only talks to it through [`TideStore`].
//!
//! [`MemoryStore`] keeps everything in memory; [`file`] persists one to a
//! single database file.

pub mod file;

use chrono::Utc;
use std::sync::Arc;

use crate::constituent::ConstituentTable;
use crate::error::{Result, TcdError};
use crate::record::{DbHeader, RawRecord, RecordKind, RECORD_SIZE};
use crate::strings::{Category, StringTables};

/// Format version string written into new databases.
pub const VERSION: &str = concat!("tide-db ", env!("CARGO_PKG_VERSION"), " v2.2");
pub const MAJOR_REV: u32 = 2;
pub const MINOR_REV: u32 = 2;

/// Operations the record codec needs from the underlying store.
pub trait TideStore {
    fn header(&self) -> DbHeader;

    fn constituents(&self) -> &Arc<ConstituentTable>;

    fn strings(&self) -> &StringTables;

    fn strings_mut(&mut self) -> &mut StringTables;

    /// Number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record at `index`; `NotFound` when out of range.
    fn read(&self, index: i32) -> Result<RawRecord>;

    /// Replace the record at `index`.
    fn write(&mut self, index: i32, record: RawRecord) -> Result<()>;

    /// Add a record at the end, returning its index.
    fn append(&mut self, record: RawRecord) -> Result<i32>;

    fn delete(&mut self, index: i32) -> Result<()>;

    /// Indices of records whose name is exactly `name`, in record order.
    fn search(&self, name: &[u8]) -> Vec<i32>;
}

/// A complete database held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    version: String,
    last_modified: String,
    constituents: Arc<ConstituentTable>,
    strings: StringTables,
    records: Vec<RawRecord>,
    dirty: bool,
    /// String table entries at the last save; the tables only grow
    saved_strings: usize,
}

impl MemoryStore {
    /// Empty database over a fixed constituent table.
    pub fn new(constituents: ConstituentTable) -> Self {
        let strings = StringTables::seeded();
        MemoryStore {
            version: VERSION.to_string(),
            last_modified: timestamp(),
            constituents: Arc::new(constituents),
            saved_strings: strings.total(),
            strings,
            records: Vec::new(),
            dirty: true,
        }
    }

    pub(crate) fn from_parts(
        version: String,
        last_modified: String,
        constituents: ConstituentTable,
        strings: StringTables,
        records: Vec<RawRecord>,
    ) -> Result<Self> {
        let mut store = MemoryStore {
            version,
            last_modified,
            constituents: Arc::new(constituents),
            saved_strings: strings.total(),
            strings,
            records: Vec::with_capacity(records.len()),
            dirty: false,
        };
        for (i, rec) in records.into_iter().enumerate() {
            if rec.record_number != i as i32 {
                return Err(TcdError::InvalidFile(format!(
                    "record {} is numbered {}",
                    i, rec.record_number
                )));
            }
            store.records.push(rec);
        }
        Ok(store)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Whether anything changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.strings.total() != self.saved_strings
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
        self.saved_strings = self.strings.total();
    }

    fn touch(&mut self) {
        self.last_modified = timestamp();
        self.dirty = true;
    }

    fn slot(&self, index: i32) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.records.len())
            .ok_or_else(|| TcdError::NotFound(format!("record {}", index)))
    }

    /// Check store-level invariants of a record about to be stored at `index`.
    fn validate(&self, index: i32, record: &RawRecord) -> Result<()> {
        match record.kind()? {
            RecordKind::Reference => Ok(()),
            RecordKind::Subordinate => {
                let target = record.reference_station;
                let is_reference = target != index
                    && self
                        .read(target)
                        .map(|r| r.record_type == RecordKind::Reference as u8)
                        .unwrap_or(false);
                if is_reference {
                    Ok(())
                } else {
                    Err(TcdError::UnresolvedReference(format!(
                        "record {} is not a reference station",
                        target
                    )))
                }
            }
        }
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M UTC").to_string()
}

impl TideStore for MemoryStore {
    fn header(&self) -> DbHeader {
        let count = |c: Category| self.strings.len(c) as u32;
        DbHeader {
            version: self.version.clone(),
            major_rev: MAJOR_REV,
            minor_rev: MINOR_REV,
            last_modified: self.last_modified.clone(),
            number_of_records: self.records.len() as u32,
            start_year: self.constituents.start_year(),
            number_of_years: self.constituents.num_years() as u32,
            constituents: self.constituents.len() as u32,
            level_unit_types: count(Category::LevelUnits),
            dir_unit_types: count(Category::DirectionUnits),
            restriction_types: count(Category::Restriction),
            datum_types: count(Category::Datum),
            countries: count(Category::Country),
            tzfiles: count(Category::Tzfile),
            legaleses: count(Category::Legalese),
        }
    }

    fn constituents(&self) -> &Arc<ConstituentTable> {
        &self.constituents
    }

    fn strings(&self) -> &StringTables {
        &self.strings
    }

    fn strings_mut(&mut self) -> &mut StringTables {
        &mut self.strings
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn read(&self, index: i32) -> Result<RawRecord> {
        let slot = self.slot(index)?;
        log::debug!("read record {}", index);
        Ok(self.records[slot].clone())
    }

    fn write(&mut self, index: i32, mut record: RawRecord) -> Result<()> {
        let slot = self.slot(index)?;
        self.validate(index, &record)?;
        if record.record_type != self.records[slot].record_type {
            // a reference station turning subordinate must not strand its dependents
            if let Some(by) = self.referrers(index).next() {
                return Err(TcdError::StillReferenced { index, by });
            }
        }
        record.record_number = index;
        record.record_size = RECORD_SIZE as u32;
        self.records[slot] = record;
        log::debug!("wrote record {}", index);
        self.touch();
        Ok(())
    }

    fn append(&mut self, mut record: RawRecord) -> Result<i32> {
        let index = i32::try_from(self.records.len())
            .map_err(|_| TcdError::InvalidFile("record count overflow".to_string()))?;
        self.validate(index, &record)?;
        record.record_number = index;
        record.record_size = RECORD_SIZE as u32;
        self.records.push(record);
        log::debug!("appended record {}", index);
        self.touch();
        Ok(index)
    }

    /// Remove a record and close the gap.
    ///
    /// Later records move down one slot; their numbers and any reference
    /// indices pointing past the removed slot follow them.
    fn delete(&mut self, index: i32) -> Result<()> {
        let slot = self.slot(index)?;
        if let Some(by) = self.referrers(index).next() {
            return Err(TcdError::StillReferenced { index, by });
        }
        self.records.remove(slot);
        for rec in self.records.iter_mut().skip(slot) {
            rec.record_number -= 1;
        }
        for rec in self.records.iter_mut() {
            if rec.record_type == RecordKind::Subordinate as u8 && rec.reference_station > index {
                rec.reference_station -= 1;
            }
        }
        log::debug!("deleted record {}", index);
        self.touch();
        Ok(())
    }

    fn search(&self, name: &[u8]) -> Vec<i32> {
        self.records
            .iter()
            .filter(|rec| rec.name == name)
            .map(|rec| rec.record_number)
            .collect()
    }
}

impl MemoryStore {
    /// Subordinate records whose reference is `index`.
    fn referrers(&self, index: i32) -> impl Iterator<Item = i32> + '_ {
        self.records
            .iter()
            .filter(move |rec| {
                rec.record_type == RecordKind::Subordinate as u8 && rec.reference_station == index
            })
            .map(|rec| rec.record_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituent::{Constituent, NodeFactor, NodeFactors};

    fn store() -> MemoryStore {
        let j1 = Constituent::new(
            "J1",
            15.585_443_3,
            NodeFactors::new(
                1970,
                vec![NodeFactor {
                    equilibrium: 1.0,
                    node_factor: 2.0,
                }],
            ),
        );
        MemoryStore::new(ConstituentTable::build(&[j1]).unwrap())
    }

    fn reference(name: &[u8]) -> RawRecord {
        RawRecord {
            record_type: RecordKind::Reference as u8,
            name: name.to_vec(),
            ..RawRecord::with_sentinels()
        }
    }

    fn subordinate(name: &[u8], reference_station: i32) -> RawRecord {
        RawRecord {
            record_type: RecordKind::Subordinate as u8,
            name: name.to_vec(),
            reference_station,
            ..RawRecord::with_sentinels()
        }
    }

    #[test]
    fn test_append_assigns_numbers() {
        let mut store = store();
        assert_eq!(store.append(reference(b"A")).unwrap(), 0);
        assert_eq!(store.append(reference(b"B")).unwrap(), 1);
        assert_eq!(store.read(1).unwrap().record_number, 1);
        assert_eq!(store.header().number_of_records, 2);
        assert!(matches!(store.read(2), Err(TcdError::NotFound(_))));
        assert!(matches!(store.read(-1), Err(TcdError::NotFound(_))));
    }

    #[test]
    fn test_header_counts() {
        let store = store();
        let header = store.header();
        assert_eq!(header.major_rev, 2);
        assert_eq!(header.minor_rev, 2);
        assert_eq!(header.start_year, 1970);
        assert_eq!(header.number_of_years, 1);
        assert_eq!(header.constituents, 1);
        assert_eq!(header.level_unit_types, 5);
        assert_eq!(header.dir_unit_types, 3);
        assert_eq!(header.legaleses, 1);
    }

    #[test]
    fn test_subordinate_needs_reference() {
        let mut store = store();
        assert!(matches!(
            store.append(subordinate(b"S", 0)),
            Err(TcdError::UnresolvedReference(_))
        ));
        store.append(reference(b"R")).unwrap();
        store.append(subordinate(b"S", 0)).unwrap();
        assert!(matches!(
            store.append(subordinate(b"T", 1)),
            Err(TcdError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_delete_compacts_and_renumbers() {
        let mut store = store();
        store.append(reference(b"A")).unwrap();
        store.append(reference(b"B")).unwrap();
        store.append(subordinate(b"C", 1)).unwrap();

        store.delete(0).unwrap();
        assert_eq!(store.len(), 2);
        let b = store.read(0).unwrap();
        let c = store.read(1).unwrap();
        assert_eq!(b.name, b"B");
        assert_eq!(c.record_number, 1);
        assert_eq!(c.reference_station, 0);
    }

    #[test]
    fn test_delete_referenced_station_refused() {
        let mut store = store();
        store.append(reference(b"A")).unwrap();
        store.append(subordinate(b"B", 0)).unwrap();
        assert!(matches!(
            store.delete(0),
            Err(TcdError::StillReferenced { index: 0, by: 1 })
        ));
        store.delete(1).unwrap();
        store.delete(0).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_string_lookup_does_not_dirty() {
        let mut store = store();
        store.mark_clean();
        store
            .strings_mut()
            .find_or_add(Category::Country, "Unknown")
            .unwrap();
        assert!(!store.is_dirty());

        store
            .strings_mut()
            .find_or_add(Category::Country, "Tuvalu")
            .unwrap();
        assert!(store.is_dirty());
        store.mark_clean();
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_search_exact_name() {
        let mut store = store();
        store.append(reference(b"Alameda")).unwrap();
        store.append(reference(b"Alameda Creek")).unwrap();
        store.append(reference(b"Alameda")).unwrap();
        assert_eq!(store.search(b"Alameda"), vec![0, 2]);
        assert!(store.search(b"alameda").is_empty());
    }
}
