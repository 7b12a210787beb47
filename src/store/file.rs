//! # Database Files
//!
//! Saves a [`MemoryStore`] to one file and loads it back.
//!
//! ## File Format
//!
//! ```text
//! +---------------------+
//! | Magic (4 bytes)     |  "TCDB"
//! +---------------------+
//! | format (4)          |  u32, currently 1
//! +---------------------+
//! | catalog_len (4)     |  u32 byte length of the catalog
//! +---------------------+
//! | catalog             |  JSON: version strings, constituents,
//! | (variable)          |  string tables
//! +---------------------+
//! | record_count (4)    |  u32
//! +---------------------+
//! | records             |  record_count × RECORD_SIZE byte images
//! +---------------------+
//! ```
//!
//! All integers are little-endian.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

use super::MemoryStore;
use crate::constituent::{Constituent, ConstituentTable};
use crate::error::{Result, TcdError};
use crate::record::{RawRecord, RECORD_SIZE};
use crate::strings::{Category, StringTable, StringTables};
use crate::store::TideStore;

const MAGIC: [u8; 4] = *b"TCDB";
const FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Catalog {
    version: String,
    last_modified: String,
    constituents: Vec<Constituent>,
    strings: Vec<StoredTable>,
}

#[derive(Serialize, Deserialize)]
struct StoredTable {
    category: Category,
    entries: Vec<String>,
}

fn unavailable(path: &Path) -> impl FnOnce(io::Error) -> TcdError + '_ {
    move |source| TcdError::StoreUnavailable {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `store` to `path`, replacing any existing file.
pub fn save(store: &mut MemoryStore, path: &Path) -> Result<()> {
    let catalog = Catalog {
        version: store.version().to_string(),
        last_modified: store.last_modified().to_string(),
        constituents: store.constituents().to_stored(),
        strings: Category::ALL
            .iter()
            .map(|&category| StoredTable {
                category,
                entries: store.strings().table(category).iter().collect(),
            })
            .collect(),
    };
    let catalog = serde_json::to_vec(&catalog).map_err(io::Error::from)?;

    let records = store.records();
    let mut bytes = Vec::with_capacity(16 + catalog.len() + records.len() * RECORD_SIZE);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT.to_le_bytes());
    bytes.extend_from_slice(&(catalog.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&catalog);
    bytes.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for rec in records {
        bytes.extend(rec.to_bytes()?);
    }

    let count = records.len();
    fs::write(path, bytes).map_err(unavailable(path))?;
    store.mark_clean();
    log::debug!("saved {} records to {}", count, path.display());
    Ok(())
}

/// Read a database file written by [`save`].
pub fn load(path: &Path) -> Result<MemoryStore> {
    let bytes = fs::read(path).map_err(unavailable(path))?;
    let mut cursor = Cursor { bytes: &bytes };

    if cursor.take(4)? != MAGIC {
        return Err(TcdError::InvalidFile(format!(
            "{} is not a tide database",
            path.display()
        )));
    }
    let format = cursor.u32()?;
    if format != FORMAT {
        return Err(TcdError::InvalidFile(format!(
            "unsupported format {}",
            format
        )));
    }

    let catalog_len = cursor.u32()? as usize;
    let catalog: Catalog = serde_json::from_slice(cursor.take(catalog_len)?)
        .map_err(|e| TcdError::InvalidFile(format!("catalog: {}", e)))?;

    let record_count = cursor.u32()? as usize;
    let mut records = Vec::with_capacity(record_count);
    for _ in 0..record_count {
        records.push(RawRecord::from_bytes(cursor.take(RECORD_SIZE)?)?);
    }
    if !cursor.bytes.is_empty() {
        return Err(TcdError::InvalidFile(format!(
            "{} trailing bytes",
            cursor.bytes.len()
        )));
    }

    let constituents = ConstituentTable::from_stored(catalog.constituents)?;
    let tables = catalog
        .strings
        .iter()
        .map(|t| StringTable::from_entries(t.category, &t.entries))
        .collect::<Result<Vec<_>>>()?;

    log::debug!("loaded {} records from {}", record_count, path.display());
    MemoryStore::from_parts(
        catalog.version,
        catalog.last_modified,
        constituents,
        StringTables::from_tables(tables)?,
        records,
    )
}

struct Cursor<'a> {
    bytes: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(TcdError::InvalidFile(format!(
                "truncated: need {} bytes, have {}",
                n,
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }
}
