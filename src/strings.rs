//! # String Table Client
//!
//! Interned string categories shared across a database. Records store small
//! integer indices into these tables instead of the strings themselves.
//!
//! - **Open** categories (time zones, countries, restrictions, datums,
//!   legal notices) grow on demand through [`StringTables::find_or_add`].
//! - **Closed** categories (level units, direction units) are fixed
//!   enumerations; packing a value they do not contain is an error.
//!
//! Lookups compare encoded bytes exactly. No case folding or whitespace
//! normalization is done.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, TcdError};
use crate::text;

/// An interned string category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    LevelUnits,
    DirectionUnits,
    Restriction,
    Datum,
    Country,
    Tzfile,
    Legalese,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::LevelUnits,
        Category::DirectionUnits,
        Category::Restriction,
        Category::Datum,
        Category::Country,
        Category::Tzfile,
        Category::Legalese,
    ];

    /// Whether new strings may be added on demand.
    pub fn is_open(self) -> bool {
        !matches!(self, Category::LevelUnits | Category::DirectionUnits)
    }

    /// Most entries an index of the packed field width can address.
    pub fn capacity(self) -> usize {
        match self {
            // u8 indices
            Category::LevelUnits
            | Category::DirectionUnits
            | Category::Restriction
            | Category::Legalese => u8::MAX as usize + 1,
            // i16 indices
            Category::Datum | Category::Country | Category::Tzfile => i16::MAX as usize + 1,
        }
    }

    /// Entries a freshly created database starts with.
    pub fn seed(self) -> &'static [&'static str] {
        match self {
            Category::LevelUnits => &["Unknown", "feet", "meters", "knots", "knots^2"],
            Category::DirectionUnits => &["Unknown", "degrees true", "degrees"],
            Category::Restriction => &[
                "Public Domain",
                "DoD/DoD Contractors Only",
                "Non-commercial use only",
            ],
            Category::Datum => &[
                "Unknown",
                "Mean Lower Low Water",
                "Mean Low Water",
                "Mean Sea Level",
                "Mean High Water",
                "Mean Higher High Water",
                "Chart Datum",
            ],
            Category::Country | Category::Tzfile => &["Unknown"],
            Category::Legalese => &["NULL"],
        }
    }

    /// Name returned for indices outside the table.
    pub fn fallback(self) -> &'static str {
        "Unknown"
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::LevelUnits => "level units",
            Category::DirectionUnits => "direction units",
            Category::Restriction => "restriction",
            Category::Datum => "datum",
            Category::Country => "country",
            Category::Tzfile => "tzfile",
            Category::Legalese => "legalese",
        };
        f.write_str(name)
    }
}

/// One category's entries, in index order.
#[derive(Clone, Debug, PartialEq)]
pub struct StringTable {
    category: Category,
    entries: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, usize>,
}

impl StringTable {
    pub fn new(category: Category) -> Self {
        StringTable {
            category,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Table holding the category's initial entries.
    pub fn seeded(category: Category) -> Self {
        let mut table = Self::new(category);
        for entry in category.seed() {
            // seeds are ASCII and well below capacity
            table.push(entry.as_bytes().to_vec());
        }
        table
    }

    pub(crate) fn from_entries(category: Category, entries: &[String]) -> Result<Self> {
        let mut table = Self::new(category);
        for entry in entries {
            let bytes = text::encode(entry)?;
            if table.index.contains_key(&bytes) {
                return Err(TcdError::InvalidFile(format!(
                    "duplicate {} entry {:?}",
                    category, entry
                )));
            }
            table.append(bytes)?;
        }
        Ok(table)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, or the category fallback when out of range.
    pub fn get(&self, index: i64) -> String {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(|bytes| text::decode(bytes))
            .unwrap_or_else(|| self.category.fallback().to_string())
    }

    pub fn find(&self, value: &str) -> Option<usize> {
        let bytes = text::encode(value).ok()?;
        self.index.get(&bytes).copied()
    }

    /// Unconditionally append a new entry.
    pub fn add(&mut self, value: &str) -> Result<usize> {
        self.check_open(value)?;
        self.append(text::encode(value)?)
    }

    /// Index of `value`, adding it first if the table does not have it yet.
    pub fn find_or_add(&mut self, value: &str) -> Result<usize> {
        self.check_open(value)?;
        let bytes = text::encode(value)?;
        match self.index.get(&bytes) {
            Some(&i) => Ok(i),
            None => {
                let i = self.append(bytes)?;
                log::debug!("added {} entry {:?} at {}", self.category, value, i);
                Ok(i)
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(|bytes| text::decode(bytes))
    }

    fn check_open(&self, value: &str) -> Result<()> {
        if self.category.is_open() {
            Ok(())
        } else {
            Err(TcdError::InvalidEnumValue {
                category: self.category,
                value: value.to_string(),
            })
        }
    }

    fn append(&mut self, bytes: Vec<u8>) -> Result<usize> {
        let capacity = self.category.capacity();
        if self.entries.len() >= capacity {
            return Err(TcdError::TableFull {
                category: self.category,
                capacity,
            });
        }
        Ok(self.push(bytes))
    }

    fn push(&mut self, bytes: Vec<u8>) -> usize {
        let i = self.entries.len();
        self.index.entry(bytes.clone()).or_insert(i);
        self.entries.push(bytes);
        i
    }
}

/// All string categories of one database.
#[derive(Clone, Debug, PartialEq)]
pub struct StringTables {
    tables: HashMap<Category, StringTable>,
}

impl StringTables {
    /// Tables for a new database.
    pub fn seeded() -> Self {
        StringTables {
            tables: Category::ALL
                .iter()
                .map(|&c| (c, StringTable::seeded(c)))
                .collect(),
        }
    }

    pub(crate) fn from_tables(tables: Vec<StringTable>) -> Result<Self> {
        let mut by_category: HashMap<Category, StringTable> =
            tables.into_iter().map(|t| (t.category, t)).collect();
        for category in Category::ALL {
            by_category
                .entry(category)
                .or_insert_with(|| StringTable::seeded(category));
        }
        Ok(StringTables {
            tables: by_category,
        })
    }

    pub fn table(&self, category: Category) -> &StringTable {
        // every category is inserted on construction
        &self.tables[&category]
    }

    fn table_mut(&mut self, category: Category) -> &mut StringTable {
        self.tables
            .entry(category)
            .or_insert_with(|| StringTable::seeded(category))
    }

    pub fn len(&self, category: Category) -> usize {
        self.table(category).len()
    }

    /// Entries across every category.
    pub fn total(&self) -> usize {
        self.tables.values().map(StringTable::len).sum()
    }

    pub fn get(&self, category: Category, index: i64) -> String {
        self.table(category).get(index)
    }

    pub fn find(&self, category: Category, value: &str) -> Option<usize> {
        self.table(category).find(value)
    }

    pub fn add(&mut self, category: Category, value: &str) -> Result<usize> {
        self.table_mut(category).add(value)
    }

    pub fn find_or_add(&mut self, category: Category, value: &str) -> Result<usize> {
        self.table_mut(category).find_or_add(value)
    }
}

impl Default for StringTables {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_out_of_range_is_unknown() {
        let tables = StringTables::seeded();
        assert_eq!(tables.get(Category::Tzfile, 0), "Unknown");
        assert_eq!(tables.get(Category::Tzfile, 2), "Unknown");
        assert_eq!(tables.get(Category::Tzfile, -1), "Unknown");
        assert_eq!(tables.get(Category::Restriction, 0), "Public Domain");
        assert_eq!(tables.get(Category::Legalese, 0), "NULL");
    }

    #[test]
    fn test_find_or_add_is_idempotent() {
        let mut tables = StringTables::seeded();
        let before = tables.len(Category::Country);
        let first = tables.find_or_add(Category::Country, "Fü Islands").unwrap();
        let second = tables.find_or_add(Category::Country, "Fü Islands").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, before);
        assert_eq!(tables.len(Category::Country), before + 1);

        let other = tables.find_or_add(Category::Country, "Elsewhere").unwrap();
        assert_ne!(other, first);
        assert_eq!(tables.get(Category::Country, first as i64), "Fü Islands");
    }

    #[test]
    fn test_closed_category_never_grows() {
        let mut tables = StringTables::seeded();
        let before = tables.len(Category::LevelUnits);
        let err = tables.find_or_add(Category::LevelUnits, "furlongs").unwrap_err();
        assert!(matches!(
            err,
            TcdError::InvalidEnumValue {
                category: Category::LevelUnits,
                ..
            }
        ));
        assert!(tables.add(Category::DirectionUnits, "grads").is_err());
        assert_eq!(tables.len(Category::LevelUnits), before);
        assert_eq!(tables.find(Category::LevelUnits, "meters"), Some(2));
    }

    #[test]
    fn test_comparison_is_exact() {
        let tables = StringTables::seeded();
        assert_eq!(tables.find(Category::LevelUnits, "feet"), Some(1));
        assert_eq!(tables.find(Category::LevelUnits, "Feet"), None);
        assert_eq!(tables.find(Category::LevelUnits, "feet "), None);
    }

    #[test]
    fn test_table_full() {
        let mut table = StringTable::seeded(Category::Legalese);
        for i in table.len()..Category::Legalese.capacity() {
            table.add(&format!("notice {}", i)).unwrap();
        }
        assert!(matches!(
            table.find_or_add("one too many"),
            Err(TcdError::TableFull { capacity: 256, .. })
        ));
        // existing entries are still found
        assert_eq!(table.find_or_add("notice 10").unwrap(), 10);
    }
}
