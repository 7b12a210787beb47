//! # Constituent Table
//!
//! The database-wide, ordered set of harmonic constituents. A constituent's
//! position in the table is the slot its amplitude and epoch occupy in every
//! reference station's coefficient arrays, so the order is fixed when the
//! database is created and never changes afterwards.
//!
//! ## Year Range
//!
//! Each constituent carries node factors for a contiguous `[start, end)`
//! range of years. A table only keeps the years every constituent covers:
//!
//! ```text
//! M2:  1970 ─────────── 1975
//! S2:        1972 ───────────── 1980
//! table:     1972 ───── 1975          (3 years)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TcdError};

/// Number of coefficient slots in a packed reference station.
pub const MAX_CONSTITUENTS: usize = 255;

/// Astronomical corrections for one year.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeFactor {
    /// Equilibrium argument (degrees)
    pub equilibrium: f32,
    /// Node factor (dimensionless amplitude multiplier)
    pub node_factor: f32,
}

/// Per-year node factors over a contiguous range of years.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeFactors {
    start_year: i32,
    factors: Vec<NodeFactor>,
}

impl NodeFactors {
    pub fn new(start_year: i32, factors: Vec<NodeFactor>) -> Self {
        NodeFactors {
            start_year,
            factors,
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// First year past the covered range.
    pub fn end_year(&self) -> i32 {
        self.start_year + self.factors.len() as i32
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn get(&self, year: i32) -> Option<NodeFactor> {
        let offset = usize::try_from(year - self.start_year).ok()?;
        self.factors.get(offset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, NodeFactor)> + '_ {
        (self.start_year..).zip(self.factors.iter().copied())
    }

    /// The factors for `[start_year, end_year)`, which must lie inside the range.
    fn slice(&self, start_year: i32, end_year: i32) -> NodeFactors {
        let from = (start_year - self.start_year) as usize;
        let to = (end_year - self.start_year) as usize;
        NodeFactors::new(start_year, self.factors[from..to].to_vec())
    }
}

/// A named periodic component of the tide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub name: String,
    /// Angular speed in degrees per hour
    pub speed: f64,
    pub node_factors: NodeFactors,
}

impl Constituent {
    pub fn new(name: impl Into<String>, speed: f64, node_factors: NodeFactors) -> Self {
        Constituent {
            name: name.into(),
            speed,
            node_factors,
        }
    }
}

/// Ordered, immutable set of constituents shared by the whole database.
#[derive(Debug, PartialEq)]
pub struct ConstituentTable {
    constituents: Vec<Arc<Constituent>>,
    positions: HashMap<String, usize>,
    start_year: i32,
    num_years: usize,
}

impl ConstituentTable {
    /// Build a table from constituents in their intended slot order.
    ///
    /// Node factors are cut down to the years common to every constituent.
    ///
    /// # Errors
    /// - `EmptyYearRange` if the constituents share no year (or none are given)
    /// - `DuplicateConstituent` if a name appears twice
    /// - `TooManyConstituents` past [`MAX_CONSTITUENTS`]
    pub fn build(constituents: &[Constituent]) -> Result<Self> {
        if constituents.len() > MAX_CONSTITUENTS {
            return Err(TcdError::TooManyConstituents(constituents.len()));
        }
        let start_year = constituents
            .iter()
            .map(|c| c.node_factors.start_year())
            .max();
        let end_year = constituents
            .iter()
            .map(|c| c.node_factors.end_year())
            .min();
        let (start_year, end_year) = match (start_year, end_year) {
            (Some(start), Some(end)) if end - start >= 1 => (start, end),
            (start, end) => {
                return Err(TcdError::EmptyYearRange {
                    start_year: start.unwrap_or_default(),
                    end_year: end.unwrap_or_default(),
                })
            }
        };

        let mut positions = HashMap::with_capacity(constituents.len());
        let mut table = Vec::with_capacity(constituents.len());
        for (i, c) in constituents.iter().enumerate() {
            if positions.insert(c.name.clone(), i).is_some() {
                return Err(TcdError::DuplicateConstituent(c.name.clone()));
            }
            table.push(Arc::new(Constituent {
                name: c.name.clone(),
                speed: c.speed,
                node_factors: c.node_factors.slice(start_year, end_year),
            }));
        }

        Ok(ConstituentTable {
            constituents: table,
            positions,
            start_year,
            num_years: (end_year - start_year) as usize,
        })
    }

    /// Rebuild a table from stored constituents that already share one range.
    pub(crate) fn from_stored(constituents: Vec<Constituent>) -> Result<Self> {
        let table = Self::build(&constituents)?;
        let consistent = constituents.iter().all(|c| {
            c.node_factors.start_year() == table.start_year
                && c.node_factors.len() == table.num_years
        });
        if !consistent {
            return Err(TcdError::InvalidFile(
                "constituents disagree on their year range".to_string(),
            ));
        }
        Ok(table)
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + self.num_years as i32
    }

    pub fn num_years(&self) -> usize {
        self.num_years
    }

    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Constituent>> {
        self.constituents.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Constituent>> {
        self.position(name).map(|i| &self.constituents[i])
    }

    /// Slot index of the named constituent.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Constituent>> {
        self.constituents.iter()
    }

    pub(crate) fn to_stored(&self) -> Vec<Constituent> {
        self.constituents.iter().map(|c| (**c).clone()).collect()
    }
}
