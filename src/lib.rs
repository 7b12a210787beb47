//! # Tide Constituent Database Library
//!
//! This library reads and writes harmonic tide constituent databases: fixed
//! layout station records plus the database-wide tables they index into.
//! Two record kinds are supported:
//!
//! - **Reference stations** carry amplitude and epoch coefficients for each
//!   tidal constituent
//! - **Subordinate stations** carry time and level corrections applied to a
//!   reference station's predictions
//!
//! ## Design Overview
//!
//! ### Record Codec
//! Every station field is described by a [`codec::Descriptor`] pairing the
//! domain field with a packed representation. The packed conventions are
//! field-specific: sentinels that stand for "absent", interned strings held
//! in shared tables, `YYYYMMDD` dates, `±HHMM` time offsets, directions in
//! degrees and a folded `key:value` annotation block. The
//! [`assembler`] runs the per-kind attribute lists to convert whole records.
//!
//! ### Shared Tables
//! - [`ConstituentTable`]: the ordered constituents fixed when the database
//!   is created; a constituent's position addresses its slot in every
//!   coefficient array
//! - [`strings::StringTables`]: interned strings per category, either open
//!   (grown on demand) or closed (fixed set of units)
//!
//! ### Storage
//! The record codec talks to storage only through [`store::TideStore`].
//! [`store::MemoryStore`] keeps a database in memory and
//! [`store::file`] persists it as a single file.
//!
//! ### Access
//! [`Tcd`] is a handle on one database file. Only one database is loaded at
//! a time; the [`database::Arbiter`] serializes operations and swaps the
//! loaded database when a different file is targeted.
//!
//! ## Example
//! ```no_run
//! use tcd_lib::{Station, Tcd};
//!
//! let tcd = Tcd::open("harmonics.tcd")?;
//! for station in tcd.stations()? {
//!     if let Station::Subordinate(sub) = &station {
//!         println!("{} -> {}", sub.common.name, sub.reference_station.common.name);
//!     }
//! }
//! # Ok::<(), tcd_lib::TcdError>(())
//! ```

// Module declarations
pub mod assembler;
pub mod codec;
pub mod config;
pub mod constituent;
pub mod database;
pub mod error;
pub mod record;
pub mod scalar;
pub mod station;
pub mod store;
pub mod strings;
pub mod text;

pub use constituent::{Constituent, ConstituentTable, NodeFactor, NodeFactors};
pub use database::Tcd;
pub use error::{Result, TcdError};
pub use scalar::{TimeOffset, Xfields};
pub use station::{
    Coefficient, Coordinates, ReferenceStation, Station, StationCommon, SubordinateStation,
};
