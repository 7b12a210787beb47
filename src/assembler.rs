//! # Record Assembler
//!
//! Turns whole records into stations and back. Each record kind has an
//! ordered attribute list: the shared [`COMMON`] prefix followed by either
//! [`REFERENCE`] or [`SUBORDINATE`]. Unpacking runs every descriptor of the
//! list against the packed record and builds the station from the collected
//! fields; packing runs them against the station and writes the slots into a
//! record pre-filled with the non-zero sentinels.

use crate::codec::{self, Codec, Descriptor, Field, FieldMap, Value};
use crate::error::{Result, TcdError};
use crate::record::{RawRecord, RecordKind, Slot};
use crate::scalar::NULL_SLACK_OFFSET;
use crate::station::{ReferenceStation, Station, StationCommon, SubordinateStation};
use crate::store::TideStore;
use crate::strings::Category;

const fn text(field: Field, slot: Slot) -> Descriptor {
    Descriptor::new(
        field,
        Codec::Text {
            slot,
            nullable: false,
        },
    )
}

const fn optional_text(field: Field, slot: Slot) -> Descriptor {
    Descriptor::new(
        field,
        Codec::Text {
            slot,
            nullable: true,
        },
    )
}

const fn open_table(field: Field, slot: Slot, category: Category, null: Option<i64>) -> Descriptor {
    Descriptor::new(
        field,
        Codec::OpenTable {
            slot,
            category,
            null,
        },
    )
}

const fn closed_table(field: Field, slot: Slot, category: Category) -> Descriptor {
    Descriptor::new(field, Codec::ClosedTable { slot, category })
}

const fn date(field: Field, slot: Slot) -> Descriptor {
    Descriptor::new(field, Codec::Date { slot })
}

const fn offset(field: Field, slot: Slot, null: Option<i32>) -> Descriptor {
    Descriptor::new(field, Codec::Offset { slot, null })
}

const fn number(field: Field, slot: Slot, null: Option<i64>) -> Descriptor {
    Descriptor::new(field, Codec::Number { slot, null })
}

const fn real(field: Field, slot: Slot) -> Descriptor {
    Descriptor::new(field, Codec::Real { slot })
}

/// Fields every station carries.
pub const COMMON: &[Descriptor] = &[
    Descriptor::new(Field::RecordNumber, Codec::RecordNumber),
    Descriptor::new(Field::RecordKind, Codec::RecordKind),
    text(Field::Name, Slot::Name),
    Descriptor::new(Field::Coordinates, Codec::Coordinates),
    optional_text(Field::Source, Slot::Source),
    optional_text(Field::Comments, Slot::Comments),
    text(Field::Notes, Slot::Notes),
    optional_text(Field::StationIdContext, Slot::StationIdContext),
    optional_text(Field::StationId, Slot::StationId),
    Descriptor::new(Field::Xfields, Codec::Annotations { slot: Slot::Xfields }),
    date(Field::DateImported, Slot::DateImported),
    open_table(Field::Tzfile, Slot::Tzfile, Category::Tzfile, None),
    open_table(Field::Country, Slot::Country, Category::Country, None),
    open_table(Field::Restriction, Slot::Restriction, Category::Restriction, None),
    open_table(Field::Legalese, Slot::Legalese, Category::Legalese, Some(0)),
    closed_table(Field::LevelUnits, Slot::LevelUnits, Category::LevelUnits),
    closed_table(
        Field::DirectionUnits,
        Slot::DirectionUnits,
        Category::DirectionUnits,
    ),
    Descriptor::new(
        Field::MinDirection,
        Codec::Direction {
            slot: Slot::MinDirection,
        },
    ),
    Descriptor::new(
        Field::MaxDirection,
        Codec::Direction {
            slot: Slot::MaxDirection,
        },
    ),
];

/// Fields specific to reference stations.
pub const REFERENCE: &[Descriptor] = &[
    real(Field::DatumOffset, Slot::DatumOffset),
    open_table(Field::Datum, Slot::Datum, Category::Datum, Some(0)),
    offset(Field::ZoneOffset, Slot::ZoneOffset, None),
    date(Field::ExpirationDate, Slot::ExpirationDate),
    number(Field::MonthsOnStation, Slot::MonthsOnStation, Some(0)),
    date(Field::LastDateOnStation, Slot::LastDateOnStation),
    number(Field::Confidence, Slot::Confidence, None),
    Descriptor::new(Field::Coefficients, Codec::Coefficients),
];

/// Fields specific to subordinate stations.
pub const SUBORDINATE: &[Descriptor] = &[
    Descriptor::new(Field::ReferenceStation, Codec::ReferenceStation),
    offset(Field::MinTimeAdd, Slot::MinTimeAdd, Some(0)),
    real(Field::MinLevelAdd, Slot::MinLevelAdd),
    Descriptor::new(
        Field::MinLevelMultiply,
        Codec::Multiplier {
            slot: Slot::MinLevelMultiply,
        },
    ),
    offset(Field::MaxTimeAdd, Slot::MaxTimeAdd, Some(0)),
    real(Field::MaxLevelAdd, Slot::MaxLevelAdd),
    Descriptor::new(
        Field::MaxLevelMultiply,
        Codec::Multiplier {
            slot: Slot::MaxLevelMultiply,
        },
    ),
    offset(Field::FloodBegins, Slot::FloodBegins, Some(NULL_SLACK_OFFSET)),
    offset(Field::EbbBegins, Slot::EbbBegins, Some(NULL_SLACK_OFFSET)),
];

/// Attribute list of one record kind, common prefix first.
pub fn attributes(kind: RecordKind) -> impl Iterator<Item = &'static Descriptor> {
    let specific = match kind {
        RecordKind::Reference => REFERENCE,
        RecordKind::Subordinate => SUBORDINATE,
    };
    COMMON.iter().chain(specific.iter())
}

/// Build the station held in `rec`.
///
/// The kind comes from the record's own discriminant. A subordinate's
/// reference station is unpacked recursively.
pub fn unpack_record<S: TideStore + ?Sized>(store: &S, rec: &RawRecord) -> Result<Station> {
    let kind = rec.kind()?;
    let mut fields = FieldMap::new();
    for descriptor in attributes(kind) {
        if let Some((field, value)) = descriptor.unpack(store, rec)? {
            fields.insert(field, value);
        }
    }
    Station::from_fields(kind, &mut fields)
}

/// Pack `station` into a fresh record.
///
/// Open string tables may grow. For a subordinate station whose reference
/// is not stored yet, the reference is appended, but only once every other
/// field has packed successfully.
pub fn pack_record<S: TideStore + ?Sized>(store: &mut S, station: &Station) -> Result<RawRecord> {
    let mut rec = RawRecord::with_sentinels();
    let mut deferred = Vec::new();
    for descriptor in attributes(station.kind()) {
        if descriptor.codec == Codec::ReferenceStation {
            deferred.push(descriptor);
            continue;
        }
        for (slot, packed) in descriptor.pack(store, station)? {
            rec.set(slot, packed)?;
        }
    }
    for descriptor in deferred {
        for (slot, packed) in descriptor.pack(store, station)? {
            rec.set(slot, packed)?;
        }
    }
    Ok(rec)
}

/// Outcome of locating a subordinate's reference station in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// A record of the same kind and name was already stored here
    Existing(i32),
    /// The reference was appended at this index
    Appended(i32),
}

impl Resolution {
    pub fn index(self) -> i32 {
        match self {
            Resolution::Existing(i) | Resolution::Appended(i) => i,
        }
    }
}

/// Index of `reference` in the store, appending it when absent.
pub fn resolve_reference<S: TideStore + ?Sized>(
    store: &mut S,
    reference: &ReferenceStation,
) -> Result<Resolution> {
    let rec = pack_record(store, &Station::Reference(reference.clone()))?;
    if let Some(index) = find_match(store, &rec.name, RecordKind::Reference) {
        return Ok(Resolution::Existing(index));
    }
    let index = store.append(rec)?;
    log::info!(
        "appended reference station {:?} at {}",
        reference.common.name,
        index
    );
    Ok(Resolution::Appended(index))
}

/// Index of the first stored record with the same kind and name as `station`.
///
/// Only reads the store; nothing is packed or appended.
pub fn index_of<S: TideStore + ?Sized>(store: &S, station: &Station) -> Result<i32> {
    let name = crate::text::encode(station.name())?;
    find_match(store, &name, station.kind())
        .ok_or_else(|| TcdError::NotFound(format!("station {:?}", station.name())))
}

fn find_match<S: TideStore + ?Sized>(store: &S, name: &[u8], kind: RecordKind) -> Option<i32> {
    store.search(name).into_iter().find(|&i| {
        store
            .read(i)
            .map(|rec| rec.record_type == kind as u8)
            .unwrap_or(false)
    })
}

impl Station {
    /// Current value of one field.
    pub fn get(&self, field: Field) -> Result<Value> {
        codec::value_of(self, field)
    }

    /// Build a station of `kind` out of unpacked fields.
    ///
    /// Fails with `FieldType` when a value has the wrong shape for its field.
    pub fn from_fields(kind: RecordKind, fields: &mut FieldMap) -> Result<Station> {
        let common = common_from(fields)?;
        let station = match kind {
            RecordKind::Reference => Station::Reference(reference_from(common, fields)?),
            RecordKind::Subordinate => Station::Subordinate(SubordinateStation {
                common,
                reference_station: fields.reference(Field::ReferenceStation)?,
                min_time_add: fields.opt_offset(Field::MinTimeAdd)?,
                min_level_add: fields.real(Field::MinLevelAdd)?,
                min_level_multiply: fields.opt_real(Field::MinLevelMultiply)?,
                max_time_add: fields.opt_offset(Field::MaxTimeAdd)?,
                max_level_add: fields.real(Field::MaxLevelAdd)?,
                max_level_multiply: fields.opt_real(Field::MaxLevelMultiply)?,
                flood_begins: fields.opt_offset(Field::FloodBegins)?,
                ebb_begins: fields.opt_offset(Field::EbbBegins)?,
            }),
        };
        Ok(station)
    }
}

fn common_from(fields: &mut FieldMap) -> Result<StationCommon> {
    Ok(StationCommon {
        record_number: fields.opt_int(Field::RecordNumber)?,
        name: fields.text(Field::Name)?,
        coordinates: fields.coordinates(Field::Coordinates)?,
        tzfile: fields.text(Field::Tzfile)?,
        country: fields.text(Field::Country)?,
        source: fields.opt_text(Field::Source)?,
        restriction: fields.text(Field::Restriction)?,
        comments: fields.opt_text(Field::Comments)?,
        notes: fields.text(Field::Notes)?,
        legalese: fields.opt_text(Field::Legalese)?,
        station_id_context: fields.opt_text(Field::StationIdContext)?,
        station_id: fields.opt_text(Field::StationId)?,
        date_imported: fields.opt_date(Field::DateImported)?,
        xfields: fields.xfields(Field::Xfields)?,
        direction_units: fields.text(Field::DirectionUnits)?,
        level_units: fields.text(Field::LevelUnits)?,
        min_direction: fields.opt_int(Field::MinDirection)?,
        max_direction: fields.opt_int(Field::MaxDirection)?,
    })
}

fn reference_from(common: StationCommon, fields: &mut FieldMap) -> Result<ReferenceStation> {
    Ok(ReferenceStation {
        common,
        datum_offset: fields.real(Field::DatumOffset)?,
        datum: fields.opt_text(Field::Datum)?,
        zone_offset: fields.offset(Field::ZoneOffset)?,
        expiration_date: fields.opt_date(Field::ExpirationDate)?,
        months_on_station: fields.opt_int(Field::MonthsOnStation)?,
        last_date_on_station: fields.opt_date(Field::LastDateOnStation)?,
        confidence: fields.int(Field::Confidence)?,
        coefficients: fields.coefficients(Field::Coefficients)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituent::{Constituent, ConstituentTable, NodeFactor, NodeFactors};
    use crate::scalar::{TimeOffset, NULL_DIRECTION};
    use crate::station::{Coefficient, Coordinates};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn store() -> MemoryStore {
        let factors = vec![
            NodeFactor {
                equilibrium: 0.5,
                node_factor: 1.0,
            };
            4
        ];
        let constituents = [
            Constituent::new("J1", 15.585_443_3, NodeFactors::new(1990, factors.clone())),
            Constituent::new("K1", 15.041_068_6, NodeFactors::new(1990, factors.clone())),
            Constituent::new("M2", 28.984_104_2, NodeFactors::new(1990, factors)),
        ];
        MemoryStore::new(ConstituentTable::build(&constituents).unwrap())
    }

    fn reference(store: &MemoryStore) -> ReferenceStation {
        let table = store.constituents();
        let mut station = ReferenceStation::new(
            "San Francisco, San Francisco Bay, California",
            vec![
                Coefficient::new(1.9, 219.0, table.by_name("M2").unwrap().clone()),
                Coefficient::new(1.2, 105.5, table.by_name("K1").unwrap().clone()),
            ],
        );
        station.common.coordinates = Some(Coordinates::new(37.8063, -122.4659));
        station.common.country = "United States".to_string();
        station.common.tzfile = ":America/Los_Angeles".to_string();
        station.common.level_units = "feet".to_string();
        station.common.source = Some("CO-OPS Metadata".to_string());
        station.common.station_id = Some("9414290".to_string());
        station.common.date_imported = NaiveDate::from_ymd_opt(2001, 2, 3);
        station.common.xfields.insert("Credit", "NOAA\nCO-OPS");
        station.common.min_direction = Some(0);
        station.datum = Some("Mean Lower Low Water".to_string());
        station.datum_offset = 3.1;
        station.zone_offset = TimeOffset::hm(-8, 0);
        station.months_on_station = Some(227);
        station.expiration_date = NaiveDate::from_ymd_opt(2030, 12, 31);
        station
    }

    fn subordinate(reference: ReferenceStation) -> SubordinateStation {
        let mut station = SubordinateStation::new("Alameda, San Francisco Bay", reference);
        station.common.coordinates = Some(Coordinates::new(37.7717, -122.3));
        station.common.level_units = "feet".to_string();
        station.min_time_add = Some(TimeOffset::hm(0, 38));
        station.max_time_add = Some(TimeOffset::hm(-1, -5));
        station.min_level_add = 0.1;
        station.max_level_multiply = Some(1.12);
        station.flood_begins = Some(TimeOffset::ZERO);
        station
    }

    /// Coefficients come back in table order.
    fn normalized(mut station: ReferenceStation, store: &MemoryStore) -> ReferenceStation {
        let table = store.constituents();
        station
            .coefficients
            .sort_by_key(|c| table.position(&c.constituent.name));
        station
    }

    #[test]
    fn test_reference_roundtrip() {
        let mut store = store();
        let original = reference(&store);
        let rec = pack_record(&mut store, &Station::Reference(original.clone())).unwrap();
        assert_eq!(rec.record_type, RecordKind::Reference as u8);
        assert_eq!(rec.reference_station, -1);
        assert_eq!(rec.max_direction, NULL_DIRECTION);
        assert_eq!(rec.date_imported, 20010203);
        assert_eq!(rec.zone_offset, -800);

        let index = store.append(rec).unwrap();
        let unpacked = unpack_record(&store, &store.read(index).unwrap()).unwrap();

        let mut expected = normalized(original, &store);
        expected.common.record_number = Some(index);
        assert_eq!(unpacked, Station::Reference(expected));
    }

    #[test]
    fn test_subordinate_appends_missing_reference() {
        let mut store = store();
        let reference = reference(&store);
        let sub = Station::Subordinate(subordinate(reference.clone()));

        let rec = pack_record(&mut store, &sub).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(rec.reference_station, 0);
        assert_eq!(rec.flood_begins, 0);
        assert_eq!(rec.min_time_add, 38);
        assert_eq!(rec.max_time_add, -105);

        let index = store.append(rec).unwrap();
        let Station::Subordinate(unpacked) = unpack_record(&store, &store.read(index).unwrap()).unwrap()
        else {
            panic!("expected a subordinate station");
        };
        assert_eq!(unpacked.common.record_number, Some(1));
        assert_eq!(unpacked.flood_begins, Some(TimeOffset::ZERO));
        assert_eq!(unpacked.ebb_begins, None);
        assert_eq!(unpacked.min_level_multiply, None);
        assert_eq!(unpacked.max_level_multiply, Some(1.12));
        assert_eq!(unpacked.reference_station.common.record_number, Some(0));

        let mut expected_reference = normalized(reference.clone(), &store);
        expected_reference.common.record_number = Some(0);
        let mut expected = subordinate(expected_reference);
        expected.common.record_number = Some(1);
        assert_eq!(unpacked, expected);
    }

    #[test]
    fn test_index_of_leaves_store_untouched() {
        let mut store = store();
        let reference = reference(&store);
        let sub = subordinate(reference.clone());
        resolve_reference(&mut store, &reference).unwrap();
        let rec = pack_record(&mut store, &Station::Subordinate(sub.clone())).unwrap();
        store.append(rec).unwrap();

        let len = store.len();
        let strings = store.strings().clone();
        let mut lookup = sub;
        lookup.reference_station = Box::new(ReferenceStation::new("Never Stored", Vec::new()));
        lookup.common.country = "Atlantis".to_string();
        assert_eq!(index_of(&store, &Station::Subordinate(lookup)).unwrap(), 1);
        assert_eq!(store.len(), len);
        assert_eq!(store.strings(), &strings);
    }

    #[test]
    fn test_existing_reference_is_reused() {
        let mut store = store();
        let reference = reference(&store);
        let first = resolve_reference(&mut store, &reference).unwrap();
        let second = resolve_reference(&mut store, &reference).unwrap();
        assert_eq!(first, Resolution::Appended(0));
        assert_eq!(second, Resolution::Existing(0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_pack_appends_nothing() {
        let mut store = store();
        let mut sub = subordinate(reference(&store));
        sub.min_level_multiply = Some(-2.0);
        assert!(matches!(
            pack_record(&mut store, &Station::Subordinate(sub)),
            Err(TcdError::InvalidMultiply(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let store = store();
        let rec = RawRecord {
            record_type: 9,
            ..RawRecord::with_sentinels()
        };
        assert!(matches!(
            unpack_record(&store, &rec),
            Err(TcdError::UnknownRecordKind(9))
        ));
    }

    #[test]
    fn test_dangling_reference_is_unresolved() {
        let store = store();
        let rec = RawRecord {
            record_type: RecordKind::Subordinate as u8,
            reference_station: 5,
            ..RawRecord::with_sentinels()
        };
        assert!(matches!(
            unpack_record(&store, &rec),
            Err(TcdError::UnresolvedReference(_))
        ));
        let rec = RawRecord {
            record_type: RecordKind::Subordinate as u8,
            ..RawRecord::with_sentinels()
        };
        assert!(matches!(
            unpack_record(&store, &rec),
            Err(TcdError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_index_of_matches_kind_and_name() {
        let mut store = store();
        let reference = reference(&store);
        let name = reference.common.name.clone();
        resolve_reference(&mut store, &reference).unwrap();

        let same = Station::Reference(ReferenceStation::new(name.clone(), Vec::new()));
        assert_eq!(index_of(&store, &same).unwrap(), 0);

        let other_kind = Station::Subordinate(SubordinateStation::new(name, reference));
        assert!(matches!(
            index_of(&store, &other_kind),
            Err(TcdError::NotFound(_))
        ));
    }

    #[test]
    fn test_station_get() {
        let store = store();
        let station = Station::Reference(reference(&store));
        assert_eq!(
            station.get(Field::Datum).unwrap(),
            Value::Text("Mean Lower Low Water".to_string())
        );
        assert_eq!(station.get(Field::Comments).unwrap(), Value::Null);
        assert!(station.get(Field::EbbBegins).is_err());
    }

    #[test]
    fn test_attribute_lists() {
        assert_eq!(attributes(RecordKind::Reference).count(), 19 + 8);
        assert_eq!(attributes(RecordKind::Subordinate).count(), 19 + 9);
        assert_eq!(
            attributes(RecordKind::Subordinate).nth(19).map(|d| d.field),
            Some(Field::ReferenceStation)
        );
    }
}
