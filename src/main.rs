//! # Tide Constituent Database Tool
//!
//! Command line access to a tide constituent database. The database path
//! comes from `tcd-config.toml` (or the file given with `--config`).
//!
//! ```text
//! tcd [--config FILE] header
//! tcd [--config FILE] list
//! tcd [--config FILE] show <index>
//! tcd [--config FILE] find <name>
//! tcd [--config FILE] constituents
//! tcd [--config FILE] delete <index>
//! ```
//!
//! Set `RUST_LOG=debug` to trace record reads and writes.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::{anyhow, bail, Context};
use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;

use tcd_lib::config::{Config, CONFIG_FILE};
use tcd_lib::{Station, Tcd};

/// A parsed command line.
#[derive(Debug, PartialEq)]
struct Invocation {
    config: PathBuf,
    command: Command,
}

#[derive(Debug, PartialEq)]
enum Command {
    Header,
    List,
    Show(isize),
    Find(String),
    Constituents,
    Delete(isize),
}

const USAGE: &str =
    "usage: tcd [--config FILE] <header|list|show INDEX|find NAME|constituents|delete INDEX>";

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Invocation> {
    let mut args = args.into_iter();
    let mut config = PathBuf::from(CONFIG_FILE);
    let mut words = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config = args
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("--config needs a file name"))?;
        } else {
            words.push(arg);
        }
    }

    let index = |word: Option<&String>| -> anyhow::Result<isize> {
        let word = word.ok_or_else(|| anyhow!(USAGE))?;
        word.parse()
            .with_context(|| format!("invalid record index {:?}", word))
    };

    let command = match words.first().map(String::as_str) {
        Some("header") => Command::Header,
        Some("list") => Command::List,
        Some("show") => Command::Show(index(words.get(1))?),
        Some("find") => {
            if words.len() < 2 {
                bail!(USAGE);
            }
            Command::Find(words[1..].join(" "))
        }
        Some("constituents") => Command::Constituents,
        Some("delete") => Command::Delete(index(words.get(1))?),
        _ => bail!(USAGE),
    };
    Ok(Invocation { config, command })
}

/// Multi-line description of one station.
fn describe(station: &Station) -> String {
    let c = station.common();
    let mut out = String::new();
    let number = c
        .record_number
        .map_or_else(|| "-".to_string(), |n| n.to_string());
    let _ = writeln!(out, "#{} {}", number, c.name);
    match c.coordinates {
        Some(p) => {
            let _ = writeln!(out, "  position:     {:.4}, {:.4}", p.latitude, p.longitude);
        }
        None => {
            let _ = writeln!(out, "  position:     unknown");
        }
    }
    let _ = writeln!(out, "  country:      {}", c.country);
    let _ = writeln!(out, "  tzfile:       {}", c.tzfile);
    let _ = writeln!(out, "  restriction:  {}", c.restriction);
    let _ = writeln!(out, "  units:        {} / {}", c.level_units, c.direction_units);
    if let Some(id) = &c.station_id {
        let _ = writeln!(out, "  station id:   {}", id);
    }
    if let Some(date) = c.date_imported {
        let _ = writeln!(out, "  imported:     {}", date);
    }
    for (key, value) in c.xfields.iter() {
        let _ = writeln!(out, "  {}: {}", key, value.replace('\n', " / "));
    }

    match station {
        Station::Reference(r) => {
            let _ = writeln!(out, "  kind:         reference");
            let _ = writeln!(out, "  zone offset:  {}", r.zone_offset);
            let _ = writeln!(
                out,
                "  datum:        {} {}",
                r.datum_offset,
                r.datum.as_deref().unwrap_or("(none)")
            );
            let _ = writeln!(out, "  confidence:   {}", r.confidence);
            for coeff in &r.coefficients {
                let _ = writeln!(
                    out,
                    "    {:<10} {:>9.4} {:>8.2}",
                    coeff.constituent.name, coeff.amplitude, coeff.epoch
                );
            }
        }
        Station::Subordinate(s) => {
            let offset = |o: Option<tcd_lib::TimeOffset>| {
                o.map_or_else(|| "-".to_string(), |o| o.to_string())
            };
            let multiply = |m: Option<f32>| m.map_or_else(|| "-".to_string(), |m| m.to_string());
            let _ = writeln!(out, "  kind:         subordinate");
            let _ = writeln!(
                out,
                "  reference:    #{} {}",
                s.reference_station
                    .common
                    .record_number
                    .map_or_else(|| "-".to_string(), |n| n.to_string()),
                s.reference_station.common.name
            );
            let _ = writeln!(
                out,
                "  low:          {} {:+} x{}",
                offset(s.min_time_add),
                s.min_level_add,
                multiply(s.min_level_multiply)
            );
            let _ = writeln!(
                out,
                "  high:         {} {:+} x{}",
                offset(s.max_time_add),
                s.max_level_add,
                multiply(s.max_level_multiply)
            );
            let _ = writeln!(
                out,
                "  flood/ebb:    {} / {}",
                offset(s.flood_begins),
                offset(s.ebb_begins)
            );
        }
    }
    out
}

/// One-line summary used by `list` and `find`.
fn summary(index: i32, station: &Station) -> String {
    let kind = match station {
        Station::Reference(_) => 'R',
        Station::Subordinate(_) => 'S',
    };
    format!("{:>6} {} {}", index, kind, station.name())
}

fn run(invocation: Invocation) -> anyhow::Result<()> {
    let config = Config::load_from_path(&invocation.config);
    let tcd = Tcd::open(&config.database.path)
        .with_context(|| format!("opening {}", config.database.path.display()))?;

    match invocation.command {
        Command::Header => {
            let header = tcd.header()?;
            println!("{}", header.version);
            println!("revision:      {}.{}", header.major_rev, header.minor_rev);
            println!("modified:      {}", header.last_modified);
            println!("records:       {}", header.number_of_records);
            println!(
                "years:         {}..{}",
                header.start_year,
                header.start_year + header.number_of_years as i32
            );
            println!("constituents:  {}", header.constituents);
            println!("countries:     {}", header.countries);
            println!("tzfiles:       {}", header.tzfiles);
            println!("datums:        {}", header.datum_types);
            println!("restrictions:  {}", header.restriction_types);
            println!("legaleses:     {}", header.legaleses);
            println!("level units:   {}", header.level_unit_types);
            println!("dir units:     {}", header.dir_unit_types);
        }
        Command::List => {
            for station in tcd.stations()? {
                println!("{}", summary(station.record_number().unwrap_or(-1), &station));
            }
        }
        Command::Show(index) => {
            print!("{}", describe(&tcd.get(index)?));
        }
        Command::Find(name) => {
            let found = tcd.find_all(&name)?;
            if found.is_empty() {
                bail!("no station named {:?}", name);
            }
            for station in &found {
                println!("{}", summary(station.record_number().unwrap_or(-1), station));
            }
        }
        Command::Constituents => {
            let table = tcd.constituents()?;
            println!(
                "{} constituents, years {}..{}",
                table.len(),
                table.start_year(),
                table.end_year()
            );
            for (i, constituent) in table.iter().enumerate() {
                println!(
                    "{:>4} {:<10} {:>14.7} deg/h",
                    i, constituent.name, constituent.speed
                );
            }
        }
        Command::Delete(index) => {
            let station = tcd.get(index)?;
            tcd.remove(index)?;
            println!("deleted {}", station.name());
        }
    }
    tcd.close()?;
    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let invocation = parse_args(env::args().skip(1))?;
    run(invocation)
}
