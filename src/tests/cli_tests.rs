//! Command line parsing and station formatting of the `tcd` binary.

use std::path::PathBuf;

use tcd_lib::{ReferenceStation, Station, SubordinateStation, TimeOffset};

use crate::{describe, parse_args, summary, Command, Invocation};

fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn parses_commands_with_default_config() {
    let parsed = parse_args(args(&["list"])).unwrap();
    assert_eq!(
        parsed,
        Invocation {
            config: PathBuf::from("tcd-config.toml"),
            command: Command::List,
        }
    );
    assert_eq!(
        parse_args(args(&["show", "-1"])).unwrap().command,
        Command::Show(-1)
    );
    assert_eq!(
        parse_args(args(&["delete", "12"])).unwrap().command,
        Command::Delete(12)
    );
}

#[test]
fn config_flag_can_appear_anywhere() {
    let parsed = parse_args(args(&["header", "--config", "/etc/tcd.toml"])).unwrap();
    assert_eq!(parsed.config, PathBuf::from("/etc/tcd.toml"));
    assert_eq!(parsed.command, Command::Header);
}

#[test]
fn find_joins_name_words() {
    let parsed = parse_args(args(&["find", "Boston,", "Massachusetts"])).unwrap();
    assert_eq!(
        parsed.command,
        Command::Find("Boston, Massachusetts".to_string())
    );
}

#[test]
fn rejects_bad_invocations() {
    assert!(parse_args(args(&[])).is_err());
    assert!(parse_args(args(&["frobnicate"])).is_err());
    assert!(parse_args(args(&["show"])).is_err());
    assert!(parse_args(args(&["show", "first"])).is_err());
    assert!(parse_args(args(&["find"])).is_err());
    assert!(parse_args(args(&["list", "--config"])).is_err());
}

#[test]
fn describes_subordinate_offsets() {
    let mut reference = ReferenceStation::new("Portland", Vec::new());
    reference.common.record_number = Some(4);
    let mut sub = SubordinateStation::new("Cape Elizabeth", reference);
    sub.flood_begins = Some(TimeOffset::ZERO);
    sub.max_time_add = Some(TimeOffset::hm(-1, -5));
    let text = describe(&Station::Subordinate(sub));

    assert!(text.starts_with("#- Cape Elizabeth\n"));
    assert!(text.contains("reference:    #4 Portland"));
    assert!(text.contains("flood/ebb:    0:00 / -"));
    assert!(text.contains("high:         -01:05"));
    assert!(text.contains("position:     unknown"));
}

#[test]
fn summary_marks_kind() {
    let station = Station::Reference(ReferenceStation::new("Eastport", Vec::new()));
    assert_eq!(summary(7, &station), "     7 R Eastport");
}
