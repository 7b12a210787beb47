//! Integration-style tests run against the library from the `tcd` binary crate.

mod cli_tests;
