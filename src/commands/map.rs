//! `map-block` (§4.7): exercise `MappingIndex::map_block` against a fixture.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, Command};

use super::fixture::Fixture;

pub fn map_block_cmd() -> Command {
    Command::new("map-block")
        .about("Translate a logical offset to (devid, physical, length) using a fixture")
        .arg(Arg::new("fixture").required(true).help("Path to the fixture JSON file"))
        .arg(Arg::new("logical").required(true).help("Logical byte offset to translate"))
}

pub fn cmd_map_block(argv: Vec<String>) -> Result<()> {
    let matches = map_block_cmd().get_matches_from(argv);
    let fixture_path = PathBuf::from(matches.get_one::<String>("fixture").unwrap());
    let logical: u64 = matches.get_one::<String>("logical").unwrap().parse().context("parsing logical offset")?;

    let fixture = Fixture::load(&fixture_path)?;
    let runtime = fixture.to_runtime()?;

    let mapped = runtime.mapping.map_block(logical)?;
    println!("devid={} physical={} length={}", mapped.devid, mapped.physical, mapped.length);
    Ok(())
}
