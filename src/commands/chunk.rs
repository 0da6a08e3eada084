//! `chunk alloc` (§4.7): exercise `alloc_chunk` against a fixture.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Arg, Command};

use volmgr_core::bitmask::BlockGroupType;
use volmgr_core::chunk::{alloc_chunk, Catalogs};

use super::fixture::Fixture;

pub fn alloc_cmd() -> Command {
    Command::new("alloc")
        .about("Allocate a chunk against a fixture and print its (logical_start, length)")
        .arg(Arg::new("fixture").required(true).help("Path to the fixture JSON file"))
        .arg(Arg::new("type").required(true).help("data | metadata | system, optionally suffixed with +raid0"))
        .arg(Arg::new("owner").long("owner").default_value("1"))
}

fn parse_chunk_type(spec: &str) -> Result<BlockGroupType> {
    let mut parts = spec.split('+');
    let base = parts.next().unwrap_or("");
    let mut ty = match base {
        "data" => BlockGroupType::DATA,
        "metadata" => BlockGroupType::METADATA,
        "system" => BlockGroupType::SYSTEM,
        other => bail!("unknown chunk type '{other}' (expected data, metadata, or system)"),
    };
    for modifier in parts {
        match modifier {
            "raid0" => ty |= BlockGroupType::RAID0,
            other => bail!("unknown chunk type modifier '{other}'"),
        }
    }
    Ok(ty)
}

pub fn cmd_chunk_alloc(argv: Vec<String>) -> Result<()> {
    let matches = alloc_cmd().get_matches_from(argv);
    let fixture_path = PathBuf::from(matches.get_one::<String>("fixture").unwrap());
    let chunk_type = parse_chunk_type(matches.get_one::<String>("type").unwrap())?;
    let owner: u64 = matches.get_one::<String>("owner").unwrap().parse().context("parsing --owner")?;

    let mut fixture = Fixture::load(&fixture_path)?;
    let fsid = fixture.fsid;
    let mut runtime = fixture.to_runtime()?;

    let (start, length) = {
        let mut catalogs = Catalogs { chunks: &mut runtime.chunk_catalog, dev_extents: &mut runtime.dev_extent_catalog };
        alloc_chunk(&mut runtime.fs, &mut catalogs, &mut runtime.mapping, owner, chunk_type)?
    };

    fixture = Fixture::from_runtime(fsid, &runtime);
    fixture.save(&fixture_path)?;

    println!("allocated chunk at logical_start={start} length={length}");
    Ok(())
}
