//! `device scan` / `device add` (§4.7), paired `*_cmd`/`cmd_*` functions
//! in the same style as the teacher's `device_add_cmd`/`cmd_device_add`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use uuid::Uuid;

use volmgr_core::device::FilesystemRegistry;

use super::fixture::{Fixture, FixtureDevice};

pub fn scan_cmd() -> Command {
    Command::new("scan")
        .about("Scan paths for volume-manager superblocks and print a summary")
        .arg(Arg::new("paths").required(true).num_args(1..).action(ArgAction::Append))
}

pub fn cmd_device_scan(argv: Vec<String>) -> Result<()> {
    let matches = scan_cmd().get_matches_from(argv);
    let paths: Vec<&String> = matches.get_many::<String>("paths").unwrap().collect();

    let mut registry = FilesystemRegistry::new();
    for path in &paths {
        registry.scan_path(std::path::Path::new(path), 0);
    }

    for fs in registry.iter() {
        println!("fsid {} ({} device(s))", fs.fsid, fs.devices.len());
        for dev in &fs.devices {
            println!("  devid {:<4} {}", dev.devid, dev.path.display());
        }
    }
    Ok(())
}

pub fn add_cmd() -> Command {
    Command::new("add")
        .about("Add a device record to a fixture's device catalog")
        .arg(Arg::new("fixture").required(true).help("Path to the fixture JSON file"))
        .arg(Arg::new("path").required(true).help("Host path recorded for the new device (no I/O is performed)"))
        .arg(
            Arg::new("size")
                .long("size")
                .required(true)
                .help("Device capacity in bytes"),
        )
        .arg(
            Arg::new("sector-size")
                .long("sector-size")
                .default_value("512"),
        )
}

pub fn cmd_device_add(argv: Vec<String>) -> Result<()> {
    let matches = add_cmd().get_matches_from(argv);
    let fixture_path = PathBuf::from(matches.get_one::<String>("fixture").unwrap());
    let dev_path = matches.get_one::<String>("path").unwrap();
    let total_bytes: u64 = matches.get_one::<String>("size").unwrap().parse().context("parsing --size")?;
    let sector_size: u32 = matches.get_one::<String>("sector-size").unwrap().parse().context("parsing --sector-size")?;

    let mut fixture = if fixture_path.exists() {
        Fixture::load(&fixture_path)?
    } else {
        Fixture::empty(Uuid::new_v4())
    };

    let next_devid = fixture.devices.iter().map(|d| d.devid).max().unwrap_or(0) + 1;
    fixture.devices.push(FixtureDevice { devid: next_devid, uuid: Uuid::new_v4(), total_bytes, bytes_used: 0, sector_size });
    fixture.save(&fixture_path)?;

    println!("added devid {next_devid} ({dev_path}, {total_bytes} bytes) to {}", fixture_path.display());
    Ok(())
}
