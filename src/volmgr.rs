mod commands;

use std::process::{ExitCode, Termination};

/// Print usage grouped by subcommand, descriptions pulled from the clap
/// tree built in `commands::build_cli` — mirrors the teacher's
/// `bcachefs_usage`.
fn usage() {
    let cmd = commands::build_cli();
    println!("volmgr - diagnostic CLI for the multi-device volume manager");
    println!("usage: volmgr <command> [<args>]\n");
    for sub in cmd.get_subcommands() {
        let about = sub.get_about().map(|s| s.to_string()).unwrap_or_default();
        let children: Vec<_> = sub.get_subcommands().collect();
        if children.is_empty() {
            println!("  {:<24}{about}", sub.get_name());
        } else {
            println!("{about}");
            for child in children {
                let child_about = child.get_about().map(|s| s.to_string()).unwrap_or_default();
                println!("  {} {:<20}{child_about}", sub.get_name(), child.get_name());
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "--help" | "-h" | "help" => {
            usage();
            ExitCode::SUCCESS
        }
        "device" => match args.get(2).map(|s| s.as_str()) {
            Some("scan") => commands::device::cmd_device_scan(args[2..].to_vec()).report(),
            Some("add") => commands::device::cmd_device_add(args[2..].to_vec()).report(),
            _ => {
                println!("usage: volmgr device <scan|add> ...");
                ExitCode::from(1)
            }
        },
        "chunk" => match args.get(2).map(|s| s.as_str()) {
            Some("alloc") => commands::chunk::cmd_chunk_alloc(args[2..].to_vec()).report(),
            _ => {
                println!("usage: volmgr chunk alloc ...");
                ExitCode::from(1)
            }
        },
        "map-block" => commands::map::cmd_map_block(args[1..].to_vec()).report(),
        other => {
            println!("unknown command '{other}'");
            usage();
            ExitCode::from(1)
        }
    }
}
