//! Subcommand aggregation, mirroring the teacher's `commands::build_cli`
//! (one `Command` tree assembled from each subcommand module) and its
//! `cmd_*` dispatch functions.

pub mod chunk;
pub mod device;
pub mod fixture;
pub mod map;

use clap::Command;

pub fn build_cli() -> Command {
    Command::new("volmgr")
        .about("Diagnostic CLI for the multi-device volume manager")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("device")
                .about("Device registry operations")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(device::scan_cmd())
                .subcommand(device::add_cmd()),
        )
        .subcommand(
            Command::new("chunk")
                .about("Chunk allocator operations")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(chunk::alloc_cmd()),
        )
        .subcommand(map::map_block_cmd())
}
