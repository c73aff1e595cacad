// This file is part of mindyd, an application to bring up and service the Mindy RTL design over PCIe.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// mindyd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// mindyd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! mindy_cli - command-line client of the mindyd daemon.
//!
//! Every command is one or a few calls to the daemon's `io.mindyd` DBus interfaces on the
//! system bus. Errors raised by the daemon arrive as DBus method errors whose message
//! starts with the `MindyError` variant, and are printed as they are.
//!
//! ```bash
//! mindy_cli status
//! mindy_cli read data_fetch 0x34 --wide
//! mindy_cli write rdmx_shim 0x28 8192
//! mindy_cli set host-frame-addr 0 1 0x7f0000000
//! mindy_cli frame-counter increment 0
//! ```

mod proxies;
mod register;
mod set;
mod status;

use clap::{Parser, Subcommand, arg, command};
use log::debug;
use register::FrameCounterCommand;
use set::{Setting, parse_number, parse_u32};

#[derive(Parser, Debug)]
#[command(name = "mindy_cli")]
#[command(bin_name = "mindy_cli")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Device state, RTL revision, link status and interrupt counters
    Status,
    /// Bring the device up again, e.g. after a failed bring-up at daemon start
    BringUp,
    /// Read a register of an RTL module
    Read {
        module: String,
        #[arg(value_parser = parse_u32)]
        offset: u32,
        #[arg(long, help = "64-bit access of the words at offset (high) and offset + 4 (low)")]
        wide: bool,
    },
    /// Write a register of an RTL module
    Write {
        module: String,
        #[arg(value_parser = parse_u32)]
        offset: u32,
        #[arg(value_parser = parse_number)]
        value: u64,
        #[arg(long, help = "64-bit access of the words at offset (high) and offset + 4 (low)")]
        wide: bool,
    },
    /// Configure a host or remote buffer
    Set {
        #[command(subcommand)]
        setting: Setting,
    },
    /// Print every buffer setting
    Buffers,
    /// Fail unless a QSFP channel has link
    Channel { channel: u32 },
    /// Interrupt counters, of one source or of all that fired
    Interrupts { source: Option<u32> },
    FrameCounter {
        #[command(subcommand)]
        command: FrameCounterCommand,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");
    let result = match cli.command {
        Commands::Status => status::status_handler().await,
        Commands::BringUp => set::connect_control().await?.bring_up().await,
        Commands::Read {
            module,
            offset,
            wide,
        } => register::read_handler(&module, offset, wide).await,
        Commands::Write {
            module,
            offset,
            value,
            wide,
        } => register::write_handler(&module, offset, value, wide).await,
        Commands::Set { setting } => set::set_handler(&setting).await,
        Commands::Buffers => status::buffers_handler().await,
        Commands::Channel { channel } => status::channel_handler(channel).await,
        Commands::Interrupts { source } => status::interrupts_handler(source).await,
        Commands::FrameCounter { command } => register::frame_counter_handler(&command).await,
    };
    match result {
        Ok(msg) => println!("{msg}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
