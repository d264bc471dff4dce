// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::error::Error;
use std::path::PathBuf;

use structopt::StructOpt;

use albert16::system::Config;

#[derive(StructOpt, Debug)]
#[structopt(name = "albert16")]
pub struct Opt {
    /// load V4 object file at startup
    #[structopt(parse(from_os_str))]
    pub image: Option<PathBuf>,

    /// boot ROM image, one hex word per line
    #[structopt(long, default_value = "loader_from_zero.txt", parse(from_os_str))]
    pub rom: PathBuf,
    /// simulated clock frequency in ticks per second
    #[structopt(long, default_value = "10000000")]
    pub frequency: u32,
    /// disable the per-second elapsed time output
    #[structopt(long = "notime")]
    pub no_time: bool,

    // -- Devices
    /// bring up the disk and terminal controller ports
    #[structopt(long)]
    pub controllers: bool,
    /// console serial TCP port
    #[structopt(long = "console-port", default_value = "5000")]
    pub console_port: u16,
    /// disk controller TCP port
    #[structopt(long = "disk-port", default_value = "5600")]
    pub disk_port: u16,
    /// terminal controller TCP port
    #[structopt(long = "terminal-port", default_value = "6000")]
    pub terminal_port: u16,

    // -- Debug
    /// set breakpoint at this physical address (hex)
    #[structopt(long, parse(try_from_str = parse_hex))]
    pub bp: Vec<u32>,

    // -- Logging
    /// set log level
    #[structopt(long = "loglevel", default_value = "info")]
    pub log_level: String,
    /// set log level for a target
    #[structopt(long = "log", parse(try_from_str = parse_key_val))]
    pub log_target_level: Vec<(String, String)>,
}

pub fn build_config(opt: &Opt) -> Config {
    let mut config = Config::new();
    config.rom_image = opt.rom.clone();
    config.frequency = opt.frequency;
    config.print_time = !opt.no_time;
    config.console_port = opt.console_port;
    config.disk_port = opt.disk_port;
    config.terminal_port = opt.terminal_port;
    config.enable_controllers = opt.controllers;
    config
}

fn parse_hex(s: &str) -> Result<u32, Box<dyn Error>> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| Box::<dyn Error>::from(format!("invalid hex address `{}`", s)))
}

fn parse_key_val(s: &str) -> Result<(String, String), Box<dyn Error>> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
