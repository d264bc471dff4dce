// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[macro_use]
extern crate log;

mod app;

use std::process;

use structopt::StructOpt;

use albert16::system::Albert;

use crate::app::cli::{self, Opt};
use crate::app::console::ConsoleApp;
use crate::app::logger::Logger;

static NAME: &str = "albert16";

fn main() {
    let opt = Opt::from_args();
    match run(&opt) {
        Ok(_) => process::exit(0),
        Err(err) => {
            println!("Error: {}", err);
            process::exit(1)
        }
    };
}

fn init_logging(opt: &Opt) -> Result<(), String> {
    let mut logger = Logger::build(&opt.log_level)?;
    for (target, level) in &opt.log_target_level {
        logger.add_target(target.clone(), level)?;
    }
    Logger::enable(logger)?;
    Ok(())
}

fn run(opt: &Opt) -> Result<(), String> {
    init_logging(opt)?;
    info!("Starting {}", NAME);
    let config = cli::build_config(opt);
    let mut albert = Albert::build(&config).map_err(|err| format!("{}", err))?;
    for bp in &opt.bp {
        albert.get_cpu_mut().set_breakpoint(*bp);
    }
    let mut app = ConsoleApp::new(albert);
    if let Some(ref image) = opt.image {
        app.load_image(image)?;
    }
    app.run();
    Ok(())
}
