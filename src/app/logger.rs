// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cmp;
use std::collections::HashMap;
use std::str::FromStr;

use log::{LevelFilter, Log, Metadata, Record};

pub struct Logger {
    level: LevelFilter,
    targets: HashMap<String, LevelFilter>,
}

impl Logger {
    pub fn build(level: &str) -> Result<Logger, String> {
        let level =
            LevelFilter::from_str(level).map_err(|_| format!("invalid log level {}", level))?;
        Ok(Logger {
            level,
            targets: HashMap::new(),
        })
    }

    pub fn add_target(&mut self, target: String, level: &str) -> Result<(), String> {
        let level = LevelFilter::from_str(level)
            .map_err(|_| format!("invalid log level {} for target {}", level, &target))?;
        self.targets.insert(target, level);
        Ok(())
    }

    pub fn enable(logger: Logger) -> Result<(), String> {
        let max_level = logger
            .targets
            .values()
            .fold(logger.level, |acc, level| cmp::max(acc, *level));
        log::set_max_level(max_level);
        log::set_boxed_logger(Box::new(logger))
            .map_err(|_| "cannot initialize logging".to_string())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let level = self
            .targets
            .get(metadata.target())
            .cloned()
            .unwrap_or(self.level);
        metadata.level() <= level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!(
                "{} [{}] - {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
