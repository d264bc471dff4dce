// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::{self, Error, ErrorKind, Read};

use crate::system::Albert;

use super::{Image, Loader};

// Legacy ".403" object format from the 2006 toolchain: a stream of
// 4-hex-digit ASCII words. Header is object length then start address;
// the body always loads at 0x0403.

const LOAD_ADDRESS: u32 = 0x0403;

struct Obj403Image {
    start_address: u16,
    words: Vec<u16>,
}

impl Image for Obj403Image {
    fn mount(&mut self, albert: &mut Albert) {
        info!(target: "loader", "Mounting 403 image");
        let mut address = LOAD_ADDRESS;
        for word in &self.words {
            albert.write_mem(address, *word);
            address += 1;
        }
        albert.get_cpu_mut().set_pc(self.start_address);
    }
}

pub struct Obj403Loader;

impl Obj403Loader {
    pub fn new() -> Self {
        Self {}
    }
}

fn parse_word(raw: &[u8]) -> io::Result<u16> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::new(ErrorKind::InvalidData, "non-ASCII word in 403 file"))?;
    u16::from_str_radix(text, 16)
        .map_err(|_| Error::new(ErrorKind::InvalidData, format!("invalid hex word '{}'", text)))
}

impl Loader for Obj403Loader {
    fn load(&self, reader: &mut dyn Read) -> io::Result<Box<dyn Image>> {
        info!(target: "loader", "Loading 403 object file");
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        if raw.len() < 8 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "file is too small to be a valid 403 file",
            ));
        }
        let object_length = parse_word(&raw[0..4])?;
        let start_address = parse_word(&raw[4..8])?;
        let required_size = 8 + 4 * usize::from(object_length);
        if raw.len() != required_size {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "file size mismatch, actual {} expected {}",
                    raw.len(),
                    required_size
                ),
            ));
        }
        let mut words = Vec::with_capacity(usize::from(object_length));
        for i in 0..usize::from(object_length) {
            words.push(parse_word(&raw[8 + 4 * i..12 + 4 * i])?);
        }
        info!(
            target: "loader",
            "Object length {} words, start address 0x{:04X}",
            object_length, start_address
        );
        Ok(Box::new(Obj403Image {
            start_address,
            words,
        }))
    }
}
