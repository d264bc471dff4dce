// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io::{self, Cursor, Error, ErrorKind, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::system::Albert;

use super::{Image, Loader};

// V4 object format, big-endian 16-bit words:
//   +0  magic word 0 (0x0000)
//   +2  magic word 1 (0x0004)
//   +4  code size (words)
//   +6  code load address
//   +8  code start address (becomes PC)
//   +10 data size (words)
//   +12 data load address
//   +14 code words, then data words

const HEADER_SIZE: usize = 14;
const MAGIC_0: u16 = 0x0000;
const MAGIC_1: u16 = 0x0004;

struct V4Image {
    code: Vec<u16>,
    code_load_address: u16,
    code_start_address: u16,
    data: Vec<u16>,
    data_load_address: u16,
}

impl Image for V4Image {
    fn mount(&mut self, albert: &mut Albert) {
        info!(target: "loader", "Mounting V4 image");
        let mut address = u32::from(self.code_load_address);
        for word in &self.code {
            albert.write_mem(address, *word);
            address += 1;
        }
        let mut address = u32::from(self.data_load_address);
        for word in &self.data {
            albert.write_mem(address, *word);
            address += 1;
        }
        albert.get_cpu_mut().set_pc(self.code_start_address);
    }
}

pub struct V4Loader;

impl V4Loader {
    pub fn new() -> Self {
        Self {}
    }
}

impl Loader for V4Loader {
    fn load(&self, reader: &mut dyn Read) -> io::Result<Box<dyn Image>> {
        info!(target: "loader", "Loading V4 object file");
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        if raw.len() < HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "file is too small to be a valid V4 file",
            ));
        }
        let mut cursor = Cursor::new(&raw);
        let magic_0 = cursor.read_u16::<BigEndian>()?;
        let magic_1 = cursor.read_u16::<BigEndian>()?;
        if magic_0 != MAGIC_0 || magic_1 != MAGIC_1 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "incorrect magic {:04X} {:04X}, expected 0000:0004",
                    magic_0, magic_1
                ),
            ));
        }
        let code_size = cursor.read_u16::<BigEndian>()?;
        let code_load_address = cursor.read_u16::<BigEndian>()?;
        let code_start_address = cursor.read_u16::<BigEndian>()?;
        let data_size = cursor.read_u16::<BigEndian>()?;
        let data_load_address = cursor.read_u16::<BigEndian>()?;
        let required_size = HEADER_SIZE + 2 * (usize::from(code_size) + usize::from(data_size));
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
        let mut code = Vec::with_capacity(usize::from(code_size));
        for _ in 0..code_size {
            code.push(cursor.read_u16::<BigEndian>()?);
        }
        let mut data = Vec::with_capacity(usize::from(data_size));
        for _ in 0..data_size {
            data.push(cursor.read_u16::<BigEndian>()?);
        }
        info!(
            target: "loader",
            "Code {} words at 0x{:04X} start 0x{:04X}, data {} words at 0x{:04X}",
            code_size, code_load_address, code_start_address, data_size, data_load_address
        );
        Ok(Box::new(V4Image {
            code,
            code_load_address,
            code_start_address,
            data,
            data_load_address,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn build_v4(code: &[u16], code_load: u16, start: u16, data: &[u16], data_load: u16) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.write_u16::<BigEndian>(MAGIC_0).unwrap();
        raw.write_u16::<BigEndian>(MAGIC_1).unwrap();
        raw.write_u16::<BigEndian>(code.len() as u16).unwrap();
        raw.write_u16::<BigEndian>(code_load).unwrap();
        raw.write_u16::<BigEndian>(start).unwrap();
        raw.write_u16::<BigEndian>(data.len() as u16).unwrap();
        raw.write_u16::<BigEndian>(data_load).unwrap();
        for word in code.iter().chain(data.iter()) {
            raw.write_u16::<BigEndian>(*word).unwrap();
        }
        raw
    }

    #[test]
    fn rejects_bad_magic() {
        let mut raw = build_v4(&[1, 2], 0x400, 0x400, &[], 0);
        raw[3] = 0x05;
        let loader = V4Loader::new();
        assert!(loader.load(&mut raw.as_slice()).is_err());
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut raw = build_v4(&[1, 2, 3], 0x400, 0x400, &[], 0);
        raw.push(0x00);
        let loader = V4Loader::new();
        assert!(loader.load(&mut raw.as_slice()).is_err());
    }

    #[test]
    fn rejects_truncated_header() {
        let raw = vec![0u8; 6];
        let loader = V4Loader::new();
        assert!(loader.load(&mut raw.as_slice()).is_err());
    }

    #[test]
    fn accepts_well_formed_file() {
        let raw = build_v4(&[0x0002, 0x0007, 0x0003], 0x0400, 0x0400, &[0xaaaa], 0x2000);
        let loader = V4Loader::new();
        assert!(loader.load(&mut raw.as_slice()).is_ok());
    }
}
