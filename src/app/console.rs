// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use albert16::cpu::Status;
use albert16::loader::{Image, LoaderKind, Loaders};
use albert16::system::Albert;

pub struct ConsoleApp {
    albert: Albert,
    interrupted: Arc<AtomicBool>,
}

impl ConsoleApp {
    pub fn new(albert: Albert) -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        // SIGINT only latches a flag; the run loop honors it at the next
        // cycle boundary so an instruction is never cancelled mid-flight.
        let flag = interrupted.clone();
        if let Err(error) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            warn!(target: "main", "Failed to install SIGINT handler, error - {}", error);
        }
        Self {
            albert,
            interrupted,
        }
    }

    pub fn load_image(&mut self, path: &Path) -> Result<(), String> {
        let ext = path.extension().and_then(|s| s.to_str());
        let kind = LoaderKind::from_ext(ext).unwrap_or(LoaderKind::V4);
        let loader = Loaders::from(kind);
        let mut file = File::open(path).map_err(|err| format!("{}", err))?;
        let mut image = loader.load(&mut file).map_err(|err| format!("{}", err))?;
        image.mount(&mut self.albert);
        Ok(())
    }

    pub fn run(&mut self) {
        loop {
            let selection = read_input("Enter menu choice >");
            match selection.as_str() {
                "r" => self.run_simulator(),
                "s" => self.step_simulator(),
                "S" => self.show_stacks(),
                "d" => self.show_status(),
                "b" => self.set_breakpoint(),
                "c" => self.clear_breakpoint(),
                "B" => self.show_breakpoints(),
                "L" => self.load_object_file(),
                "m" => self.dump_memory(),
                "p" => self.set_pc(),
                "R" => self.albert.reset(),
                "H" => self.albert.get_cpu().get_history().display(1000),
                "h" => help_message(),
                "q" => break,
                "" => {}
                _ => println!("Unknown selection; h shows the menu"),
            }
        }
    }

    fn run_simulator(&mut self) {
        self.interrupted.store(false, Ordering::Relaxed);
        println!("Running simulator");
        let status = self.albert.run(&self.interrupted);
        self.report_status(status);
    }

    fn step_simulator(&mut self) {
        self.interrupted.store(false, Ordering::Relaxed);
        let (status, num_ticks) = self.albert.step();
        self.report_status(status);
        println!("Single Stepped. NumTicks was {}", num_ticks);
        println!("{}", self.albert.get_cpu());
    }

    fn report_status(&self, status: Status) {
        match status {
            Status::Halt => println!("\n  *** Saw Halt instruction ***\n"),
            Status::Breakpoint => println!("Encountered breakpoint"),
            Status::Unknown => println!("Unknown opcode; simulation stopped"),
            _ => {}
        }
    }

    fn show_stacks(&self) {
        let regs = *self.albert.get_cpu().get_regs();
        let mut line = String::from("PSTACK => ");
        for depth in (1..=10u16).rev() {
            let value = self.albert.read_mem(u32::from(regs.psp.wrapping_sub(depth)));
            line.push_str(&format!("{:04X} ", value));
        }
        line.push_str(&format!("PTOS:{:04X}", regs.ptos));
        println!("{}", line);
        let mut line = String::from("RSTACK => ");
        for depth in (1..=10u16).rev() {
            let value = self.albert.read_mem(u32::from(regs.rsp.wrapping_sub(depth)));
            line.push_str(&format!("{:04X} ", value));
        }
        line.push_str(&format!("RTOS:{:04X}", regs.rtos));
        println!("{}", line);
    }

    fn show_status(&self) {
        println!("{}", self.albert.get_cpu());
        let int_ctl = self.albert.get_int_ctl();
        println!("Interrupt state {}", int_ctl.borrow().get_output_line());
        println!("{}", int_ctl.borrow());
    }

    fn set_breakpoint(&mut self) {
        let text = read_input("Enter PC (in hex) for breakpoint >");
        match u32::from_str_radix(&text, 16) {
            Ok(address) => self.albert.get_cpu_mut().set_breakpoint(address),
            Err(_) => println!("Invalid hex string.  Breakpoint was not set."),
        }
    }

    fn clear_breakpoint(&mut self) {
        let text = read_input("Enter PC (in hex) for breakpoint to clear >");
        match u32::from_str_radix(&text, 16) {
            Ok(address) => self.albert.get_cpu_mut().clear_breakpoint(address),
            Err(_) => println!("Invalid hex string.  Breakpoint was not cleared."),
        }
    }

    fn show_breakpoints(&self) {
        for address in self.albert.get_cpu().list_breakpoints() {
            println!("{:08X}", address);
        }
    }

    fn load_object_file(&mut self) {
        let filename = read_input("Enter object file name >");
        if filename.is_empty() {
            return;
        }
        if let Err(error) = self.load_image(Path::new(&filename)) {
            println!("Could not load [{}]: {}", filename, error);
        }
    }

    fn dump_memory(&self) {
        let text = read_input("Enter starting address (in hex) >");
        let start = match u32::from_str_radix(&text, 16) {
            Ok(address) => address,
            Err(_) => {
                println!("Invalid hex string.");
                return;
            }
        };
        for offset in 0..16 {
            let address = start + offset;
            let value = self.albert.read_mem(address);
            let printable = if value >= 32 && value <= 126 {
                (value as u8 as char).to_string()
            } else {
                "NP".to_string()
            };
            println!("  {:05X}: {:04X} {:>3}", address, value, printable);
        }
    }

    fn set_pc(&mut self) {
        let text = read_input("Enter PC (in hex) >");
        match u16::from_str_radix(&text, 16) {
            Ok(pc) => self.albert.get_cpu_mut().set_pc(pc),
            Err(_) => println!("Invalid hex string.  PC was not set."),
        }
    }
}

fn read_input(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(_) => line.trim().to_string(),
        Err(_) => String::new(),
    }
}

fn help_message() {
    println!("HELP");
    println!("   r - run the simulator");
    println!("   s - step simulator");
    println!("   S - Show stacks");
    println!("   b - Set break point");
    println!("   c - clear break point");
    println!("   B - Show Break points");
    println!("   L - Load object file (V4 or legacy 403)");
    println!("   m - dump memory");
    println!("   d - display CPU status");
    println!("   H - display History");
    println!("   p - Set PC");
    println!("   R - reset computer");
    println!("   q - quit the simulator");
}
