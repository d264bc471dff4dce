// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::{new_shared, Chip, Clock, Shared};
use crate::cpu::{Cpu, Status};
use crate::io::{Counter, InterruptController, IrqSource, SerialPort};
use crate::loader;
use crate::mem::{chip_select, Device, Memory, Ram, Rom};

use super::config::Config;

// Design:
//   Albert represents the machine itself and all of its components; the
//   chip select wiring and interrupt source wiring of the hardware live
//   here. The driver loop advances every device exactly once per simulated
//   cycle, in a fixed order, and surfaces the cpu status to the caller.

const RAM_SIZE: usize = 1 << 20;

mod slot {
    pub const CONSOLE: usize = 0;
    pub const INT_CTL: usize = 1;
    pub const COUNTER: usize = 2;
    pub const TERMINAL: usize = 3;
    pub const DISK: usize = 9;
}

mod irq_line {
    pub const COUNTER_ZERO: usize = 1;
    pub const DISK_RX_HALF: usize = 4;
    pub const TERMINAL_RX_QUARTER: usize = 5;
}

pub struct Albert {
    // Chipset
    cpu: Cpu,
    counter: Shared<Counter>,
    int_ctl: Shared<InterruptController>,
    // Peripherals
    console_port: Shared<SerialPort>,
    disk_port: Option<Shared<SerialPort>>,
    terminal_port: Option<Shared<SerialPort>>,
    // Memory
    mem: Shared<Memory>,
    ram: Shared<Ram>,
    // Runtime State
    clock: Clock,
}

impl Albert {
    /// Builds the machine: loads the boot ROM, brings up the serial ports
    /// (each blocks until its TCP client connects) and wires every device
    /// to the memory map and the interrupt controller.
    pub fn build(config: &Config) -> io::Result<Albert> {
        info!(target: "albert", "Initializing system");
        let rom_image = loader::load_rom_image(&config.rom_image)?;
        let rom = new_shared(Rom::new_with_data(&rom_image));
        let ram = new_shared(Ram::new(RAM_SIZE));
        let counter = new_shared(Counter::new());
        let int_ctl = new_shared(InterruptController::new());
        let console_port = new_shared(SerialPort::bind(
            "Console Serial Port",
            config.console_port,
        )?);
        let (disk_port, terminal_port) = if config.enable_controllers {
            let disk = new_shared(SerialPort::bind("Disk Controller", config.disk_port)?);
            let terminal = new_shared(SerialPort::bind(
                "Terminal Controller",
                config.terminal_port,
            )?);
            (Some(disk), Some(terminal))
        } else {
            (None, None)
        };

        // Chip select wiring
        let mut mem = Memory::new();
        mem.add_device(chip_select::ROM, Device::Rom(rom));
        mem.add_device(chip_select::RAM, Device::Ram(ram.clone()));
        mem.add_device(slot::CONSOLE, Device::Chip(console_port.clone()));
        mem.add_device(slot::INT_CTL, Device::Chip(int_ctl.clone()));
        mem.add_device(slot::COUNTER, Device::Chip(counter.clone()));
        if let Some(ref port) = terminal_port {
            mem.add_device(slot::TERMINAL, Device::Chip(port.clone()));
        }
        if let Some(ref port) = disk_port {
            mem.add_device(slot::DISK, Device::Chip(port.clone()));
        }
        let mem = new_shared(mem);

        // Interrupt source wiring
        {
            let mut int_ctl_mut = int_ctl.borrow_mut();
            int_ctl_mut.set_source(
                irq_line::COUNTER_ZERO,
                IrqSource::CounterZero(counter.clone()),
            );
            if let Some(ref port) = disk_port {
                int_ctl_mut.set_source(irq_line::DISK_RX_HALF, IrqSource::RxHalfFull(port.clone()));
            }
            if let Some(ref port) = terminal_port {
                int_ctl_mut.set_source(
                    irq_line::TERMINAL_RX_QUARTER,
                    IrqSource::RxQuarterFull(port.clone()),
                );
            }
        }

        let cpu = Cpu::new(mem.clone(), int_ctl.clone());
        Ok(Albert {
            cpu,
            counter,
            int_ctl,
            console_port,
            disk_port,
            terminal_port,
            mem,
            ram,
            clock: Clock::new(config.frequency, config.print_time),
        })
    }

    pub fn get_cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn get_cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn get_int_ctl(&self) -> Shared<InterruptController> {
        self.int_ctl.clone()
    }

    pub fn get_counter(&self) -> Shared<Counter> {
        self.counter.clone()
    }

    pub fn get_clock(&self) -> &Clock {
        &self.clock
    }

    pub fn read_mem(&self, address: u32) -> u16 {
        self.mem.borrow().read(address)
    }

    pub fn write_mem(&mut self, address: u32, value: u16) {
        self.mem.borrow_mut().write(address, value);
    }

    /// Restores the power-on state of cpu, ram and serial fifos. Counter,
    /// interrupt controller and clock keep running, as on the hardware.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.ram.borrow_mut().clear();
        self.console_port.borrow_mut().reset();
        if let Some(ref port) = self.disk_port {
            port.borrow_mut().reset();
        }
        if let Some(ref port) = self.terminal_port {
            port.borrow_mut().reset();
        }
        info!(target: "albert", "The computer has been reset");
    }

    /// Advances the whole machine by one clock tick. Every component ticks
    /// exactly once; the cpu consumes 8 ticks per instruction and reports
    /// TickOnly in between.
    pub fn tick(&mut self) -> Status {
        self.clock.tick();
        self.console_port.borrow_mut().tick();
        if let Some(ref port) = self.disk_port {
            port.borrow_mut().tick();
        }
        if let Some(ref port) = self.terminal_port {
            port.borrow_mut().tick();
        }
        self.counter.borrow_mut().tick();
        self.int_ctl.borrow_mut().tick();
        self.cpu.tick()
    }

    /// Runs until HALT, a breakpoint, an unknown opcode or the interrupt
    /// flag is raised. Cancellation lands on a cycle boundary, never in the
    /// middle of an instruction.
    pub fn run(&mut self, interrupted: &AtomicBool) -> Status {
        let mut status = Status::TickOnly;
        loop {
            if interrupted.load(Ordering::Relaxed) {
                info!(target: "albert", "Simulation stopped by keyboard interrupt");
                break;
            }
            status = self.tick();
            match status {
                Status::Normal | Status::TickOnly => {}
                Status::Halt | Status::Breakpoint | Status::Unknown => break,
            }
        }
        status
    }

    /// Single step: ticks until the cpu reports something other than
    /// TickOnly. Returns the final status and the number of ticks consumed.
    pub fn step(&mut self) -> (Status, u32) {
        let mut num_ticks = 0;
        loop {
            let status = self.tick();
            num_ticks += 1;
            if status != Status::TickOnly {
                return (status, num_ticks);
            }
        }
    }
}
