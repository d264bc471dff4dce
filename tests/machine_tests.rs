// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

extern crate albert16;

use albert16::core::{new_shared, new_shared_cell, Chip, Shared, SharedCell};
use albert16::cpu::{Cpu, Opcode, Status, FALSE};
use albert16::io::{Counter, InterruptController, IrqSource};
use albert16::mem::{chip_select, Device, Memory, Ram, Rom};

const CODE_BASE: u16 = 0x0400;
const INTERRUPT_VECTOR: u16 = 0xfd00;

struct TestRig {
    cpu: Cpu,
    mem: Shared<Memory>,
    int_ctl: Shared<InterruptController>,
    counter: Shared<Counter>,
}

impl TestRig {
    fn build() -> Self {
        let mut mem = Memory::new();
        mem.add_device(chip_select::RAM, Device::Ram(new_shared(Ram::new(1 << 20))));
        mem.add_device(chip_select::ROM, Device::Rom(new_shared(Rom::new())));
        let int_ctl = new_shared(InterruptController::new());
        let counter = new_shared(Counter::new());
        let mem = new_shared(mem);
        let cpu = Cpu::new(mem.clone(), int_ctl.clone());
        Self {
            cpu,
            mem,
            int_ctl,
            counter,
        }
    }

    fn load(&mut self, base: u16, code: &[u16]) {
        let mut address = u32::from(base);
        for word in code {
            self.mem.borrow_mut().write(address, *word);
            address += 1;
        }
    }

    /// One instruction time: ticks the devices and the cpu in driver order
    /// until the cpu reports something other than TickOnly.
    fn step(&mut self) -> Status {
        loop {
            self.counter.borrow_mut().tick();
            self.int_ctl.borrow_mut().tick();
            let status = self.cpu.tick();
            if status != Status::TickOnly {
                return status;
            }
        }
    }

    fn run_to_halt(&mut self) {
        loop {
            match self.step() {
                Status::Normal => {}
                Status::Halt => return,
                status => panic!("unexpected status {:?}", status),
            }
        }
    }
}

#[test]
fn exec_arithmetic_program() {
    let mut rig = TestRig::build();
    rig.load(
        CODE_BASE,
        &[
            Opcode::DoLit as u16,
            0x0003,
            Opcode::DoLit as u16,
            0x0005,
            Opcode::Plus as u16,
            Opcode::Halt as u16,
        ],
    );
    rig.cpu.set_pc(CODE_BASE);
    rig.run_to_halt();
    assert_eq!(0x0008, rig.cpu.get_regs().ptos);
    // PC sits one word past the HALT
    assert_eq!(CODE_BASE + 6, rig.cpu.get_pc());
}

#[test]
fn exec_branch_false_skips_literal() {
    let mut rig = TestRig::build();
    rig.load(
        CODE_BASE,
        &[
            Opcode::DoLit as u16,
            FALSE,
            Opcode::Jmpf as u16,
            CODE_BASE + 6,
            Opcode::DoLit as u16,
            0xbeef,
            Opcode::Halt as u16,
        ],
    );
    rig.cpu.set_pc(CODE_BASE);
    rig.run_to_halt();
    assert_eq!(0x0000, rig.cpu.get_regs().ptos);
    assert_eq!(CODE_BASE + 7, rig.cpu.get_pc());
}

#[test]
fn exec_call_and_return() {
    let mut rig = TestRig::build();
    let initial_rsp = rig.cpu.get_regs().rsp;
    rig.load(
        CODE_BASE,
        &[
            Opcode::Jsr as u16,
            CODE_BASE + 3,
            Opcode::Halt as u16,
            Opcode::DoLit as u16,
            0x0042,
            Opcode::Ret as u16,
        ],
    );
    rig.cpu.set_pc(CODE_BASE);
    rig.run_to_halt();
    assert_eq!(0x0042, rig.cpu.get_regs().ptos);
    assert_eq!(initial_rsp, rig.cpu.get_regs().rsp);
    assert_eq!(CODE_BASE + 3, rig.cpu.get_pc());
}

fn setup_line(rig: &TestRig, line: usize, mask: u16) -> SharedCell<bool> {
    let signal = new_shared_cell(false);
    let mut int_ctl = rig.int_ctl.borrow_mut();
    int_ctl.set_source(line, IrqSource::Line(signal.clone()));
    int_ctl.set_mask(mask);
    signal
}

#[test]
fn exec_interrupt_round_trip() {
    let mut rig = TestRig::build();
    let signal = setup_line(&rig, 0, 0x0001);
    rig.load(CODE_BASE, &[Opcode::Ei as u16, Opcode::Nop as u16]);
    rig.load(INTERRUPT_VECTOR, &[Opcode::Reti as u16]);
    rig.cpu.set_pc(CODE_BASE);
    assert_eq!(Status::Normal, rig.step()); // EI
    let before = *rig.cpu.get_regs();
    signal.set(true);
    assert_eq!(Status::Normal, rig.step()); // interrupt gate fires JSRINT
    assert_eq!(INTERRUPT_VECTOR, rig.cpu.get_pc());
    // hold the source off and unlatch so the handler's return is final
    signal.set(false);
    rig.int_ctl.borrow_mut().write(2, 0xffff);
    assert_eq!(Status::Normal, rig.step()); // RETI
    let after = *rig.cpu.get_regs();
    assert_eq!(before, after);
    // the interrupted instruction is still the next to execute
    assert_eq!(CODE_BASE + 1, rig.cpu.get_pc());
}

#[test]
fn counter_interrupt_latches_once_per_wrap() {
    let mut rig = TestRig::build();
    {
        let mut int_ctl = rig.int_ctl.borrow_mut();
        int_ctl.set_source(1, IrqSource::CounterZero(rig.counter.clone()));
        int_ctl.set_mask(0x0002);
    }
    // Park the cpu on a spin loop so the devices can run a full counter
    // period: BRA back to itself.
    rig.load(
        CODE_BASE,
        &[Opcode::Bra as u16, CODE_BASE, Opcode::Halt as u16],
    );
    rig.cpu.set_pc(CODE_BASE);
    // The counter leaves zero on its first increment and returns to zero
    // after 0x10000 increments of 8 ticks each.
    for _ in 0..8 * 0x10000u32 {
        rig.counter.borrow_mut().tick();
        rig.int_ctl.borrow_mut().tick();
        rig.cpu.tick();
    }
    assert_eq!(0x0002, rig.int_ctl.borrow_mut().read(0) & 0x0002);
    // write-1-to-clear drops the latch and it stays down while the counter
    // is away from zero
    rig.int_ctl.borrow_mut().write(2, 0x0002);
    for _ in 0..8 * 16 {
        rig.counter.borrow_mut().tick();
        rig.int_ctl.borrow_mut().tick();
    }
    assert_eq!(0x0000, rig.int_ctl.borrow_mut().read(0) & 0x0002);
}

#[test]
fn unknown_opcode_is_surfaced() {
    let mut rig = TestRig::build();
    rig.load(CODE_BASE, &[0x0abc]);
    rig.cpu.set_pc(CODE_BASE);
    assert_eq!(Status::Unknown, rig.step());
}
