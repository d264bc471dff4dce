// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashSet;
use std::fmt;

use bit_field::BitField;

use crate::core::Shared;
use crate::io::InterruptController;
use crate::mem::{Memory, ADDRESS_MASK};

use super::history::{History, Snapshot};
use super::instruction::Opcode;

// Design:
//   Cpu models the Albert dual-stack processor. Both stacks live in data
//   memory with the top element cached in a register; segment registers
//   widen the 16-bit offsets to a 20-bit physical space. The cpu advances
//   instruction state on every 8th tick and otherwise reports TickOnly.
//   Memory is reached through the shared bus and the interrupt request
//   line comes from the interrupt controller's aggregate output.

pub const TRUE: u16 = 0xffff;
pub const FALSE: u16 = 0x0000;

const TICKS_PER_INSTRUCTION: u8 = 8;
const INITIAL_PSP: u16 = 0xff00;
const INITIAL_RSP: u16 = 0xfe00;
const INTERRUPT_VECTOR: u16 = 0xfd00;
const SYSCALL_VECTOR: u16 = 0xfd02;

/// Outcome of one cpu tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Status {
    Normal,
    Halt,
    Breakpoint,
    TickOnly,
    Unknown,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Registers {
    pub pc: u16,
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub psp: u16,
    pub rsp: u16,
    pub ptos: u16,
    pub rtos: u16,
    pub int_ctl_low: u8,
}

impl Registers {
    pub fn new() -> Self {
        let mut regs = Self::default();
        regs.reset();
        regs
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.cs = 0;
        self.ds = 0;
        self.es = 0;
        self.psp = INITIAL_PSP;
        self.rsp = INITIAL_RSP;
        self.ptos = 0;
        self.rtos = 0;
        self.int_ctl_low = 0;
    }
}

pub struct Cpu {
    // Dependencies
    mem: Shared<Memory>,
    int_ctl: Shared<InterruptController>,
    // Runtime State
    regs: Registers,
    tick_num: u8,
    history: History,
    // Debug State
    breakpoints: HashSet<u32>,
    previous_breakpoint: Option<u32>,
}

impl Cpu {
    pub fn new(mem: Shared<Memory>, int_ctl: Shared<InterruptController>) -> Self {
        Self {
            mem,
            int_ctl,
            regs: Registers::new(),
            tick_num: 0,
            history: History::new(),
            breakpoints: HashSet::new(),
            previous_breakpoint: None,
        }
    }

    // -- Getters/Setters

    pub fn get_regs(&self) -> &Registers {
        &self.regs
    }

    pub fn get_pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn set_pc(&mut self, value: u16) {
        self.regs.pc = value;
    }

    pub fn get_history(&self) -> &History {
        &self.history
    }

    // -- Breakpoints

    pub fn set_breakpoint(&mut self, address: u32) {
        self.breakpoints.insert(address & ADDRESS_MASK);
    }

    pub fn clear_breakpoint(&mut self, address: u32) {
        self.breakpoints.remove(&(address & ADDRESS_MASK));
    }

    pub fn list_breakpoints(&self) -> Vec<u32> {
        let mut addresses: Vec<u32> = self.breakpoints.iter().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn reset(&mut self) {
        self.regs.reset();
        self.tick_num = 0;
        self.history.clear();
        self.previous_breakpoint = None;
    }

    /// Advances the internal sub-cycle counter and, on every 8th call,
    /// executes the interrupt gate, the breakpoint gate or one instruction.
    pub fn tick(&mut self) -> Status {
        self.tick_num = (self.tick_num + 1) % TICKS_PER_INSTRUCTION;
        if self.tick_num != 0 {
            return Status::TickOnly;
        }

        let absolute_address = seg_address(self.regs.cs, self.regs.pc);

        // The PC is deliberately not advanced here so the handler's return
        // lands back on the interrupted instruction.
        let irq = self.int_ctl.borrow().get_output_line();
        if irq && self.regs.int_ctl_low.get_bit(0) {
            return self.do_instruction(Opcode::Jsrint as u16, absolute_address);
        }

        // A breakpoint must not fire again when execution resumes from it,
        // so the last reported address is remembered.
        if self.breakpoints.contains(&absolute_address)
            && self.previous_breakpoint != Some(absolute_address)
        {
            info!(target: "cpu", "Break point encountered at 0x{:05X}", absolute_address);
            self.previous_breakpoint = Some(absolute_address);
            return Status::Breakpoint;
        }

        let opcode = self.mem.borrow().read_code(absolute_address);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.do_instruction(opcode, absolute_address)
    }

    fn do_instruction(&mut self, opcode_word: u16, absolute_address: u32) -> Status {
        let opcode = match Opcode::decode(opcode_word) {
            Some(opcode) => opcode,
            None => {
                warn!(
                    target: "cpu",
                    "Unknown opcode [{:04X}] address [{:08X}]",
                    opcode_word, absolute_address
                );
                return Status::Unknown;
            }
        };

        // Interrupt entry is injected by the tick gate rather than fetched,
        // so it leaves no record of its own.
        if opcode != Opcode::Jsrint {
            let snapshot = self.capture_snapshot(opcode_word, absolute_address);
            self.history.log(snapshot);
        }

        match opcode {
            Opcode::Nop => {}
            Opcode::DoLit => {
                let literal = self.consume_inline();
                self.push(literal);
            }
            Opcode::Halt => return Status::Halt,
            Opcode::Bra => {
                let destination = self.consume_inline();
                self.regs.pc = destination;
            }
            Opcode::Less | Opcode::SLess => {
                let b = self.pop() as i16;
                let a = self.pop() as i16;
                self.push(if a < b { TRUE } else { FALSE });
            }
            Opcode::PlusPlus => {
                let address = self.pop();
                self.push(address);
                let data_address = seg_address(self.regs.ds, address);
                let value = self.mem.borrow().read(data_address).wrapping_add(1);
                self.mem.borrow_mut().write(data_address, value);
            }
            Opcode::Drop => {
                self.pop();
            }
            Opcode::Store => {
                let address = seg_address(self.regs.ds, self.pop());
                let value = self.pop();
                self.mem.borrow_mut().write(address, value);
            }
            Opcode::Fetch => {
                let address = seg_address(self.regs.ds, self.pop());
                let value = self.mem.borrow().read(address);
                self.push(value);
            }
            Opcode::Jsr => {
                let destination = self.consume_inline();
                let return_address = self.regs.pc;
                self.r_push(return_address);
                self.regs.pc = destination;
            }
            Opcode::Ret => {
                self.regs.pc = self.r_pop();
            }
            Opcode::Jmpf => {
                let flag = self.pop();
                let destination = self.consume_inline();
                if flag == FALSE {
                    self.regs.pc = destination;
                }
            }
            Opcode::ToR => {
                let value = self.pop();
                self.r_push(value);
            }
            Opcode::FromR => {
                let value = self.r_pop();
                self.push(value);
            }
            Opcode::Sll => {
                self.regs.ptos <<= 1;
            }
            Opcode::RpFetch => {
                let value = self.regs.rsp;
                self.push(value);
            }
            Opcode::RpStore => {
                self.regs.rsp = self.pop();
            }
            Opcode::RFetch => {
                let value = self.regs.rtos;
                self.push(value);
            }
            Opcode::Dup => {
                let value = self.pop();
                self.push(value);
                self.push(value);
            }
            Opcode::SpFetch => {
                let value = self.regs.psp;
                self.push(value);
            }
            Opcode::Swap => {
                let b = self.pop();
                let a = self.pop();
                self.push(b);
                self.push(a);
            }
            Opcode::Over => {
                let n = self.pop();
                let x = self.pop();
                self.push(x);
                self.push(n);
                self.push(x);
            }
            Opcode::SpStore => {
                self.regs.psp = self.regs.ptos;
            }
            Opcode::Plus => {
                let b = self.pop();
                let a = self.pop();
                self.push(a.wrapping_add(b));
            }
            Opcode::Sub => {
                let b = self.pop();
                let a = self.pop();
                self.push(a.wrapping_sub(b));
            }
            Opcode::Neg => {
                let a = self.pop() as i16;
                self.push(if a < 0 { TRUE } else { FALSE });
            }
            Opcode::And => {
                let b = self.pop();
                let a = self.pop();
                self.push(a & b);
            }
            Opcode::Or => {
                let b = self.pop();
                let a = self.pop();
                self.push(a | b);
            }
            Opcode::Xor => {
                let b = self.pop();
                let a = self.pop();
                self.push(a ^ b);
            }
            Opcode::Mul => {
                let b = self.pop();
                let a = self.pop();
                self.push(a.wrapping_mul(b));
            }
            Opcode::Equal => {
                let b = self.pop();
                let a = self.pop();
                self.push(if a == b { TRUE } else { FALSE });
            }
            Opcode::UmPlus => {
                let a = u32::from(self.pop());
                let b = u32::from(self.pop());
                let sum = a + b;
                self.push((sum & 0xffff) as u16);
                self.push(((sum & 0x1_0000) >> 16) as u16);
            }
            Opcode::Jsrint => {
                self.enter_interrupt(INTERRUPT_VECTOR);
            }
            Opcode::Syscall => {
                self.enter_interrupt(SYSCALL_VECTOR);
            }
            Opcode::Reti => {
                // Pop order mirrors the push order of enter_interrupt; the
                // saved RSP/RTOS are restored last so the intermediate pops
                // still run against the handler's stack.
                let rtos = self.r_pop();
                let rsp = self.r_pop();
                self.regs.int_ctl_low = self.r_pop() as u8;
                self.regs.pc = self.r_pop();
                self.regs.ptos = self.r_pop();
                self.regs.psp = self.r_pop();
                self.regs.es = self.r_pop();
                self.regs.cs = self.r_pop();
                self.regs.ds = self.r_pop();
                self.regs.rsp = rsp;
                self.regs.rtos = rtos;
            }
            Opcode::Ei => {
                self.regs.int_ctl_low.set_bit(0, true);
            }
            Opcode::Di => {
                self.regs.int_ctl_low.set_bit(0, false);
            }
            Opcode::Sra => {
                let sign_bit = self.regs.ptos & 0x8000;
                self.regs.ptos = sign_bit | (self.regs.ptos >> 1);
            }
            Opcode::Srl => {
                self.regs.ptos >>= 1;
            }
            Opcode::ToEs => {
                self.regs.es = self.pop();
            }
            Opcode::ToDs => {
                self.regs.ds = self.pop();
            }
            Opcode::EsFetch => {
                let value = self.regs.es;
                self.push(value);
            }
            Opcode::DsFetch => {
                let value = self.regs.ds;
                self.push(value);
            }
            Opcode::CsFetch => {
                let value = self.regs.cs;
                self.push(value);
            }
            Opcode::LongFetch => {
                let address = seg_address(self.regs.es, self.pop());
                let value = self.mem.borrow().read(address);
                self.push(value);
            }
            Opcode::LongStore => {
                let address = seg_address(self.regs.es, self.pop());
                let value = self.pop();
                self.mem.borrow_mut().write(address, value);
            }
            Opcode::KSpStore => {
                self.regs.ds = 0x0000;
                self.regs.psp = self.regs.ptos;
            }
            Opcode::Pushf => {
                let flags = u16::from(self.regs.int_ctl_low);
                self.push(flags);
            }
            Opcode::Popf => {
                self.regs.int_ctl_low = self.pop() as u8;
            }
            Opcode::LVar => {
                let offset = self.consume_inline();
                let value = offset.wrapping_add(self.regs.rtos);
                self.push(value);
            }
            Opcode::Store2 => {
                let value = self.pop();
                let address = seg_address(self.regs.ds, self.pop());
                self.mem.borrow_mut().write(address, value);
            }
        }
        Status::Normal
    }

    /// Saves the machine context on the return stack and vectors into the
    /// kernel. The RSP/RTOS captured before any push are what land on top,
    /// matching the pop order of RETI.
    fn enter_interrupt(&mut self, vector: u16) {
        let saved_rsp = self.regs.rsp;
        let saved_rtos = self.regs.rtos;
        let saves = [
            self.regs.ds,
            self.regs.cs,
            self.regs.es,
            self.regs.psp,
            self.regs.ptos,
            self.regs.pc,
            u16::from(self.regs.int_ctl_low),
            saved_rsp,
            saved_rtos,
        ];
        for value in &saves {
            self.r_push(*value);
        }
        self.regs.int_ctl_low.set_bit(0, false);
        self.regs.pc = vector;
        self.regs.cs = 0x0000;
    }

    // -- Stack Ops

    /// Spills the cached top of the parameter stack to memory and installs
    /// the new value in its place.
    fn push(&mut self, value: u16) {
        let address = seg_address(self.regs.ds, self.regs.psp);
        self.mem.borrow_mut().write(address, self.regs.ptos);
        self.regs.psp = self.regs.psp.wrapping_add(1);
        self.regs.ptos = value;
    }

    fn pop(&mut self) -> u16 {
        let value = self.regs.ptos;
        self.regs.psp = self.regs.psp.wrapping_sub(1);
        let address = seg_address(self.regs.ds, self.regs.psp);
        self.regs.ptos = self.mem.borrow().read(address);
        value
    }

    fn r_push(&mut self, value: u16) {
        let address = seg_address(self.regs.ds, self.regs.rsp);
        self.mem.borrow_mut().write(address, self.regs.rtos);
        self.regs.rsp = self.regs.rsp.wrapping_add(1);
        self.regs.rtos = value;
    }

    fn r_pop(&mut self) -> u16 {
        let value = self.regs.rtos;
        self.regs.rsp = self.regs.rsp.wrapping_sub(1);
        let address = seg_address(self.regs.ds, self.regs.rsp);
        self.regs.rtos = self.mem.borrow().read(address);
        value
    }

    /// Returns the literal following the opcode and advances the PC past it.
    fn consume_inline(&mut self) -> u16 {
        let address = seg_address(self.regs.cs, self.regs.pc);
        let literal = self.mem.borrow().read_code(address);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        literal
    }

    fn stack_peek(&self, sp: u16, depth: u16) -> u16 {
        let address = seg_address(self.regs.ds, sp.wrapping_sub(depth));
        self.mem.borrow().read(address)
    }

    fn capture_snapshot(&self, opcode_word: u16, absolute_address: u32) -> Snapshot {
        let mut pstack = [0u16; 4];
        let mut rstack = [0u16; 4];
        pstack[0] = self.regs.ptos;
        rstack[0] = self.regs.rtos;
        for depth in 1..4u16 {
            pstack[depth as usize] = self.stack_peek(self.regs.psp, depth);
            rstack[depth as usize] = self.stack_peek(self.regs.rsp, depth);
        }
        let inline_address = seg_address(self.regs.cs, self.regs.pc);
        Snapshot {
            absolute_address,
            opcode: opcode_word,
            regs: self.regs,
            pstack,
            rstack,
            left_operand: self.stack_peek(self.regs.psp, 1),
            right_operand: self.regs.ptos,
            inline_operand: self.mem.borrow().read_code(inline_address),
        }
    }
}

fn seg_address(segment: u16, offset: u16) -> u32 {
    ((u32::from(segment) << 4) + u32::from(offset)) & ADDRESS_MASK
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU State :")?;
        writeln!(f, "PC    : {:04X}", self.regs.pc)?;
        writeln!(
            f,
            "PTOS  : {:04X}  RTOS : {:04X}",
            self.regs.ptos, self.regs.rtos
        )?;
        writeln!(
            f,
            "PSP   : {:04X}  RSP  : {:04X}",
            self.regs.psp, self.regs.rsp
        )?;
        writeln!(
            f,
            "CS    : {:04X}  DS   : {:04X}   ES :  {:04X}",
            self.regs.cs, self.regs.ds, self.regs.es
        )?;
        write!(f, "IntCtl : {:02X}", self.regs.int_ctl_low)
    }
}
