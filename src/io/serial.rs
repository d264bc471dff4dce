// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::cmp;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use bit_field::BitField;

use crate::core::{Chip, Fifo};

// Design:
//   A serial port owns one accepted TCP connection. A background worker
//   blocks on the socket one byte at a time and feeds a bounded channel;
//   a full channel blocks the worker, which throttles fast senders. The
//   tick side drains that channel non-blockingly, so everything except the
//   ingress worker stays on the driver thread.

const TX_BUFFER_SIZE: usize = 1024;
const RX_BUFFER_SIZE: usize = 1024;
const INGRESS_QUEUE_DEPTH: usize = 10;

pub const NUM_RX_TICKS_PER_BYTE: u32 = 1200;
pub const NUM_TX_TICKS_PER_BYTE: u32 = 1200;

pub mod reg {
    pub const DATA: u8 = 0x00;
    pub const STATUS: u8 = 0x01;
    pub const TX_EMPTY: u8 = 0x02;
    pub const TX_HALF_EMPTY: u8 = 0x03;
    pub const TX_FULL: u8 = 0x04;
    pub const TX_FULL_2: u8 = 0x05;
    pub const RX_EMPTY: u8 = 0x06;
    pub const RX_HALF_FULL: u8 = 0x07;
    pub const RX_QUARTER_FULL: u8 = 0x08;
    pub const RX_FULL: u8 = 0x09;
    pub const RX_COUNT: u8 = 0x0e;
    pub const TX_COUNT: u8 = 0x0f;
}

pub struct SerialPort {
    // Configuration
    name: String,
    // I/O
    connection: TcpStream,
    ingress: Receiver<u8>,
    // Runtime State
    rx_fifo: Fifo,
    tx_fifo: Fifo,
    ticks_since_rx: u32,
    transmitting: bool,
    tx_countdown: u32,
    tx_register: u8,
}

impl SerialPort {
    /// Listens on the given TCP port, accepts exactly one client and wraps
    /// the accepted connection.
    pub fn bind(name: &str, tcp_port: u16) -> io::Result<SerialPort> {
        info!(target: "serial", "Initializing serial port {} with port :{}", name, tcp_port);
        let listener = TcpListener::bind(("0.0.0.0", tcp_port))?;
        info!(target: "serial", "Listen succeeded; connect now");
        let (connection, peer) = listener.accept()?;
        info!(target: "serial", "Accepted connection from {}", peer);
        Self::attach(name, connection)
    }

    /// Wraps an already accepted connection and spawns the ingress worker.
    pub fn attach(name: &str, connection: TcpStream) -> io::Result<SerialPort> {
        let reader = connection.try_clone()?;
        let (queue_in, queue_out) = mpsc::sync_channel(INGRESS_QUEUE_DEPTH);
        thread::Builder::new()
            .name(format!("{}-rx", name))
            .spawn(move || ingress_loop(reader, queue_in))?;
        Ok(Self {
            name: name.to_string(),
            connection,
            ingress: queue_out,
            rx_fifo: Fifo::new(RX_BUFFER_SIZE),
            tx_fifo: Fifo::new(TX_BUFFER_SIZE),
            // Arm reception so the first delivered byte is consumed without
            // waiting out a full byte time.
            ticks_since_rx: NUM_RX_TICKS_PER_BYTE,
            transmitting: false,
            tx_countdown: 0,
            tx_register: 0,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    // -- Interrupt source predicates

    pub fn rx_is_half_full(&self) -> bool {
        self.rx_fifo.len() >= RX_BUFFER_SIZE / 2
    }

    pub fn rx_is_quarter_full(&self) -> bool {
        self.rx_fifo.len() >= RX_BUFFER_SIZE / 4
    }

    fn transmit(&mut self) {
        let byte = [self.tx_register];
        if let Err(error) = self.connection.write_all(&byte) {
            warn!(target: "serial", "{}: transmit failed, error - {}", self.name, error);
        }
    }
}

impl Chip for SerialPort {
    fn tick(&mut self) {
        // Reception side: one byte per byte time, pulled from the ingress
        // queue without blocking.
        self.ticks_since_rx = cmp::min(self.ticks_since_rx + 1, NUM_RX_TICKS_PER_BYTE);
        if self.ticks_since_rx >= NUM_RX_TICKS_PER_BYTE {
            if let Ok(byte) = self.ingress.try_recv() {
                if self.rx_fifo.is_full() {
                    warn!(target: "serial", "{}: receiver buffer is full, data overrun will occur", self.name);
                }
                self.rx_fifo.push(byte);
                self.ticks_since_rx = 0;
            }
        }

        // Transmission side: finish the byte in flight before starting the
        // next one. The whole byte hits the socket when the countdown ends.
        if self.transmitting {
            self.tx_countdown = self.tx_countdown.saturating_sub(1);
            if self.tx_countdown == 0 {
                self.transmit();
                self.transmitting = false;
            }
            return;
        }

        if self.tx_fifo.is_empty() {
            return;
        }

        self.tx_register = self.tx_fifo.pop();
        self.tx_countdown = NUM_TX_TICKS_PER_BYTE;
        self.transmitting = true;
    }

    /// Empties both fifos and drops any transmission in flight. The socket
    /// itself is untouched.
    fn reset(&mut self) {
        self.rx_fifo.clear();
        self.tx_fifo.clear();
        self.transmitting = false;
    }

    fn read(&mut self, reg: u8) -> u16 {
        match reg & 0x0f {
            reg::DATA => {
                if self.rx_fifo.is_empty() {
                    warn!(target: "serial", "{}: read from empty receive buffer", self.name);
                    return 0;
                }
                u16::from(self.rx_fifo.pop())
            }
            reg::STATUS => {
                let mut value = 0u16;
                value.set_bit(0, !self.tx_fifo.is_full());
                value.set_bit(1, !self.rx_fifo.is_empty());
                value
            }
            reg::TX_EMPTY => self.tx_fifo.is_empty() as u16,
            reg::TX_HALF_EMPTY => (self.tx_fifo.len() < TX_BUFFER_SIZE / 2) as u16,
            reg::TX_FULL | reg::TX_FULL_2 => self.tx_fifo.is_full() as u16,
            reg::RX_EMPTY => self.rx_fifo.is_empty() as u16,
            reg::RX_HALF_FULL => self.rx_is_half_full() as u16,
            reg::RX_QUARTER_FULL => self.rx_is_quarter_full() as u16,
            reg::RX_FULL => self.rx_fifo.is_full() as u16,
            reg::RX_COUNT => self.rx_fifo.len() as u16,
            reg::TX_COUNT => self.tx_fifo.len() as u16,
            _ => panic!(
                "read from unmapped serial port address 0x{:x} in [{}]",
                reg, self.name
            ),
        }
    }

    fn write(&mut self, reg: u8, value: u16) {
        if reg & 0x0f != reg::DATA {
            warn!(target: "serial", "{}: write to read only serial address 0x{:x}", self.name, reg);
            return;
        }
        if self.tx_fifo.is_full() {
            warn!(target: "serial", "{}: write to full transmit buffer, data overrun will occur", self.name);
        }
        self.tx_fifo.push(value as u8);
    }
}

fn ingress_loop(mut stream: TcpStream, queue: SyncSender<u8>) {
    let mut buffer = [0u8; 1];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                if queue.send(buffer[0]).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}
