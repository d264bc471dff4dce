// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

extern crate albert16;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use albert16::core::Chip;
use albert16::io::{SerialPort, NUM_RX_TICKS_PER_BYTE, NUM_TX_TICKS_PER_BYTE};

/// Builds a serial port wrapped around one end of a local TCP connection
/// and hands back the peer end.
fn setup_port(name: &str) -> (SerialPort, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let peer = TcpStream::connect(address).unwrap();
    let (connection, _) = listener.accept().unwrap();
    let port = SerialPort::attach(name, connection).unwrap();
    (port, peer)
}

#[test]
fn transmit_takes_one_byte_time() {
    let (mut port, mut peer) = setup_port("tx-test");
    peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    port.write(0, 0x0041);
    // first tick arms the shift register, the countdown drains after it
    for _ in 0..=NUM_TX_TICKS_PER_BYTE {
        port.tick();
    }
    let mut buffer = [0u8; 1];
    peer.read_exact(&mut buffer).unwrap();
    assert_eq!(0x41, buffer[0]);
}

#[test]
fn transmit_is_paced() {
    let (mut port, mut peer) = setup_port("tx-pace-test");
    peer.set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    port.write(0, 0x0055);
    // half a byte time: nothing on the wire yet
    for _ in 0..NUM_TX_TICKS_PER_BYTE / 2 {
        port.tick();
    }
    let mut buffer = [0u8; 1];
    assert!(peer.read_exact(&mut buffer).is_err());
}

#[test]
fn receive_delivers_after_byte_time() {
    let (mut port, mut peer) = setup_port("rx-test");
    peer.write_all(&[0x42]).unwrap();
    // give the ingress worker time to move the byte into the queue
    thread::sleep(Duration::from_millis(200));
    // reception is armed at attach time, so one tick consumes the byte
    port.tick();
    assert_eq!(0, port.read(6)); // RX not empty
    assert_eq!(0x0002, port.read(1) & 0x0002); // composite status agrees
    assert_eq!(0x0042, port.read(0));
    assert_eq!(1, port.read(6)); // drained
}

#[test]
fn receive_is_paced_between_bytes() {
    let (mut port, mut peer) = setup_port("rx-pace-test");
    peer.write_all(&[0x01, 0x02]).unwrap();
    thread::sleep(Duration::from_millis(200));
    port.tick();
    assert_eq!(1, port.read(0x0e)); // one byte so far
    // the second byte waits out a full byte time
    for _ in 0..NUM_RX_TICKS_PER_BYTE - 1 {
        port.tick();
    }
    assert_eq!(1, port.read(0x0e));
    port.tick();
    assert_eq!(2, port.read(0x0e));
}

#[test]
fn data_read_from_empty_rx_returns_zero() {
    let (mut port, _peer) = setup_port("rx-empty-test");
    assert_eq!(0x0000, port.read(0));
}

#[test]
fn status_registers_track_tx_fifo() {
    let (mut port, _peer) = setup_port("status-test");
    assert_eq!(1, port.read(2)); // TX empty
    assert_eq!(1, port.read(3)); // TX half empty
    assert_eq!(0, port.read(4)); // TX not full
    port.write(0, 0x0077);
    assert_eq!(0, port.read(2));
    assert_eq!(1, port.read(0x0f)); // TX count
    assert_eq!(0x0001, port.read(1) & 0x0001); // composite: TX not full
}

#[test]
fn reset_clears_fifos() {
    let (mut port, mut peer) = setup_port("reset-test");
    port.write(0, 0x0011);
    peer.write_all(&[0x22]).unwrap();
    thread::sleep(Duration::from_millis(200));
    port.tick();
    port.reset();
    assert_eq!(0, port.read(0x0e));
    assert_eq!(0, port.read(0x0f));
    assert_eq!(1, port.read(2));
}
