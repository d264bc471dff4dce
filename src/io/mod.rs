// This file is part of albert16.
// Copyright (c) 2016-2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

pub mod counter;
pub mod int_ctl;
pub mod serial;

pub use self::counter::Counter;
pub use self::int_ctl::{InterruptController, IrqSource};
pub use self::serial::{SerialPort, NUM_RX_TICKS_PER_BYTE, NUM_TX_TICKS_PER_BYTE};
