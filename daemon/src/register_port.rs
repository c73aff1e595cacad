// This file is part of mindyd, an application to bring up and service the Mindy RTL design over PCIe.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// mindyd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// mindyd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Width-correct access to memory-mapped AXI registers.
//!
//! A [`RegisterPort`] is a window onto one RTL module's registers inside a PCI BAR. The
//! BAR itself is anything implementing [`RegisterBus`]: in production that is a
//! [`MappedBar`](crate::pci::MappedBar) backed by an `mmap` of the sysfs `resourceN` file.
//!
//! # 64-bit registers
//!
//! The RTL exposes 64-bit values as two adjacent 32-bit AXI words with the HIGH word at the
//! lower address. The hardware latches the value once both halves are written, so the
//! order of accesses is part of the contract: high word first, then low word, for both
//! reads and writes. Nothing here locks the pair; the owner of a port is its only user.
//!
//! # Invalidation
//!
//! A hot-reset invalidates every mapping of the device. Ports hold a [`Lease`] shared with
//! the [`DeviceHandle`](crate::bring_up::DeviceHandle) they were cut from, and every
//! access checks it first, returning [`MindyError::StaleMapping`] once the handle has
//! been invalidated.

use crate::error::MindyError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw 32-bit access to a region of device memory.
///
/// Offsets are byte offsets from the start of the region. Implementations must not
/// reorder or merge accesses.
pub trait RegisterBus: Send + Sync {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

/// Validity token shared by a [`DeviceHandle`](crate::bring_up::DeviceHandle) and every
/// port derived from it.
#[derive(Debug, Clone)]
pub struct Lease {
    device: Arc<str>,
    valid: Arc<AtomicBool>,
}

impl Lease {
    pub fn new(device: &str) -> Lease {
        Lease {
            device: Arc::from(device),
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Revoke the lease for every holder. There is no way back; a new bring-up hands out
    /// a new lease.
    pub fn revoke(&self) {
        self.valid.store(false, Ordering::Release);
    }

    fn check(&self) -> Result<(), MindyError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(MindyError::StaleMapping {
                device: self.device.to_string(),
            })
        }
    }
}

/// The registers of a single RTL module.
///
/// Deliberately not `Clone`: each port has exactly one owning module abstraction.
pub struct RegisterPort {
    bus: Arc<dyn RegisterBus>,
    base: usize,
    origin: u64,
    lease: Lease,
}

impl fmt::Debug for RegisterPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterPort")
            .field("base", &format_args!("0x{:X}", self.base))
            .field("origin", &format_args!("0x{:X}", self.origin))
            .field("device", &self.lease.device())
            .finish()
    }
}

impl RegisterPort {
    /// Create a port whose register 0 sits at byte `base` of `bus`.
    ///
    /// # Arguments
    ///
    /// * `bus` - The mapped BAR
    /// * `base` - Offset of the module inside the BAR
    /// * `origin` - Bus (physical) address corresponding to `base`
    /// * `lease` - Validity token of the owning device handle
    pub fn new(bus: Arc<dyn RegisterBus>, base: usize, origin: u64, lease: Lease) -> RegisterPort {
        RegisterPort {
            bus,
            base,
            origin,
            lease,
        }
    }

    /// Offset of register 0 of this port inside the BAR.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Bus address of register 0 of this port, as seen by other PCIe devices.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn device(&self) -> &str {
        self.lease.device()
    }

    pub fn read32(&self, offset: u32) -> Result<u32, MindyError> {
        self.lease.check()?;
        Ok(self.bus.read32(self.base + offset as usize))
    }

    pub fn write32(&self, offset: u32, value: u32) -> Result<(), MindyError> {
        self.lease.check()?;
        self.bus.write32(self.base + offset as usize, value);
        Ok(())
    }

    /// Read the 64-bit register whose HIGH word is at `offset` and LOW word at `offset + 4`.
    pub fn read64(&self, offset: u32) -> Result<u64, MindyError> {
        let high = self.read32(offset)?;
        let low = self.read32(offset + 4)?;
        Ok((u64::from(high) << 32) | u64::from(low))
    }

    /// Write the 64-bit register whose HIGH word is at `offset` and LOW word at `offset + 4`,
    /// high word first.
    pub fn write64(&self, offset: u32, value: u64) -> Result<(), MindyError> {
        self.write32(offset, (value >> 32) as u32)?;
        self.write32(offset + 4, (value & 0xFFFF_FFFF) as u32)
    }
}

#[cfg(test)]
mod test_register_port {
    use super::{Lease, RegisterPort};
    use crate::testing::{FakeBar, port_at};
    use googletest::prelude::*;
    use rstest::*;
    use std::sync::Arc;

    const BASE: usize = 0x2000;

    fn port_on(bar: &Arc<FakeBar>) -> RegisterPort {
        port_at(bar, BASE)
    }

    #[gtest]
    #[rstest]
    #[case::zero(0)]
    #[case::max(u64::MAX)]
    #[case::distinct_halves(0x1234_5678_9ABC_DEF0)]
    #[case::only_high(0xFFFF_FFFF_0000_0000)]
    #[case::only_low(0x0000_0000_FFFF_FFFF)]
    #[case::address(0x1_A000_0000)]
    fn write64_then_read64_returns_value(#[case] value: u64) {
        let bar = Arc::new(FakeBar::new());
        let port = port_on(&bar);
        port.write64(0x04, value).unwrap();
        assert_that!(port.read64(0x04), ok(eq(&value)));
    }

    #[gtest]
    fn write64_goes_high_word_first() {
        let bar = Arc::new(FakeBar::new());
        let port = port_on(&bar);
        port.write64(0x08, 0xAAAA_BBBB_CCCC_DDDD).unwrap();
        expect_that!(
            bar.writes(),
            elements_are![
                eq(&(BASE + 0x08, 0xAAAA_BBBBu32)),
                eq(&(BASE + 0x0C, 0xCCCC_DDDDu32))
            ]
        );
    }

    #[gtest]
    fn read64_goes_high_word_first() {
        let bar = Arc::new(FakeBar::new());
        let port = port_on(&bar);
        port.read64(0x10).unwrap();
        expect_that!(bar.reads(), elements_are![eq(&(BASE + 0x10)), eq(&(BASE + 0x14))]);
    }

    #[gtest]
    fn two_write32_reassemble_as_high_low() {
        let bar = Arc::new(FakeBar::new());
        let port = port_on(&bar);
        port.write32(0x20, 0xDEAD_BEEF).unwrap();
        port.write32(0x24, 0x0BAD_F00D).unwrap();
        assert_that!(port.read64(0x20), ok(eq(&0xDEAD_BEEF_0BAD_F00Du64)));
    }

    #[gtest]
    fn offsets_are_relative_to_port_base() {
        let bar = Arc::new(FakeBar::new());
        let port = port_on(&bar);
        port.write32(0x04, 7).unwrap();
        expect_that!(bar.peek(BASE + 0x04), eq(7u32));
        expect_that!(port.origin(), eq(0xF000_2000u64));
    }

    #[gtest]
    fn access_after_revoke_is_refused() {
        let bar = Arc::new(FakeBar::new());
        let lease = Lease::new("10ee:903f");
        let port = RegisterPort::new(bar.clone(), 0, 0, lease.clone());
        lease.revoke();

        expect_that!(
            port.read32(0),
            err(displays_as(contains_substring("MindyError::StaleMapping")))
        );
        expect_that!(
            port.write64(0, 1),
            err(displays_as(contains_substring("10ee:903f")))
        );
        expect_that!(bar.writes(), is_empty());
        expect_that!(bar.reads(), is_empty());
    }
}
