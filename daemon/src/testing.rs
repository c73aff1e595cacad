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

//! In-memory stand-ins for device memory and the kernel, used by unit tests across the crate.

use crate::config::PciId;
use crate::error::MindyError;
use crate::pci::{BarRegion, PciBackend};
use crate::register_port::{Lease, RegisterBus, RegisterPort};
use crate::uio::UioRegistrar;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeBarState {
    words: HashMap<usize, u32>,
    scripted: HashMap<usize, VecDeque<u32>>,
    reads: Vec<usize>,
    writes: Vec<(usize, u32)>,
}

/// A BAR made of plain memory that records every access.
///
/// Reads at an offset with a [`script`](FakeBar::script) pop the next scripted value;
/// otherwise they return the last value written (or 0).
#[derive(Default)]
pub struct FakeBar {
    state: Mutex<FakeBarState>,
}

impl FakeBar {
    pub fn new() -> FakeBar {
        FakeBar::default()
    }

    pub fn script(&self, offset: usize, values: &[u32]) {
        let mut state = self.state.lock().unwrap();
        state
            .scripted
            .entry(offset)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Set a word without recording a write.
    pub fn poke(&self, offset: usize, value: u32) {
        self.state.lock().unwrap().words.insert(offset, value);
    }

    /// Read a word without recording a read.
    pub fn peek(&self, offset: usize) -> u32 {
        *self.state.lock().unwrap().words.get(&offset).unwrap_or(&0)
    }

    pub fn reads(&self) -> Vec<usize> {
        self.state.lock().unwrap().reads.clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| v)
            .collect()
    }
}

impl RegisterBus for FakeBar {
    fn read32(&self, offset: usize) -> u32 {
        let mut state = self.state.lock().unwrap();
        state.reads.push(offset);
        if let Some(value) = state.scripted.get_mut(&offset).and_then(VecDeque::pop_front) {
            return value;
        }
        *state.words.get(&offset).unwrap_or(&0)
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut state = self.state.lock().unwrap();
        state.writes.push((offset, value));
        state.words.insert(offset, value);
    }
}

/// A port at `base` of `bar` with a fresh lease.
pub fn port_at(bar: &Arc<FakeBar>, base: usize) -> RegisterPort {
    RegisterPort::new(
        bar.clone(),
        base,
        0xF000_0000 + base as u64,
        Lease::new("10ee:903f"),
    )
}

/// Names of the backend operations called so far, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// A device at `0000:01:00.0` whose 64 KiB BAR0 is a [`FakeBar`] at bus address
/// `0xF000_0000`.
pub struct FakePci {
    bar: Arc<FakeBar>,
    with_bar0: bool,
    log: CallLog,
    holders_at_reset: Arc<Mutex<Vec<usize>>>,
}

impl FakePci {
    pub const BAR_SIZE: usize = 0x1_0000;

    pub fn new(bar: &Arc<FakeBar>, log: &CallLog) -> FakePci {
        FakePci {
            bar: bar.clone(),
            with_bar0: true,
            log: log.clone(),
            holders_at_reset: Arc::default(),
        }
    }

    /// How many handles to the BAR were alive at each `hot_reset`, counting the fake's own.
    pub fn holders_at_reset(&self) -> Arc<Mutex<Vec<usize>>> {
        self.holders_at_reset.clone()
    }

    /// Only expose the BAR as BAR2.
    pub fn without_bar0(mut self) -> FakePci {
        self.with_bar0 = false;
        self
    }
}

impl PciBackend for FakePci {
    fn resolve(&self, _device: &PciId) -> Result<String, MindyError> {
        self.log.push("resolve");
        Ok("0000:01:00.0".to_string())
    }

    fn map(&self, _device: &PciId, _bdf: &str) -> Result<Vec<BarRegion>, MindyError> {
        self.log.push("map");
        Ok(vec![BarRegion {
            index: if self.with_bar0 { 0 } else { 2 },
            bar: self.bar.clone(),
            bus_base: 0xF000_0000,
            size: FakePci::BAR_SIZE,
        }])
    }

    fn hot_reset(&self, _device: &PciId, _bdf: &str) -> Result<(), MindyError> {
        self.log.push("hot_reset");
        self.holders_at_reset
            .lock()
            .unwrap()
            .push(Arc::strong_count(&self.bar));
        Ok(())
    }
}

pub struct FakeUio {
    index: u32,
    log: CallLog,
}

impl FakeUio {
    pub fn new(index: u32, log: &CallLog) -> FakeUio {
        FakeUio {
            index,
            log: log.clone(),
        }
    }
}

impl UioRegistrar for FakeUio {
    fn initialize(&self, _device: &PciId) -> Result<u32, MindyError> {
        self.log.push("initialize");
        Ok(self.index)
    }
}

/// A uniquely named directory under the system temp dir, removed on drop.
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(name: &str) -> ScratchDir {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "mindyd-{name}-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&root).unwrap();
        ScratchDir { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create `relative` (and its parents) with `contents`.
    pub fn file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
