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

//! Interrupt distribution.
//!
//! The design raises one legacy PCI interrupt for all of its sources. `uio_pci_generic`
//! masks it in the PCI command register every time it fires and lets userspace know by
//! completing a 4-byte read of `/dev/uioN`. The [`Engine`] turns that into per-source
//! events:
//!
//! ```text
//!  Arming ──▶ Waiting ──▶ Dispatching ──▶ Waiting ...
//!                │
//!                └──▶ TornDown (hot-reset / device removed)
//! ```
//!
//! 1. **Arming**: zero the [`InterruptSourceTable`] and compute the command register byte
//!    with INTx enabled.
//! 2. **Waiting**: write that byte (unmasking the interrupt), then block reading the
//!    notification channel.
//! 3. **Dispatching**: read the IRQ manager's active bitmap, acknowledge exactly those
//!    bits, then count and hand off each set bit, lowest first.
//!
//! The engine runs on its own thread and reports how it ended as an [`EngineEvent`].

use crate::config::{PciId, SysfsLayout};
use crate::error::MindyError;
use crate::rtl::irq_manager::{INTERRUPT_SOURCES, IrqManager};
use log::{debug, error, info, trace, warn};
use std::any::Any;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::os::unix::fs::FileExt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tokio::sync::mpsc::UnboundedSender;

/// Offset of the upper byte of the PCI command register in configuration space.
const COMMAND_HIGH_BYTE: u64 = 5;

/// Interrupt Disable, bit 10 of the command register.
const INTX_DISABLE: u8 = 0x04;

/// How many times each interrupt source has fired since the engine was armed.
#[derive(Debug)]
pub struct InterruptSourceTable {
    counters: [AtomicU64; INTERRUPT_SOURCES],
}

impl Default for InterruptSourceTable {
    fn default() -> Self {
        InterruptSourceTable {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl InterruptSourceTable {
    pub fn new() -> InterruptSourceTable {
        InterruptSourceTable::default()
    }

    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Count one more event on `source` and return the new total.
    fn increment(&self, source: usize) -> u64 {
        self.counters[source].fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self, source: usize) -> Option<u64> {
        self.counters.get(source).map(|c| c.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> Vec<u64> {
        self.counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.snapshot().iter().sum()
    }
}

/// Something reacting to one interrupt source.
///
/// Called on the engine thread, once per wake on which the source was pending, with the
/// source number and its updated count.
pub trait InterruptHandler: Send {
    fn handle(&mut self, source: usize, count: u64);
}

impl<F> InterruptHandler for F
where
    F: FnMut(usize, u64) + Send,
{
    fn handle(&mut self, source: usize, count: u64) {
        self(source, count)
    }
}

/// The kernel side of interrupt delivery for one device.
pub trait NotificationChannel: Send {
    /// Read the upper byte of the PCI command register.
    fn read_control(&mut self) -> io::Result<u8>;

    /// Write the upper byte of the PCI command register.
    fn write_control(&mut self, value: u8) -> io::Result<()>;

    /// Block until the next notification, returning how many bytes were read.
    fn wait(&mut self, buf: &mut [u8; 4]) -> io::Result<usize>;
}

/// [`NotificationChannel`] over `/dev/uioN` and the device's sysfs `config` file.
#[derive(Debug)]
pub struct UioChannel {
    node: File,
    config: File,
}

impl UioChannel {
    /// Open the UIO device node and configuration space of UIO device `uio_index`.
    ///
    /// # Returns: `Result<UioChannel, MindyError>`
    /// * `Ok(UioChannel)` - Both files are open
    /// * `Err(MindyError::InterruptChannelFault)` - Either can't be opened
    pub fn open(
        layout: &SysfsLayout,
        device: &PciId,
        uio_index: u32,
    ) -> Result<UioChannel, MindyError> {
        let open = |path: &Path, write: bool| -> Result<File, MindyError> {
            trace!("Opening {path:?}");
            OpenOptions::new()
                .read(true)
                .write(write)
                .open(path)
                .map_err(|e| MindyError::InterruptChannelFault {
                    device: device.to_string(),
                    reason: format!("cannot open {path:?}: {e}"),
                })
        };
        let node_path: PathBuf = layout.uio_device_node(uio_index);
        let config_path: PathBuf = layout.uio_config_space(uio_index);
        Ok(UioChannel {
            node: open(&node_path, false)?,
            config: open(&config_path, true)?,
        })
    }
}

impl NotificationChannel for UioChannel {
    fn read_control(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.config.read_exact_at(&mut byte, COMMAND_HIGH_BYTE)?;
        Ok(byte[0])
    }

    fn write_control(&mut self, value: u8) -> io::Result<()> {
        self.config.write_all_at(&[value], COMMAND_HIGH_BYTE)
    }

    fn wait(&mut self, buf: &mut [u8; 4]) -> io::Result<usize> {
        self.node.read(buf)
    }
}

/// How an engine that didn't fail came to a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// The notification channel went away, normally because of a hot-reset. The device
    /// has to be brought up again.
    TornDown,
}

/// Sent by an engine thread when it stops.
#[derive(Debug)]
pub struct EngineEvent {
    pub device: PciId,
    /// Identifies the bring-up the engine belonged to.
    pub generation: u64,
    pub outcome: Result<EngineExit, MindyError>,
}

enum Wake {
    Notified(u32),
    TornDown,
}

/// Errors after which the channel will never deliver again.
fn is_teardown(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::EIO) | Some(libc::ENODEV))
        || matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
        )
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// The interrupt loop of one device.
pub struct Engine<C: NotificationChannel> {
    device: PciId,
    irq: IrqManager,
    channel: C,
    table: Arc<InterruptSourceTable>,
    handlers: Vec<Option<Box<dyn InterruptHandler>>>,
}

impl<C: NotificationChannel + 'static> Engine<C> {
    /// Create an engine owning `irq` for as long as it runs.
    pub fn new(
        device: PciId,
        irq: IrqManager,
        channel: C,
        table: Arc<InterruptSourceTable>,
    ) -> Engine<C> {
        Engine {
            device,
            irq,
            channel,
            table,
            handlers: (0..INTERRUPT_SOURCES).map(|_| None).collect(),
        }
    }

    /// Install the handler for `source`, replacing any previous one.
    pub fn set_handler(
        &mut self,
        source: usize,
        handler: impl InterruptHandler + 'static,
    ) -> Result<(), MindyError> {
        let slot = self.handlers.get_mut(source).ok_or_else(|| {
            MindyError::Argument(format!(
                "Interrupt source {source} does not exist, there are {INTERRUPT_SOURCES}"
            ))
        })?;
        *slot = Some(Box::new(handler));
        Ok(())
    }

    fn fault(&self, reason: String) -> MindyError {
        MindyError::InterruptChannelFault {
            device: self.device.to_string(),
            reason,
        }
    }

    /// Run until the channel is torn down or fails.
    ///
    /// # Returns: `Result<EngineExit, MindyError>`
    /// * `Ok(EngineExit::TornDown)` - The device went away; bring it up again
    /// * `Err(MindyError::InterruptChannelFault)` - The channel broke its contract
    /// * `Err(..)` - An IRQ manager register access failed
    pub fn run(&mut self) -> Result<EngineExit, MindyError> {
        self.table.reset();
        let control = self
            .channel
            .read_control()
            .map_err(|e| self.fault(format!("cannot read the PCI command register: {e}")))?;
        let armed = control & !INTX_DISABLE;
        info!(
            "Interrupt engine of {} armed (command byte 0x{control:02X} -> 0x{armed:02X})",
            self.device
        );

        loop {
            self.channel
                .write_control(armed)
                .map_err(|e| self.fault(format!("cannot re-enable INTx: {e}")))?;
            match self.wait()? {
                Wake::TornDown => {
                    info!("Interrupt channel of {} was torn down", self.device);
                    return Ok(EngineExit::TornDown);
                }
                Wake::Notified(sequence) => {
                    trace!("{}: interrupt notification {sequence}", self.device);
                    if !self.dispatch()? {
                        return Ok(EngineExit::TornDown);
                    }
                }
            }
        }
    }

    fn wait(&mut self) -> Result<Wake, MindyError> {
        let mut buf = [0u8; 4];
        loop {
            match self.channel.wait(&mut buf) {
                Ok(4) => return Ok(Wake::Notified(u32::from_ne_bytes(buf))),
                Ok(0) => return Ok(Wake::TornDown),
                Ok(n) => {
                    return Err(self.fault(format!("short read of {n} bytes from the UIO device")));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_teardown(&e) => {
                    debug!("{}: notification read ended with {e}", self.device);
                    return Ok(Wake::TornDown);
                }
                Err(e) => return Err(self.fault(format!("notification read failed: {e}"))),
            }
        }
    }

    /// Handle one wake. Returns `false` when the registers are gone.
    fn dispatch(&mut self) -> Result<bool, MindyError> {
        let bitmap = match self.irq.active() {
            Ok(bitmap) => bitmap,
            Err(MindyError::StaleMapping { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        if bitmap == 0 {
            debug!("{}: spurious interrupt, nothing pending", self.device);
            return Ok(true);
        }
        match self.irq.clear(bitmap) {
            Ok(()) => {}
            Err(MindyError::StaleMapping { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        trace!("{}: acknowledged 0b{bitmap:b}", self.device);

        for source in (0..INTERRUPT_SOURCES).filter(|&s| bitmap & (1u32 << s) != 0) {
            let count = self.table.increment(source);
            if let Some(handler) = self.handlers[source].as_mut() {
                handler.handle(source, count);
            }
        }
        Ok(true)
    }

    /// Run the engine on a dedicated thread and report its end on `events`.
    ///
    /// A panic inside the loop or a handler is reported as
    /// [`MindyError::InterruptChannelFault`].
    pub fn spawn(
        mut self,
        generation: u64,
        events: UnboundedSender<EngineEvent>,
    ) -> Result<JoinHandle<()>, MindyError> {
        let device = self.device;
        std::thread::Builder::new()
            .name(format!("mindy-irq-{}", device.device))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run()))
                    .unwrap_or_else(|payload| {
                        Err(MindyError::InterruptChannelFault {
                            device: device.to_string(),
                            reason: format!("interrupt loop panicked: {}", panic_reason(&*payload)),
                        })
                    });
                match &outcome {
                    Ok(exit) => info!("Interrupt engine of {device} stopped: {exit:?}"),
                    Err(e) => error!("Interrupt engine of {device} failed: {e}"),
                }
                let event = EngineEvent {
                    device,
                    generation,
                    outcome,
                };
                if events.send(event).is_err() {
                    warn!("Nobody is listening for the interrupt engine of {device}");
                }
            })
            .map_err(|e| {
                MindyError::Internal(format!("Cannot start the interrupt thread of {device}: {e}"))
            })
    }
}
