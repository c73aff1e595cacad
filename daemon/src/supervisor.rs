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

//! Ownership of the live device and its interrupt engine.
//!
//! The [`Supervisor`] is the only place that holds a [`Device`]. It brings the device up,
//! starts the interrupt [`Engine`] on it and reacts to the engine stopping:
//!
//! * [`EngineExit::TornDown`]: the device was hot-reset or removed. The old mappings are
//!   invalidated and one fresh bring-up is attempted.
//! * An error: the interrupt contract is broken and interrupts may have been lost. The
//!   error is handed back to the caller, which is expected to shut the daemon down.
//!
//! Engine exits arrive as [`EngineEvent`]s on the channel returned by [`Supervisor::new`];
//! whoever owns the receiving end feeds them to [`Supervisor::handle_event`].

use crate::bring_up::{BringUp, BringUpState, Device};
use crate::config::{DaemonConfig, PciId, SysfsLayout};
use crate::error::MindyError;
use crate::interrupts::{Engine, EngineEvent, EngineExit, InterruptSourceTable, UioChannel};
use crate::rtl::irq_manager::INTERRUPT_SOURCES;
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

struct Inner {
    bring_up: BringUp,
    device: Option<Device>,
    /// Incremented for every engine started, so events of old engines can be told apart.
    generation: u64,
    engine_running: bool,
}

pub struct Supervisor {
    config: DaemonConfig,
    layout: SysfsLayout,
    inner: Mutex<Inner>,
    table: Arc<InterruptSourceTable>,
    events: UnboundedSender<EngineEvent>,
}

impl Supervisor {
    /// A supervisor for the real system.
    pub fn new(
        config: DaemonConfig,
        layout: SysfsLayout,
    ) -> (Supervisor, UnboundedReceiver<EngineEvent>) {
        let bring_up = BringUp::sysfs(&layout);
        Supervisor::with_bring_up(config, layout, bring_up)
    }

    /// A supervisor using `bring_up` to find and map the device. Interrupt channels are
    /// still opened at the locations given by `layout`.
    pub fn with_bring_up(
        config: DaemonConfig,
        layout: SysfsLayout,
        bring_up: BringUp,
    ) -> (Supervisor, UnboundedReceiver<EngineEvent>) {
        let (events, receiver) = unbounded_channel();
        let supervisor = Supervisor {
            config,
            layout,
            inner: Mutex::new(Inner {
                bring_up,
                device: None,
                generation: 0,
                engine_running: false,
            }),
            table: Arc::new(InterruptSourceTable::new()),
            events,
        };
        (supervisor, receiver)
    }

    pub fn device_id(&self) -> PciId {
        self.config.pci_device
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, MindyError> {
        self.inner.lock().map_err(|_| {
            MindyError::Internal(format!(
                "State of {} was poisoned by a panic",
                self.config.pci_device
            ))
        })
    }

    pub fn state(&self) -> Result<BringUpState, MindyError> {
        Ok(self.lock()?.bring_up.state())
    }

    /// Bring the configured device up and start its interrupt engine.
    ///
    /// Blocks for as long as bring-up takes, which includes the settle time of a
    /// hot-reset when one is needed.
    ///
    /// # Returns: `Result<(), MindyError>`
    /// * `Ok(())` - The device is `Ready` and its engine is running
    /// * `Err(MindyError::Argument)` - The device is already up
    /// * `Err(..)` - Bring-up or opening the interrupt channel failed
    pub fn bring_up(&self) -> Result<(), MindyError> {
        let device_id = self.config.pci_device;
        let mut inner = self.lock()?;
        if inner.engine_running {
            return Err(MindyError::Argument(format!(
                "{device_id} is already up, its interrupt engine is running"
            )));
        }
        if let Some(old) = inner.device.take() {
            old.invalidate();
        }

        let mut device = inner.bring_up.run(&device_id, &self.config.module_map)?;
        let irq = device.take_irq_manager().ok_or_else(|| {
            MindyError::Internal(format!("IRQ manager of {device_id} was already taken"))
        })?;
        let uio_index = device.handle().uio_index();
        let channel = match UioChannel::open(&self.layout, &device_id, uio_index) {
            Ok(channel) => channel,
            Err(e) => {
                device.invalidate();
                return Err(e);
            }
        };

        let mut engine = Engine::new(device_id, irq, channel, self.table.clone());
        for source in 0..INTERRUPT_SOURCES {
            engine.set_handler(source, move |source: usize, count: u64| {
                trace!("{device_id}: interrupt source {source} fired ({count} so far)")
            })?;
        }
        inner.generation += 1;
        if let Err(e) = engine.spawn(inner.generation, self.events.clone()) {
            device.invalidate();
            return Err(e);
        }
        inner.engine_running = true;
        info!(
            "{device_id} is up at {} (uio{uio_index}, engine generation {})",
            device.handle().bdf(),
            inner.generation
        );
        inner.device = Some(device);
        Ok(())
    }

    /// React to an interrupt engine stopping.
    ///
    /// # Returns: `Result<(), MindyError>`
    /// * `Ok(())` - Handled; after a teardown the device may or may not be back up
    /// * `Err(MindyError)` - The engine failed; the daemon must not continue
    pub fn handle_event(&self, event: EngineEvent) -> Result<(), MindyError> {
        {
            let mut inner = self.lock()?;
            if event.generation != inner.generation {
                debug!(
                    "Ignoring exit of engine generation {} of {}, current is {}",
                    event.generation, event.device, inner.generation
                );
                return Ok(());
            }
            inner.engine_running = false;
            if let Some(device) = inner.device.take() {
                device.invalidate();
            }
        }

        match event.outcome {
            Ok(EngineExit::TornDown) => {
                warn!("{} was torn down, bringing it up again", event.device);
                if let Err(e) = self.bring_up() {
                    error!("Bring-up of {} after a teardown failed: {e}", event.device);
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run `f` on the device if it is `Ready`.
    pub fn with_device<T>(
        &self,
        f: impl FnOnce(&Device) -> Result<T, MindyError>,
    ) -> Result<T, MindyError> {
        let inner = self.lock()?;
        match inner.device.as_ref() {
            Some(device) => f(device),
            None => Err(MindyError::NotReady {
                device: self.config.pci_device.to_string(),
                state: inner.bring_up.state().to_string(),
            }),
        }
    }

    pub fn interrupt_counts(&self) -> Vec<u64> {
        self.table.snapshot()
    }

    pub fn interrupt_count(&self, source: usize) -> Result<u64, MindyError> {
        self.table.count(source).ok_or_else(|| {
            MindyError::Argument(format!(
                "Interrupt source {source} does not exist, there are {INTERRUPT_SOURCES}"
            ))
        })
    }
}
