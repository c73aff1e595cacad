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

use mindyd::config::SysfsLayout;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A throwaway directory shaped like `/`, removed again on drop.
pub struct SysfsTree {
    root: PathBuf,
}

impl SysfsTree {
    pub fn new(name: &str) -> SysfsTree {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "mindyd-it-{name}-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&root)
            .unwrap_or_else(|e| panic!("SysfsTree: failed to create {root:?}: {e}"));
        SysfsTree { root }
    }

    pub fn layout(&self) -> SysfsLayout {
        SysfsLayout::rooted_at(&self.root)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Create `relative` with `contents`, along with any missing parent directories.
    pub fn file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents)
            .unwrap_or_else(|e| panic!("SysfsTree: failed to write {path:?}: {e}"));
        path
    }

    /// Create a symbolic link at `relative` pointing at `target`, which is stored as given.
    pub fn link(&self, relative: &str, target: &str) {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        symlink(target, &path)
            .unwrap_or_else(|e| panic!("SysfsTree: failed to link {path:?} to {target}: {e}"));
    }

    /// A PCI function under `sys/bus/pci/devices/` with `vendor` and `device` attributes.
    pub fn pci_function(&self, bdf: &str, vendor: &str, device: &str) {
        self.file(&format!("sys/bus/pci/devices/{bdf}/vendor"), vendor.as_bytes());
        self.file(&format!("sys/bus/pci/devices/{bdf}/device"), device.as_bytes());
    }

    /// Read `len` bytes at `offset` of the file at `relative`.
    pub fn bytes(&self, relative: &str, offset: usize, len: usize) -> Vec<u8> {
        let contents = std::fs::read(self.path(relative)).unwrap();
        contents[offset..offset + len].to_vec()
    }
}

impl Drop for SysfsTree {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(Path::new(&self.root));
    }
}
