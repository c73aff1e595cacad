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

use super::{MINDY_BDF, mindy_id};
use crate::common::test_functions::SysfsTree;
use googletest::prelude::*;
use mindyd::bring_up::{BringUp, BringUpState};
use mindyd::rtl::{ModuleMap, RtlModule};

static RESOURCE: &str = "0x00000000f0000000 0x00000000f000ffff 0x0000000000040200\n";

static DEVICE_DIR: &str = "sys/devices/pci0000:00/0000:01:00.0";

/// A complete tree for the Mindy card at [`MINDY_BDF`] on the root bus: PCI attributes, a
/// 64 KiB BAR0 backed by a regular file, the UIO driver's `new_id` and a `uio2` class
/// link.
fn mindy_tree(name: &str, identity: u32) -> SysfsTree {
    let tree = SysfsTree::new(name);
    tree.file(&format!("{DEVICE_DIR}/vendor"), b"0x10ee\n");
    tree.file(&format!("{DEVICE_DIR}/device"), b"0x903f\n");
    tree.file(&format!("{DEVICE_DIR}/resource"), RESOURCE.as_bytes());
    tree.file(&format!("{DEVICE_DIR}/reset"), b"");
    let mut bar0 = vec![0u8; 0x1_0000];
    // BUILD_MAJOR, BUILD_MINOR, BUILD_REV
    bar0[0x0..0x4].copy_from_slice(&identity.to_ne_bytes());
    bar0[0x4..0x8].copy_from_slice(&2u32.to_ne_bytes());
    bar0[0x8..0xC].copy_from_slice(&7u32.to_ne_bytes());
    tree.file(&format!("{DEVICE_DIR}/resource0"), &bar0);
    tree.link(
        &format!("sys/bus/pci/devices/{MINDY_BDF}"),
        "../../../devices/pci0000:00/0000:01:00.0",
    );
    tree.file("sys/bus/pci/drivers/uio_pci_generic/new_id", b"");
    tree.link(
        "sys/class/uio/uio2",
        "../../devices/pci0000:00/0000:01:00.0/uio/uio2",
    );
    tree
}

#[gtest]
fn brings_up_device_from_sysfs() {
    let tree = mindy_tree("bring-up", 1);
    let mut bring_up = BringUp::sysfs(&tree.layout());

    let device = bring_up
        .run(&mindy_id(), &ModuleMap::mindy_default())
        .unwrap();
    expect_that!(bring_up.state(), eq(BringUpState::Ready));
    expect_that!(device.handle().bdf(), eq(MINDY_BDF));
    expect_that!(device.handle().uio_index(), eq(2u32));
    expect_that!(device.handle().bus_base(), eq(0xF000_0000u64));
    expect_that!(device.revision().build_string(), ok(eq("1.2.07")));
    expect_that!(
        device.frame_counters().pci_address(1),
        ok(eq(&0xF000_1008u64))
    );
}

#[gtest]
fn register_writes_reach_the_bar() {
    let tree = mindy_tree("bring-up-write", 1);
    let device = BringUp::sysfs(&tree.layout())
        .run(&mindy_id(), &ModuleMap::mindy_default())
        .unwrap();

    // RdmxShim sits at 0x4000, its frame size register at 0x28
    device.rdmx_shim().set_frame_size(8192).unwrap();
    device
        .write_register64(RtlModule::DataFetch, 0x34, 0x0000_0001_0000_0002)
        .unwrap();

    let resource0 = format!("{DEVICE_DIR}/resource0");
    expect_that!(
        tree.bytes(&resource0, 0x4028, 4),
        eq(&8192u32.to_ne_bytes().to_vec())
    );
    expect_that!(
        tree.bytes(&resource0, 0x2034, 8),
        eq(&[1u32.to_ne_bytes(), 2u32.to_ne_bytes()].concat())
    );
}

#[gtest]
fn unresponsive_device_fails_after_one_hot_reset() {
    let tree = mindy_tree("bring-up-sentinel", 0xFFFF_FFFF);
    let mut bring_up = BringUp::sysfs(&tree.layout());

    expect_that!(
        bring_up.run(&mindy_id(), &ModuleMap::mindy_default()),
        err(displays_as(all!(
            contains_substring("MindyError::DeviceUnresponsive"),
            contains_substring("0xFFFFFFFF")
        )))
    );
    expect_that!(bring_up.state(), eq(BringUpState::Faulted));
    expect_that!(
        std::fs::read_to_string(tree.path(&format!("{DEVICE_DIR}/reset"))),
        ok(eq("1"))
    );
}

#[gtest]
fn module_outside_bar_is_a_configuration_error() {
    let tree = mindy_tree("bring-up-outside", 1);
    let map = ModuleMap::mindy_default().with(RtlModule::StatusManager, 0x1_0000);
    let mut bring_up = BringUp::sysfs(&tree.layout());

    expect_that!(
        bring_up.run(&mindy_id(), &map),
        err(displays_as(all!(
            contains_substring("MindyError::Configuration"),
            contains_substring("status_manager")
        )))
    );
}
