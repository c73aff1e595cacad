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
use mindyd::pci::{PciBackend, SysfsPci};
use mindyd::register_port::RegisterBus;

/// BAR0 of 64 KiB at 0xF000_0000, BAR1 unused, BAR2 an I/O port range.
static RESOURCE: &str = "0x00000000f0000000 0x00000000f000ffff 0x0000000000040200\n\
0x0000000000000000 0x0000000000000000 0x0000000000000000\n\
0x000000000000e000 0x000000000000e07f 0x0000000000040101\n";

#[gtest]
fn resolve_picks_lowest_matching_bus_address() {
    let tree = SysfsTree::new("pci-resolve");
    tree.pci_function("0000:01:00.0", "0x8086\n", "0x1533\n");
    tree.pci_function("0000:04:00.0", "0x10ee\n", "0x903f\n");
    tree.pci_function("0000:03:00.0", "0x10ee\n", "0x903f\n");
    let pci = SysfsPci::new(tree.layout());

    expect_that!(pci.resolve(&mindy_id()), ok(eq("0000:03:00.0")));
}

#[gtest]
fn resolve_skips_unreadable_functions() {
    let tree = SysfsTree::new("pci-resolve-broken");
    tree.file("sys/bus/pci/devices/0000:00:00.0/vendor", b"0x10ee\n");
    tree.pci_function(MINDY_BDF, "0x10ee\n", "0x903f\n");
    let pci = SysfsPci::new(tree.layout());

    expect_that!(pci.resolve(&mindy_id()), ok(eq(MINDY_BDF)));
}

#[gtest]
fn resolve_without_match_is_device_not_found() {
    let tree = SysfsTree::new("pci-resolve-none");
    tree.pci_function(MINDY_BDF, "0x8086\n", "0x1533\n");
    let pci = SysfsPci::new(tree.layout());

    expect_that!(
        pci.resolve(&mindy_id()),
        err(displays_as(all!(
            contains_substring("MindyError::DeviceNotFound"),
            contains_substring("10ee:903f")
        )))
    );
}

#[gtest]
fn map_covers_memory_bars_only() {
    let tree = SysfsTree::new("pci-map");
    tree.file(
        &format!("sys/bus/pci/devices/{MINDY_BDF}/resource"),
        RESOURCE.as_bytes(),
    );
    let mut bar0 = vec![0u8; 0x1_0000];
    bar0[0x10..0x14].copy_from_slice(&0xCAFE_F00Du32.to_ne_bytes());
    tree.file(&format!("sys/bus/pci/devices/{MINDY_BDF}/resource0"), &bar0);
    let pci = SysfsPci::new(tree.layout());

    let regions = pci.map(&mindy_id(), MINDY_BDF).unwrap();
    assert_that!(regions.len(), eq(1usize));
    expect_that!(regions[0].index, eq(0usize));
    expect_that!(regions[0].bus_base, eq(0xF000_0000u64));
    expect_that!(regions[0].size, eq(0x1_0000usize));
    expect_that!(regions[0].bar.read32(0x10), eq(0xCAFE_F00Du32));

    regions[0].bar.write32(0x20, 0x1234_5678);
    expect_that!(
        tree.bytes(&format!("sys/bus/pci/devices/{MINDY_BDF}/resource0"), 0x20, 4),
        eq(&0x1234_5678u32.to_ne_bytes().to_vec())
    );
}

#[gtest]
fn map_of_missing_resource_file_fails() {
    let tree = SysfsTree::new("pci-map-missing");
    tree.file(
        &format!("sys/bus/pci/devices/{MINDY_BDF}/resource"),
        RESOURCE.as_bytes(),
    );
    let pci = SysfsPci::new(tree.layout());

    expect_that!(
        pci.map(&mindy_id(), MINDY_BDF),
        err(displays_as(all!(
            contains_substring("MindyError::MapFailed"),
            contains_substring("resource0")
        )))
    );
}

/// `0000:01:00.0` behind the root port `0000:00:01.0`, laid out the way sysfs links a
/// device to its real location under `sys/devices/`.
fn bridged_tree(name: &str) -> SysfsTree {
    let tree = SysfsTree::new(name);
    let mut config = vec![0u8; 0x40];
    config[0x3E] = 0x03;
    tree.file("sys/devices/pci0000:00/0000:00:01.0/config", &config);
    tree.file("sys/devices/pci0000:00/0000:00:01.0/0000:01:00.0/remove", b"");
    tree.link(
        "sys/bus/pci/devices/0000:00:01.0",
        "../../../devices/pci0000:00/0000:00:01.0",
    );
    tree.link(
        &format!("sys/bus/pci/devices/{MINDY_BDF}"),
        "../../../devices/pci0000:00/0000:00:01.0/0000:01:00.0",
    );
    tree.file("sys/bus/pci/rescan", b"");
    tree
}

#[gtest]
fn hot_reset_pulses_secondary_bus_reset_of_the_bridge() {
    let tree = bridged_tree("pci-hot-reset");
    let pci = SysfsPci::new(tree.layout());

    expect_that!(pci.hot_reset(&mindy_id(), MINDY_BDF), ok(anything()));
    // the reset bit is released again and the other control bits are untouched
    expect_that!(
        tree.bytes("sys/devices/pci0000:00/0000:00:01.0/config", 0x3E, 2),
        eq(&vec![0x03u8, 0x00])
    );
    expect_that!(
        std::fs::read_to_string(tree.path(
            "sys/devices/pci0000:00/0000:00:01.0/0000:01:00.0/remove"
        )),
        ok(eq("1"))
    );
    expect_that!(
        std::fs::read_to_string(tree.path("sys/bus/pci/rescan")),
        ok(eq("1"))
    );
}

#[gtest]
fn hot_reset_on_root_bus_resets_the_function() {
    let tree = SysfsTree::new("pci-flr");
    tree.file("sys/devices/pci0000:00/0000:00:05.0/reset", b"");
    tree.link(
        "sys/bus/pci/devices/0000:00:05.0",
        "../../../devices/pci0000:00/0000:00:05.0",
    );
    let pci = SysfsPci::new(tree.layout());

    expect_that!(pci.hot_reset(&mindy_id(), "0000:00:05.0"), ok(anything()));
    expect_that!(
        std::fs::read_to_string(tree.path("sys/devices/pci0000:00/0000:00:05.0/reset")),
        ok(eq("1"))
    );
}
