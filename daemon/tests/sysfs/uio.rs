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
use mindyd::uio::SysfsUio;

static NEW_ID: &str = "sys/bus/pci/drivers/uio_pci_generic/new_id";

#[gtest]
fn register_device_twice_is_not_an_error() {
    let tree = SysfsTree::new("uio-register");
    tree.file(NEW_ID, b"");
    let uio = SysfsUio::new(tree.layout());

    expect_that!(uio.register_device(&mindy_id()), ok(anything()));
    expect_that!(uio.register_device(&mindy_id()), ok(anything()));
    expect_that!(
        std::fs::read_to_string(tree.path(NEW_ID)),
        ok(eq("10ee 903f\n"))
    );
}

#[gtest]
fn register_device_ignores_a_refused_write() {
    let tree = SysfsTree::new("uio-refused");
    let mut layout = tree.layout();
    // Opens for writing, but every write fails with ENOSPC like a rejected new_id.
    layout.uio_new_id_path = "/dev/full".into();
    let uio = SysfsUio::new(layout);

    expect_that!(uio.register_device(&mindy_id()), ok(eq(&())));
    expect_that!(uio.register_device(&mindy_id()), ok(eq(&())));
}

#[gtest]
fn register_device_without_driver_fails() {
    let tree = SysfsTree::new("uio-no-driver");
    let uio = SysfsUio::new(tree.layout());
    expect_that!(
        uio.register_device(&mindy_id()),
        err(displays_as(all!(
            contains_substring("MindyError::UioRegistrationFailed"),
            contains_substring("10ee:903f"),
            contains_substring("new_id")
        )))
    );
}

#[gtest]
fn find_index_follows_class_links() {
    let tree = SysfsTree::new("uio-find");
    tree.link(
        "sys/class/uio/uio0",
        "../../devices/pci0000:00/0000:00:1c.0/0000:02:00.0/uio/uio0",
    );
    tree.link(
        "sys/class/uio/uio4",
        "../../devices/pci0000:00/0000:00:01.0/0000:01:00.0/uio/uio4",
    );
    let uio = SysfsUio::new(tree.layout());

    expect_that!(uio.find_index(&mindy_id(), MINDY_BDF), ok(eq(&4u32)));
    expect_that!(uio.find_index(&mindy_id(), "0000:02:00.0"), ok(eq(&0u32)));
}

#[gtest]
fn find_index_without_match_fails() {
    let tree = SysfsTree::new("uio-missing");
    tree.link(
        "sys/class/uio/uio0",
        "../../devices/pci0000:00/0000:00:1c.0/0000:02:00.0/uio/uio0",
    );
    let uio = SysfsUio::new(tree.layout());
    expect_that!(
        uio.find_index(&mindy_id(), MINDY_BDF),
        err(displays_as(all!(
            contains_substring("MindyError::UioIndexNotFound"),
            contains_substring(MINDY_BDF)
        )))
    );
}
