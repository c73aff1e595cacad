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

use crate::common::test_functions::SysfsTree;
use googletest::prelude::*;
use mindyd::error::MindyError;
use mindyd::system_io::{fs_read, fs_read_at, fs_read_dir, fs_write, fs_write_at};
use rstest::*;
use std::path::Path;

#[gtest]
#[rstest]
#[case::not_found(
    "bad_input",
    err(displays_as(contains_substring("No such file or directory")))
)]
#[case::is_dir("/etc/", err(displays_as(contains_substring("Is a directory"))))]
fn test_fs_read<M: for<'a> Matcher<&'a std::result::Result<String, MindyError>>>(
    #[case] path_str: &str,
    #[case] condition: M,
) {
    let r = fs_read(Path::new(path_str));
    expect_that!(r, condition);
}

#[gtest]
fn write_without_create_needs_an_existing_file() {
    let tree = SysfsTree::new("io-write");
    let missing = tree.path("rescan");
    expect_that!(
        fs_write(&missing, false, "1"),
        err(displays_as(contains_substring("MindyError::IOWrite")))
    );
    expect_that!(fs_write(&missing, true, "1"), ok(anything()));
    expect_that!(fs_read(&missing), ok(eq("1")));
}

#[gtest]
fn positional_access_touches_only_the_given_bytes() {
    let tree = SysfsTree::new("io-config");
    let config = tree.file("config", &[0u8; 8]);

    expect_that!(fs_write_at(&config, 5, &[0x04]), ok(anything()));
    let mut byte = [0u8; 1];
    expect_that!(fs_read_at(&config, 5, &mut byte), ok(anything()));
    expect_that!(byte, eq([0x04u8]));
    expect_that!(tree.bytes("config", 0, 8), eq(&vec![0u8, 0, 0, 0, 0, 0x04, 0, 0]));
}

#[gtest]
fn positional_read_past_the_end_fails() {
    let tree = SysfsTree::new("io-short");
    let config = tree.file("config", &[0u8; 4]);
    let mut buf = [0u8; 2];
    expect_that!(
        fs_read_at(&config, 3, &mut buf),
        err(displays_as(contains_substring("MindyError::IORead")))
    );
}

#[gtest]
fn read_dir_lists_entry_names() {
    let tree = SysfsTree::new("io-dir");
    tree.file("devices/0000:01:00.0/vendor", b"");
    tree.file("devices/0000:02:00.0/vendor", b"");
    let mut entries = fs_read_dir(&tree.path("devices")).unwrap();
    entries.sort();
    expect_that!(entries, elements_are![eq("0000:01:00.0"), eq("0000:02:00.0")]);
}
