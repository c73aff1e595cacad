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

//! Error Wrapping File System I/O Helpers
//!
//! This module provides convenient wrappers around standard Rust file system operations,
//! with automatic conversion to `MindyError` types. All functions include trace logging
//! for debugging and provide detailed error context including file paths and operation types.
//!
//! Includes: read, write, positional (binary) read and write, symlink and directory
//! operations. Memory mapping lives with its only user in [`crate::pci`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # use mindyd::system_io::{fs_read, fs_write};
//! # use std::path::Path;
//!
//! # fn example() -> Result<(), mindyd::error::MindyError> {
//! // Read a file
//! let vendor = fs_read(Path::new("/sys/bus/pci/devices/0000:03:00.0/vendor"))?;
//!
//! // Write to a file
//! fs_write(Path::new("/sys/bus/pci/rescan"), false, "1")?;
//! # Ok(())
//! # }
//! ```

use crate::error::MindyError;
use log::trace;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Read the contents of a file to a String.
///
/// This is a convenient wrapper around `std::fs::File::read_to_string` that provides
/// trace logging and automatic error conversion to `MindyError::IORead`.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<String, MindyError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(MindyError::IORead)` - If the file cannot be read (doesn't exist, permissions, etc.)
pub fn fs_read(file_path: &Path) -> Result<String, MindyError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf: String = String::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(buf)
        }
        Err(e) => Err(MindyError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write a string value to a file.
///
/// This is a convenient wrapper around file write operations that provides trace logging
/// and automatic error conversion to `MindyError::IOWrite`.
///
/// # Arguments
///
/// * `file_path` - Path to the file to write
/// * `create` - If `true`, create the file if it doesn't exist; if `false`, file must already exist
/// * `value` - The string value to write (implements `AsRef<str>`)
///
/// # Returns: `Result<(), MindyError>`
/// * `Ok(())` - Write succeeded
/// * `Err(MindyError::IOWrite)` - If the write fails (permissions, file doesn't exist when create=false, etc.)
pub fn fs_write(file_path: &Path, create: bool, value: impl AsRef<str>) -> Result<(), MindyError> {
    trace!(
        "Attempting to write {:?} to {:?}",
        value.as_ref(),
        file_path
    );
    let result = OpenOptions::new()
        .create(create)
        .read(false)
        .write(true)
        .open(file_path)
        .and_then(|mut f| write!(f, "{}", value.as_ref()));
    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(MindyError::IOWrite {
            data: value.as_ref().to_owned(),
            file: file_path.into(),
            e,
        }),
    }
}

/// Read `buf.len()` bytes starting at byte `offset` of a file.
///
/// Used for binary pseudo-files such as a PCI device's `config`, where the position of a
/// field is fixed by the PCI configuration header layout.
///
/// # Returns: `Result<(), MindyError>`
/// * `Ok(())` - `buf` has been filled
/// * `Err(MindyError::IORead)` - The file can't be opened or is too short
pub fn fs_read_at(file_path: &Path, offset: u64, buf: &mut [u8]) -> Result<(), MindyError> {
    trace!(
        "Attempting to read {} bytes at offset 0x{offset:X} of {file_path:?}",
        buf.len()
    );
    OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|f| f.read_exact_at(buf, offset))
        .map_err(|e| MindyError::IORead {
            file: file_path.into(),
            e,
        })
}

/// Write `data` starting at byte `offset` of an existing file.
///
/// # Returns: `Result<(), MindyError>`
/// * `Ok(())` - All of `data` was written
/// * `Err(MindyError::IOWrite)` - The file can't be opened or the write was refused
pub fn fs_write_at(file_path: &Path, offset: u64, data: &[u8]) -> Result<(), MindyError> {
    trace!("Attempting to write {data:02X?} at offset 0x{offset:X} of {file_path:?}");
    OpenOptions::new()
        .write(true)
        .open(file_path)
        .and_then(|f| f.write_all_at(data, offset))
        .map_err(|e| MindyError::IOWrite {
            data: format!("{data:02X?}"),
            file: file_path.into(),
            e,
        })
}

/// Resolve the target of a symbolic link.
///
/// Sysfs expresses most device relationships as symlinks (a UIO class entry points into
/// the PCI device tree, a PCI device points at its parent bridge), so this is the
/// basic building block for walking it.
///
/// # Returns: `Result<PathBuf, MindyError>`
/// * `Ok(PathBuf)` - The link target, as stored in the link (usually relative)
/// * `Err(MindyError::IORead)` - The path doesn't exist or isn't a symbolic link
pub fn fs_read_link(link: &Path) -> Result<PathBuf, MindyError> {
    trace!("Attempting to read link '{link:?}'");
    std::fs::read_link(link).map_err(|e| MindyError::IORead {
        file: link.into(),
        e,
    })
}

/// Read the contents of a directory and return entry names.
///
/// This is a convenient wrapper around `std::fs::read_dir` that provides trace logging,
/// automatic error conversion to `MindyError::IOReadDir`, and returns a vector of entry
/// names (not full paths). Entries that cannot be read are silently skipped.
///
/// # Arguments
///
/// * `dir` - The directory path to list
///
/// # Returns: `Result<Vec<String>, MindyError>`
/// * `Ok(Vec<String>)` - List of entry names in the directory (files and subdirectories)
/// * `Err(MindyError::IOReadDir)` - If the directory cannot be read (doesn't exist, permissions, etc.)
///
/// # Examples
///
/// ```rust,no_run
/// # use mindyd::system_io::fs_read_dir;
/// # use std::path::Path;
///
/// # fn example() -> Result<(), mindyd::error::MindyError> {
/// // List all UIO devices
/// let devices = fs_read_dir(Path::new("/sys/class/uio"))?;
/// for device in devices {
///     println!("Found device: {}", device);
/// }
/// # Ok(())
/// # }
/// ```
pub fn fs_read_dir(dir: &Path) -> Result<Vec<String>, MindyError> {
    trace!("Attempting to read directory '{dir:?}'");
    std::fs::read_dir(dir).map_or_else(
        |e| {
            Err(MindyError::IOReadDir {
                dir: dir.to_owned(),
                e,
            })
        },
        |iter| {
            let ret = iter
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            trace!("Dir reading done.");
            Ok(ret)
        },
    )
}
