//! Symbols and externs that `tagalloc` depends on.
//!
//! This crate provides the imports of these on Linux, BSD, and Mac OS, through `libc`.

#![no_std]
#![warn(missing_docs)]

extern crate libc;

pub mod config;
pub mod log;
pub mod syscalls;
