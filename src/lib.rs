// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_std]

#[cfg(test)]
extern crate std;

pub mod display;
pub mod dp_aux;
pub mod edid;
pub mod gmbus;
pub mod mmio;
pub mod pipe;
pub mod probe;
