#![doc = include_str!("../README.md")]

mod client;
mod common;

pub use client::*;
pub use common::*;
