#![deny(clippy::all)]
#![warn(clippy::nursery)]

pub mod args;
pub mod bundle;
pub mod client;
pub mod config;
pub mod console_message;
pub mod driver;
pub mod error;
pub mod hash;
pub mod model;
pub mod poll;
pub mod tor;
pub mod wildfire;

#[cfg(test)]
mod testing;

pub use client::{CuckooClient, SandboxApi};
pub use error::{Result, SandboxError};
