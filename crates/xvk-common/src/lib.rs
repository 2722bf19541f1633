#![allow(clippy::needless_range_loop, clippy::manual_range_contains)]

pub mod q_shared;
pub mod qfiles;
pub mod common;
pub mod cvar;
pub mod files;
