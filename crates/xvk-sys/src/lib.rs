#![allow(clippy::manual_range_contains)]

// Platform layer for the xvk-lights tool

pub mod platform_register;
pub mod sys_main;
