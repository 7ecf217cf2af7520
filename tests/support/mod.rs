//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod gallica;
pub mod socket_guard;
