//! Shared test helpers

#![allow(dead_code)]

pub mod assertions;
pub mod independent;
pub mod switching;
