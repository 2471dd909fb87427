// src/lib.rs

//! Harvester Image Download Library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

pub use pipeline::Harvester;
