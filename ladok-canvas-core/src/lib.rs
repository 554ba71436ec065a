#![doc = "ladok-canvas-core: core logic library for ladok-canvas."]

//! This crate holds the clients, data models and report drivers for
//! cross-referencing Canvas courses with Ladok student records.
//! The CLI crate only parses arguments, loads configuration and writes files.
//!
//! # Layout
//! - [`contract`]: the HTTP seam every client is written against.
//! - [`transport`]: the reqwest implementation with a cookie jar.
//! - [`paginate`]: Link-header pagination.
//! - [`canvas`], [`ladok`]: the two remote systems.
//! - [`normalize`]: study-structure flattening and the program filter.
//! - [`report`]: the spreadsheet drivers.

pub mod canvas;
pub mod config;
pub mod contract;
pub mod error;
pub mod ladok;
pub mod normalize;
pub mod paginate;
pub mod participation;
pub mod report;
pub mod transport;

pub use error::{Error, Result};
