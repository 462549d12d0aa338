//! rust_bench: test-bench resources and drivers.
//!
//! The workspace is split into:
//!
//! - [`bench_core`]: resource, driver and capability traits, errors, process boundary
//! - [`bench_staging`]: content-addressed staging onto TFTP, HTTP and NFS providers
//! - [`bench_hardware`]: GPIO lines, device matching, bench descriptions and the registry
//!
//! This crate adds the application layer on top: [`config`] for settings
//! loaded from file and environment, [`tracing_setup`] for logging, and the
//! `rust_bench` command-line tool.

pub mod config;
pub mod tracing_setup;

pub use bench_core;
pub use bench_hardware;
pub use bench_staging;
