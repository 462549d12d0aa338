//! Hardware drivers.
//!
//! - [`gpiod`]: [`DigitalOutput`](bench_core::DigitalOutput) through the
//!   libgpiod `gpioset` tool

pub mod gpiod;

pub use gpiod::{GpiodDigitalOutputDriver, GpioTools, GPIO_KINDS};
