//! `bench-core`
//!
//! Core trait definitions and types for the rust_bench test-bench abstraction.
//!
//! A bench is made of **resources** (declarative descriptions of a controllable
//! endpoint: a GPIO line, a file-staging destination) and **drivers** that are
//! bound to those resources and expose uniform operations regardless of the
//! underlying transport.
//!
//! ## Layers
//!
//! - **Resource**: static or dynamically matched configuration ([`resource`])
//! - **Driver lifecycle**: `Unbound → Bound → Active` guards ([`driver`])
//! - **Capabilities**: what a bound driver can do ([`capabilities`])
//! - **External commands**: the process boundary drivers shell out through ([`process`])
//!
//! ```text
//! ┌──────────────┐   bind    ┌──────────────────────┐   activate   ┌────────┐
//! │   Resource   │ ────────▶ │ Driver (Bound)       │ ───────────▶ │ Active │
//! │ kind + attrs │           │ export vars only     │              │  I/O   │
//! └──────────────┘           └──────────────────────┘              └────────┘
//! ```

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod process;
pub mod resource;

pub use capabilities::{DigitalOutput, FileStager, Locator, NfsFile};
pub use driver::{Binding, Driver, DriverState};
pub use error::{BenchError, BenchResult};
pub use process::{format_command, CommandRunner, ProcessRunner};
pub use resource::{is_local_host, ExportVars, GpioLine, Provider, Resource, ResourceKind};
