//! Driver binding and activation lifecycle.
//!
//! Every driver embeds a [`Binding`] that tracks the resource it is attached
//! to and whether it has been activated:
//!
//! ```text
//!   Unbound ──bind──▶ Bound ──activate──▶ Active
//!      ▲               │  ▲                  │
//!      └────unbind─────┘  └────deactivate────┘
//! ```
//!
//! Public driver operations start with an explicit precondition check:
//! [`Binding::check_bound`] for operations that only report binding
//! information, [`Binding::check_active`] for anything that performs device or
//! network I/O. The checks fail fast; they never wait for activation.
//!
//! # Example
//!
//! ```rust,ignore
//! pub struct MyDriver {
//!     binding: Binding<dyn Provider>,
//! }
//!
//! impl MyDriver {
//!     pub async fn stage(&self, path: &Path) -> BenchResult<Locator> {
//!         let provider = self.binding.check_active()?;
//!         // ... I/O against `provider`
//!     }
//! }
//! ```

use crate::error::{BenchError, BenchResult};
use crate::resource::{Resource, ResourceKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle state of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// No resource attached
    Unbound,
    /// Resource attached, no I/O allowed
    Bound,
    /// Resource attached and activated
    Active,
}

/// Resource slot plus activation flag shared by all drivers.
///
/// The binding never owns the resource's lifetime; it holds an `Arc` handed
/// out by the bench registry.
pub struct Binding<R: ?Sized> {
    driver: String,
    accepts: &'static [ResourceKind],
    slot: RwLock<Option<Arc<R>>>,
    active: AtomicBool,
}

impl<R: Resource + ?Sized> Binding<R> {
    /// Create an unbound binding for driver `driver` accepting `accepts`.
    pub fn new(driver: impl Into<String>, accepts: &'static [ResourceKind]) -> Self {
        Self {
            driver: driver.into(),
            accepts,
            slot: RwLock::new(None),
            active: AtomicBool::new(false),
        }
    }

    /// Driver instance name used in error messages.
    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    /// Resource kinds this binding accepts.
    pub fn accepts(&self) -> &'static [ResourceKind] {
        self.accepts
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        if self.slot.read().is_none() {
            DriverState::Unbound
        } else if self.active.load(Ordering::Acquire) {
            DriverState::Active
        } else {
            DriverState::Bound
        }
    }

    /// Attach `resource`. Fails if its kind is not accepted or a resource is
    /// already attached.
    pub fn bind(&self, resource: Arc<R>) -> BenchResult<()> {
        let kind = resource.kind();
        if !self.accepts.contains(&kind) {
            return Err(BenchError::BindingMismatch {
                driver: self.driver.clone(),
                resource: resource.name().to_string(),
                kind,
                accepted: ResourceKind::join(self.accepts),
            });
        }

        let mut slot = self.slot.write();
        if let Some(existing) = slot.as_ref() {
            return Err(BenchError::Configuration(format!(
                "driver '{}' is already bound to '{}'",
                self.driver,
                existing.name()
            )));
        }
        tracing::debug!(driver = %self.driver, resource = resource.name(), "bound");
        *slot = Some(resource);
        Ok(())
    }

    /// Detach the resource, deactivating first if needed.
    pub fn unbind(&self) -> Option<Arc<R>> {
        self.active.store(false, Ordering::Release);
        let resource = self.slot.write().take();
        if let Some(res) = &resource {
            tracing::debug!(driver = %self.driver, resource = res.name(), "unbound");
        }
        resource
    }

    /// Mark the driver active. Requires a bound resource.
    pub fn activate(&self) -> BenchResult<()> {
        self.check_bound()?;
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Mark the driver inactive.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Return the bound resource or fail with [`BenchError::NotBound`].
    pub fn check_bound(&self) -> BenchResult<Arc<R>> {
        self.slot
            .read()
            .clone()
            .ok_or_else(|| BenchError::NotBound {
                driver: self.driver.clone(),
            })
    }

    /// Return the bound resource of an active driver, or fail with
    /// [`BenchError::NotBound`] / [`BenchError::NotActive`].
    pub fn check_active(&self) -> BenchResult<Arc<R>> {
        let resource = self.check_bound()?;
        if !self.active.load(Ordering::Acquire) {
            return Err(BenchError::NotActive {
                driver: self.driver.clone(),
            });
        }
        Ok(resource)
    }
}

/// Lifecycle surface shared by all drivers, used by the bench registry.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Driver instance name.
    fn name(&self) -> &str;

    /// Resource kinds this driver can bind.
    fn accepts(&self) -> &'static [ResourceKind];

    /// Current lifecycle state.
    fn state(&self) -> DriverState;

    /// Transition `Bound → Active`, running any driver-specific hook.
    async fn activate(&self) -> BenchResult<()>;

    /// Transition `Active → Bound`.
    async fn deactivate(&self) -> BenchResult<()>;
}
