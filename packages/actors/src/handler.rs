//! Job handler trait and the per-kind handler registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use taskqueue_core::{
    AnalyticsKpiPayload, InventoryMaintenancePayload, JobKind, JobPayload,
    OrderAccountingPayload,
};

/// Error returned by a failing handler. Its display text becomes the job's error message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for job handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers of payload type `P`.
///
/// Handlers must be idempotent: a job can run more than once after a
/// crash or a lost completion.
pub trait JobHandler<P>: Send + Sync + 'static {
    /// Process a job payload.
    fn handle(&self, payload: P) -> HandlerFuture;
}

impl<P, F, Fut> JobHandler<P> for F
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, payload: P) -> HandlerFuture {
        Box::pin((self)(payload))
    }
}

/// A payload type that owns a handler slot in the registry.
pub trait RegisteredPayload: Sized + Send + 'static {
    const KIND: JobKind;

    #[doc(hidden)]
    fn slot(registry: &mut HandlerRegistry) -> &mut Option<Arc<dyn JobHandler<Self>>>;
}

impl RegisteredPayload for OrderAccountingPayload {
    const KIND: JobKind = JobKind::OrderAccounting;

    fn slot(registry: &mut HandlerRegistry) -> &mut Option<Arc<dyn JobHandler<Self>>> {
        &mut registry.order_accounting
    }
}

impl RegisteredPayload for InventoryMaintenancePayload {
    const KIND: JobKind = JobKind::InventoryMaintenance;

    fn slot(registry: &mut HandlerRegistry) -> &mut Option<Arc<dyn JobHandler<Self>>> {
        &mut registry.inventory_maintenance
    }
}

impl RegisteredPayload for AnalyticsKpiPayload {
    const KIND: JobKind = JobKind::AnalyticsKpi;

    fn slot(registry: &mut HandlerRegistry) -> &mut Option<Arc<dyn JobHandler<Self>>> {
        &mut registry.analytics_kpi
    }
}

/// Maps each job kind to at most one handler.
///
/// Filled at startup, then shared read-only with the worker pool.
#[derive(Default)]
pub struct HandlerRegistry {
    order_accounting: Option<Arc<dyn JobHandler<OrderAccountingPayload>>>,
    inventory_maintenance: Option<Arc<dyn JobHandler<InventoryMaintenancePayload>>>,
    analytics_kpi: Option<Arc<dyn JobHandler<AnalyticsKpiPayload>>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for payload type `P`, replacing any previous one.
    pub fn register<P, H>(&mut self, handler: H) -> &mut Self
    where
        P: RegisteredPayload,
        H: JobHandler<P>,
    {
        let slot = P::slot(self);
        if slot.is_some() {
            tracing::warn!(kind = %P::KIND, "Overwriting existing job handler");
        }
        *slot = Some(Arc::new(handler));
        tracing::debug!(kind = %P::KIND, "Registered job handler");
        self
    }

    /// Check if a handler exists for a job kind.
    pub fn has_handler(&self, kind: JobKind) -> bool {
        match kind {
            JobKind::OrderAccounting => self.order_accounting.is_some(),
            JobKind::InventoryMaintenance => self.inventory_maintenance.is_some(),
            JobKind::AnalyticsKpi => self.analytics_kpi.is_some(),
        }
    }

    /// List all registered job kinds.
    pub fn kinds(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| self.has_handler(*kind))
            .collect()
    }

    /// Start the handler for a payload. `None` when no handler is bound.
    pub fn dispatch(&self, payload: JobPayload) -> Option<HandlerFuture> {
        match payload {
            JobPayload::OrderAccounting(p) => self.order_accounting.as_ref().map(|h| h.handle(p)),
            JobPayload::InventoryMaintenance(p) => {
                self.inventory_maintenance.as_ref().map(|h| h.handle(p))
            }
            JobPayload::AnalyticsKpi(p) => self.analytics_kpi.as_ref().map(|h| h.handle(p)),
        }
    }
}
