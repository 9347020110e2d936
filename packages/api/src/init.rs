//! Startup wiring for the task queue.

use std::sync::Arc;
use std::time::Duration;

use actors::{HandlerError, HandlerRegistry, TaskQueue};
use db::DbConfig;
use taskqueue_core::{
    AnalyticsKpiPayload, DriverKind, InventoryMaintenancePayload, OrderAccountingPayload,
    QueueConfig, QueueError,
};

/// Start the task queue configured by the process environment.
///
/// This should be called once at startup, after all handlers are registered.
pub async fn init_task_queue(handlers: HandlerRegistry) -> Result<Arc<TaskQueue>, QueueError> {
    init_task_queue_with(QueueConfig::from_env(), DbConfig::from_env(), handlers).await
}

/// Start the task queue with explicit configuration.
///
/// `db_config` is only used by the SurrealDB driver.
pub async fn init_task_queue_with(
    config: QueueConfig,
    db_config: DbConfig,
    handlers: HandlerRegistry,
) -> Result<Arc<TaskQueue>, QueueError> {
    tracing::info!(driver = %config.driver, "Initializing task queue...");

    let queue = match config.driver {
        DriverKind::Memory => TaskQueue::memory(config, handlers).await?,
        DriverKind::Surreal => {
            let db = db::init(&db_config).await?;
            TaskQueue::surreal(config, db, handlers).await?
        }
    };

    tracing::info!("Task queue initialized");
    Ok(Arc::new(queue))
}

/// Demo handlers that only log, for running the queue without business services.
///
/// Analytics jobs whose trigger is `"fail"` fail on purpose, to exercise retries.
pub fn demo_handlers() -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();

    handlers.register::<OrderAccountingPayload, _>(|payload: OrderAccountingPayload| async move {
        tracing::info!(
            order_id = %payload.order_id,
            tenant_id = %payload.tenant_id,
            "Posting order accounting entries"
        );
        Ok::<(), HandlerError>(())
    });

    handlers.register::<InventoryMaintenancePayload, _>(
        |payload: InventoryMaintenancePayload| async move {
            tracing::info!(
                inventory_id = %payload.inventory_id,
                tenant_id = %payload.tenant_id,
                "Recalculating inventory levels"
            );
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<(), HandlerError>(())
        },
    );

    handlers.register::<AnalyticsKpiPayload, _>(|payload: AnalyticsKpiPayload| async move {
        if payload.trigger.as_deref() == Some("fail") {
            return Err::<(), HandlerError>("Intentional failure".into());
        }
        tracing::info!(tenant_id = %payload.tenant_id, date = ?payload.date, "Refreshing KPIs");
        Ok(())
    });

    handlers
}
