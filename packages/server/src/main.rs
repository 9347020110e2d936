//! Task queue process: runs the configured queue with demo handlers until ctrl-c.

use api::{AdminApi, demo_handlers, init_task_queue};
use taskqueue_core::{AnalyticsKpiPayload, InventoryMaintenancePayload, OrderAccountingPayload};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let queue = init_task_queue(demo_handlers()).await?;
    let admin = AdminApi::new(queue.clone());

    queue
        .enqueue_order_accounting(
            OrderAccountingPayload::new("demo-order", "demo-tenant").with_trigger("startup"),
        )
        .await?;
    queue
        .enqueue_inventory_maintenance(
            InventoryMaintenancePayload::new("demo-inventory", "demo-tenant")
                .with_trigger("startup"),
        )
        .await?;
    queue
        .enqueue_analytics_kpi(AnalyticsKpiPayload::new("demo-tenant").with_trigger("fail"))
        .await?;

    match admin.stats().await {
        Ok(stats) => tracing::info!(
            pending = stats.pending,
            active = stats.active,
            failed = stats.failed,
            "Queue stats"
        ),
        Err(e) => tracing::info!(status = e.status_code(), error = %e, "Queue stats unavailable"),
    }

    tracing::info!("Task queue running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    queue.shutdown().await?;
    Ok(())
}
