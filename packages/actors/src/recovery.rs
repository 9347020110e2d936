//! Startup sweep for jobs stranded by a crashed process.

use taskqueue_core::QueueError;

use crate::driver::QueueDriver;

/// Requeue every job left in flight by a previous run.
///
/// Runs before the pool starts claiming, so nothing this process owns can
/// be mistaken for a stranded job. A no-op for drivers without persistence.
pub async fn recover_stranded_jobs(driver: &dyn QueueDriver) -> Result<usize, QueueError> {
    if !driver.kind().supports_persistence() {
        return Ok(0);
    }

    let recovered = driver.recover().await?;
    if recovered > 0 {
        tracing::warn!(recovered, driver = %driver.kind(), "Requeued jobs left active by a previous run");
    } else {
        tracing::debug!(driver = %driver.kind(), "No stranded jobs to recover");
    }
    Ok(recovered)
}
