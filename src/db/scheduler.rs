use super::{DBClient, UserExt};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

impl DBClient {
    /// Hourly job that wipes confirmation codes past their expiry, so a
    /// leaked code stops being usable even if nobody signs up again.
    pub async fn start_cleanup_task(&self) -> Result<JobScheduler, JobSchedulerError> {
        let sched = JobScheduler::new().await?;
        let db_client = self.clone();

        let job = Job::new_async("0 0 * * * *", move |uuid, _l| {
            let db_client = db_client.clone();
            Box::pin(async move {
                tracing::debug!("Running confirmation code cleanup job {:?}", uuid);

                match db_client.clear_expired_codes().await {
                    Ok(cleared) => {
                        tracing::info!(
                            "Cleanup job {:?} finished, cleared {} expired codes",
                            uuid,
                            cleared
                        );
                    }
                    Err(e) => {
                        tracing::error!("Cleanup job {:?} failed: {:?}", uuid, e);
                    }
                }
            })
        })?;

        sched.add(job).await?;
        // doesn't block
        sched.start().await?;

        Ok(sched)
    }
}
