use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::AdmissionController;
use crate::error::Result;
use crate::models::Task;

impl AdmissionController {
    /// Sliding-window bucket check. Each admission appends one bucket; expired
    /// buckets are purged lazily on the next check for the same definition.
    pub(super) async fn check_rate_limit(&self, task: &Task, now: DateTime<Utc>) -> Result<bool> {
        let Some((limit, window_seconds)) = self
            .task_defs
            .task_def(task.definition_name())
            .and_then(|def| def.effective_rate_limit())
        else {
            return Ok(false);
        };

        let window = Duration::seconds(window_seconds);
        let window_start = now - window;

        let mut unit = self.store.begin_admission(task.definition_name()).await?;
        let purged = unit.purge_rate_buckets(window_start).await?;
        let used = unit.count_rate_buckets(window_start, now).await?;

        if used < limit {
            unit.insert_rate_bucket(now, now + window).await?;
            unit.commit().await?;
            return Ok(false);
        }

        unit.commit().await?;
        debug!(
            used = used,
            limit = limit,
            window_seconds = window_seconds,
            purged = purged,
            "🚦 ADMISSION: rate limit reached"
        );
        Ok(true)
    }
}
