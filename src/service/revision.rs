use crate::db::DatabaseHandle;
use crate::error::ServiceError;
use std::sync::Arc;
use tracing::{error, info};

/// Run the revision query, if any, and log the result.
///
/// The value is not checked against an expected range; only the shape of
/// the result (one row, one integer column) is enforced.
pub async fn report_revision<H>(handle: &H, query: Option<&str>) -> Result<Option<i64>, ServiceError>
where
    H: DatabaseHandle + ?Sized,
{
    let Some(query) = query.filter(|q| !q.trim().is_empty()) else {
        return Ok(None);
    };

    match handle.fetch_revision(query).await {
        Ok(revision) => {
            info!(revision, "using database rev.{revision}");
            Ok(Some(revision))
        }
        Err(e) => {
            error!(error = %e, "retrieving revision from database failed");
            Err(ServiceError::Revision {
                source: Arc::new(e),
            })
        }
    }
}
