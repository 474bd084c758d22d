use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{ReportFilter, ReportStore, ReportSubscription, SNAPSHOT_BUFFER};
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{
    Coordinates, Department, Report, ReportDraft, ReportPatch, ReportPriority, ReportStatus,
    ReportTag,
};

/// Channel the `reports_notify` trigger publishes to
const CHANGE_CHANNEL: &str = "report_changes";

const RETRY_INITIAL: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(30);

/// Bounded exponential delay between failed feeder rounds
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: RETRY_INITIAL,
        }
    }

    /// Delay to wait now; doubles the following one up to the cap
    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(RETRY_MAX);
        delay
    }

    fn reset(&mut self) {
        self.next = RETRY_INITIAL;
    }
}

const REPORT_COLUMNS: &str = r#"
    id, user_id, description, location, tags, image_refs, audio_ref,
    priority, status, assigned_department, resolved_image_ref,
    submitted_by, lat, lng, created_at, updated_at
"#;

/// Database row for a report
#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    user_id: String,
    description: String,
    location: String,
    tags: Vec<String>,
    image_refs: Vec<String>,
    audio_ref: Option<String>,
    priority: ReportPriority,
    status: ReportStatus,
    assigned_department: Option<Department>,
    resolved_image_ref: Option<String>,
    submitted_by: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        let tags = row
            .tags
            .iter()
            .filter_map(|t| match t.parse::<ReportTag>() {
                Ok(tag) => Some(tag),
                Err(e) => {
                    warn!("Skipping tag on report {}: {}", row.id, e);
                    None
                }
            })
            .collect();

        Report {
            id: row.id.to_string(),
            user_id: row.user_id,
            description: row.description,
            location: row.location,
            tags,
            image_refs: row.image_refs,
            audio_ref: row.audio_ref,
            priority: row.priority,
            status: row.status,
            assigned_department: row.assigned_department,
            resolved_image_ref: row.resolved_image_ref,
            submitted_by: row.submitted_by,
            coordinates: match (row.lat, row.lng) {
                (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
                _ => None,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed report store. Snapshots are pushed via `LISTEN/NOTIFY`.
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_id(id: &str) -> Result<Uuid> {
        Uuid::parse_str(id).map_err(|_| AppError::NotFound(format!("Report {} not found", id)))
    }

    async fn fetch(pool: &PgPool, filter: &ReportFilter) -> Result<Vec<Report>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        qb.push(REPORT_COLUMNS);
        qb.push(" FROM reports WHERE TRUE");

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }
        if let Some(ref user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }

        qb.push(" ORDER BY created_at DESC");

        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb
            .build_query_as::<ReportRow>()
            .fetch_all(pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to query reports: {:?}", e);
                AppError::Database(e)
            })?;

        Ok(rows.into_iter().map(Report::from).collect())
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn create(&self, draft: &ReportDraft) -> Result<String> {
        let tags: Vec<String> = draft.tags.iter().map(|t| t.as_str().to_string()).collect();

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO reports (
                user_id, description, location, tags, image_refs, audio_ref,
                priority, submitted_by, lat, lng
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&draft.user_id)
        .bind(&draft.description)
        .bind(&draft.location)
        .bind(&tags)
        .bind(&draft.image_refs)
        .bind(&draft.audio_ref)
        .bind(draft.priority)
        .bind(&draft.submitted_by)
        .bind(draft.coordinates.map(|c| c.lat))
        .bind(draft.coordinates.map(|c| c.lng))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create report: {:?}", e);
            AppError::Database(e)
        })?;

        info!("Created report: {}", id);
        Ok(id.to_string())
    }

    async fn subscribe(&self, filter: &ReportFilter) -> Result<ReportSubscription> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let pool = self.pool.clone();
        let filter = filter.clone();

        let feeder = tokio::spawn(async move {
            let mut backoff = Backoff::new();

            loop {
                match Self::fetch(&pool, &filter).await {
                    Ok(snapshot) => {
                        backoff.reset();
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        error!(
                            "Failed to load report snapshot, retrying in {:?}: {}",
                            delay, e
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }

                match listener.recv().await {
                    Ok(notification) => {
                        debug!("Report change notification: {}", notification.payload());
                    }
                    Err(e) => {
                        // PgListener reconnects on the next recv; refetch so nothing is missed
                        let delay = backoff.next_delay();
                        warn!(
                            "Report change listener interrupted, retrying in {:?}: {}",
                            delay, e
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            debug!("Postgres subscription feeder stopped");
        });

        Ok(ReportSubscription::new(rx, feeder))
    }

    async fn mutate(&self, id: &str, patch: &ReportPatch) -> Result<()> {
        let uuid = Self::parse_id(id)?;

        // Single statement so co-dependent fields land together
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = COALESCE($2, status),
                assigned_department = COALESCE($3, assigned_department),
                resolved_image_ref = COALESCE($4, resolved_image_ref),
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1
            "#,
        )
        .bind(uuid)
        .bind(patch.status)
        .bind(patch.assigned_department)
        .bind(&patch.resolved_image_ref)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to mutate report {}: {:?}", id, e);
            AppError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }

        Ok(())
    }

    async fn query(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        Self::fetch(&self.pool, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new();

        let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays[0], RETRY_INITIAL);
        assert_eq!(delays[1], RETRY_INITIAL * 2);
        assert_eq!(delays[2], RETRY_INITIAL * 4);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), RETRY_MAX);

        backoff.reset();
        assert_eq!(backoff.next_delay(), RETRY_INITIAL);
    }
}
