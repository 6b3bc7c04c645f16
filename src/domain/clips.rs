//! Clip domain - DB queries for career clips
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use sqlx::{Executor, Postgres};

use crate::models::{ClipRecord, VerifiedStatus};

const CLIP_COLUMNS: &str = "id, career_slug, category_slug, title, platform, url, \
     thumbnail_url, duration_secs, display_order, verified_status, \
     last_checked_at, check_fail_reason, source_label, created_at";

/// Fetch a single clip by id
pub async fn get_clip<'e, E>(executor: E, clip_id: i64) -> Result<Option<ClipRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {} FROM career_clips WHERE id = $1", CLIP_COLUMNS);

    sqlx::query_as(&query)
        .bind(clip_id)
        .fetch_optional(executor)
        .await
}

/// List verified clips with optional career/category filters.
///
/// The `verified_status = 'valid'` predicate is part of the SQL text, not a
/// bind: callers cannot widen this query to unverified clips.
pub async fn list_valid_clips<'e, E>(
    executor: E,
    career_slug: Option<&str>,
    category_slug: Option<&str>,
    limit: i64,
) -> Result<Vec<ClipRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        SELECT {}
        FROM career_clips
        WHERE verified_status = 'valid'
          AND ($1::text IS NULL OR career_slug = $1)
          AND ($2::text IS NULL OR category_slug = $2)
        ORDER BY display_order ASC, created_at DESC
        LIMIT $3
        "#,
        CLIP_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(career_slug)
        .bind(category_slug)
        .bind(limit)
        .fetch_all(executor)
        .await
}

/// List every verified clip, grouped-friendly ordering (category first).
/// The per-category cap is applied by the caller.
pub async fn list_valid_clips_by_category<'e, E>(
    executor: E,
) -> Result<Vec<ClipRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        SELECT {}
        FROM career_clips
        WHERE verified_status = 'valid'
        ORDER BY category_slug ASC, display_order ASC, created_at DESC
        "#,
        CLIP_COLUMNS
    );

    sqlx::query_as(&query).fetch_all(executor).await
}

/// Ids of all clips that have never been checked, in enumeration order
pub async fn list_pending_clip_ids<'e, E>(executor: E) -> Result<Vec<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT id FROM career_clips
        WHERE verified_status = 'not_checked'
        ORDER BY id ASC
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Persist a validation outcome as a single atomic update.
///
/// `thumbnail_url` is back-filled only when currently empty and never
/// overwritten; `check_fail_reason` is set on failure and cleared on success
/// by passing NULL.
pub async fn update_validation_outcome<'e, E>(
    executor: E,
    clip_id: i64,
    status: VerifiedStatus,
    fail_reason: Option<&str>,
    thumbnail_url: Option<&str>,
    source_label: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE career_clips
        SET verified_status = $1,
            last_checked_at = NOW(),
            check_fail_reason = $2,
            thumbnail_url = COALESCE(thumbnail_url, $3),
            source_label = $4
        WHERE id = $5
        "#,
    )
    .bind(status.as_str())
    .bind(fail_reason)
    .bind(thumbnail_url)
    .bind(source_label)
    .bind(clip_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Count clips in a given verification status
pub async fn count_by_status<'e, E>(
    executor: E,
    status: VerifiedStatus,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM career_clips WHERE verified_status = $1")
            .bind(status.as_str())
            .fetch_one(executor)
            .await?;
    Ok(count)
}
