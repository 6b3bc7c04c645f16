//! Clip retrieval and verification orchestration.
//!
//! Read paths serve only verified clips and kick off fire-and-forget
//! revalidation for anything stale; `validate_and_update` is the sole
//! writer of a clip's verification status.

use serde::Serialize;
use sqlx::PgPool;

use crate::domain::clips as clips_domain;
use crate::models::{ClipForDisplay, ClipRecord, VerifiedStatus};
use crate::services::validation::{
    ClipValidator, derive_thumbnail_url, needs_revalidation,
};

/// Static labels for clip categories; unknown slugs fall back to the raw slug
const CATEGORY_LABELS: &[(&str, &str)] = &[
    ("skilled-trades", "Skilled Trades"),
    ("healthcare", "Healthcare"),
    ("technology", "Technology"),
    ("creative", "Creative & Media"),
    ("business", "Business & Finance"),
    ("public-service", "Public Service"),
    ("hospitality", "Hospitality & Tourism"),
];

pub fn category_label(slug: &str) -> String {
    CATEGORY_LABELS
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| slug.to_string())
}

/// Outcome of validating a single clip
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregate counts from a bulk validation run
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub validated: u64,
    pub valid: u64,
    pub invalid: u64,
}

/// One category's verified clips, capped per category
#[derive(Debug, Serialize)]
pub struct CategoryClips {
    pub category: String,
    pub category_label: String,
    pub clips: Vec<ClipForDisplay>,
}

/// Validate a clip's URL and persist the outcome as a single update.
///
/// A missing record is a reported outcome, not an error; only DB failures
/// propagate. Probe failures land in `check_fail_reason`, success clears it,
/// and the thumbnail is back-filled only when the record has none.
pub async fn validate_and_update(
    db: &PgPool,
    validator: &ClipValidator,
    clip_id: i64,
) -> Result<ValidationReport, sqlx::Error> {
    let Some(clip) = clips_domain::get_clip(db, clip_id).await? else {
        return Ok(ValidationReport {
            success: false,
            is_valid: false,
            reason: Some(format!("Clip {} not found", clip_id)),
        });
    };

    let format_outcome = validator.check_url_format(&clip.url);
    let outcome = if format_outcome.is_valid {
        validator.probe_url(&clip.url).await
    } else {
        format_outcome
    };

    let platform = clip.platform();
    let source_label = platform
        .map(|p| p.source_label().to_string())
        .unwrap_or_else(|| clip.platform.clone());
    let thumbnail_url = if clip.thumbnail_url.is_none() {
        platform.and_then(|p| derive_thumbnail_url(p, &clip.url))
    } else {
        None
    };

    let status = if outcome.is_valid {
        VerifiedStatus::Valid
    } else {
        VerifiedStatus::Invalid
    };
    let fail_reason = if outcome.is_valid {
        None
    } else {
        outcome.reason.clone()
    };

    clips_domain::update_validation_outcome(
        db,
        clip_id,
        status,
        fail_reason.as_deref(),
        thumbnail_url.as_deref(),
        &source_label,
    )
    .await?;

    Ok(ValidationReport {
        success: true,
        is_valid: outcome.is_valid,
        reason: fail_reason,
    })
}

/// List verified clips for display, optionally filtered by career and
/// category. Stale entries in the result set are revalidated in the
/// background; the caller gets its response immediately.
pub async fn list_valid_clips(
    db: &PgPool,
    validator: &ClipValidator,
    career_slug: Option<&str>,
    category_slug: Option<&str>,
    limit: i64,
) -> Result<Vec<ClipForDisplay>, sqlx::Error> {
    let clips =
        clips_domain::list_valid_clips(db, career_slug, category_slug, limit).await?;

    schedule_revalidation(db, validator, &clips);

    Ok(clips.iter().map(ClipForDisplay::from).collect())
}

/// List verified clips grouped by category, capped per category
pub async fn list_clips_by_category(
    db: &PgPool,
    validator: &ClipValidator,
    per_category_limit: i64,
) -> Result<Vec<CategoryClips>, sqlx::Error> {
    let clips = clips_domain::list_valid_clips_by_category(db).await?;
    let groups = group_by_category(clips, per_category_limit);

    let retained: Vec<ClipRecord> = groups
        .iter()
        .flat_map(|(_, clips)| clips.iter().cloned())
        .collect();
    schedule_revalidation(db, validator, &retained);

    Ok(groups
        .into_iter()
        .map(|(category, clips)| CategoryClips {
            category_label: category_label(&category),
            clips: clips.iter().map(ClipForDisplay::from).collect(),
            category,
        })
        .collect())
}

/// Group clips (already ordered by category, then display order) into
/// per-category buckets of at most `per_category_limit` entries
fn group_by_category(
    clips: Vec<ClipRecord>,
    per_category_limit: i64,
) -> Vec<(String, Vec<ClipRecord>)> {
    let mut groups: Vec<(String, Vec<ClipRecord>)> = Vec::new();
    if per_category_limit <= 0 {
        return groups;
    }

    for clip in clips {
        if let Some((category, bucket)) = groups.last_mut() {
            if *category == clip.category_slug {
                if (bucket.len() as i64) < per_category_limit {
                    bucket.push(clip);
                }
                continue;
            }
        }
        groups.push((clip.category_slug.clone(), vec![clip]));
    }

    groups
}

/// Spawn a detached revalidation task for every stale clip in the set.
///
/// The caller is never delayed or failed by this: errors are logged and
/// swallowed. The validator's in-flight set keeps two concurrent readers
/// from probing the same clip twice.
fn schedule_revalidation(db: &PgPool, validator: &ClipValidator, clips: &[ClipRecord]) {
    for clip in clips {
        if !needs_revalidation(clip.last_checked_at) {
            continue;
        }
        if !validator.begin_revalidation(clip.id) {
            continue;
        }

        let db = db.clone();
        let validator = validator.clone();
        let clip_id = clip.id;
        tokio::spawn(async move {
            match validate_and_update(&db, &validator, clip_id).await {
                Ok(report) if !report.is_valid => println!(
                    "[revalidate] Clip {} failed revalidation: {}",
                    clip_id,
                    report.reason.as_deref().unwrap_or("unknown reason")
                ),
                Ok(_) => {}
                Err(e) => eprintln!("[revalidate] Error revalidating clip {}: {}", clip_id, e),
            }
            validator.finish_revalidation(clip_id);
        });
    }
}

/// Validate every clip still in `not_checked`, strictly one at a time.
///
/// Sequential on purpose: the remote platforms may rate-limit by source IP,
/// so bulk runs trade throughput for host-friendliness. Individual failures
/// are counted and logged, never abort the run.
pub async fn validate_all_pending(
    db: &PgPool,
    validator: &ClipValidator,
) -> Result<BatchReport, sqlx::Error> {
    let pending = clips_domain::list_pending_clip_ids(db).await?;
    println!("[batch-validate] {} clips pending validation", pending.len());

    let mut report = BatchReport {
        validated: 0,
        valid: 0,
        invalid: 0,
    };

    for clip_id in pending {
        match validate_and_update(db, validator, clip_id).await {
            Ok(outcome) if outcome.success => {
                report.validated += 1;
                if outcome.is_valid {
                    report.valid += 1;
                } else {
                    report.invalid += 1;
                    println!(
                        "[batch-validate] Clip {} invalid: {}",
                        clip_id,
                        outcome.reason.as_deref().unwrap_or("unknown reason")
                    );
                }
            }
            Ok(_) => {
                // Deleted between the id listing and the lookup
                println!("[batch-validate] Clip {} disappeared, skipping", clip_id);
            }
            Err(e) => {
                eprintln!("[batch-validate] Error validating clip {}: {}", clip_id, e);
            }
        }
    }

    println!(
        "[batch-validate] Done: {} validated, {} valid, {} invalid",
        report.validated, report.valid, report.invalid
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn clip(id: i64, category: &str) -> ClipRecord {
        ClipRecord {
            id,
            career_slug: "electrician".to_string(),
            category_slug: category.to_string(),
            title: format!("Clip {}", id),
            platform: "youtube".to_string(),
            url: format!("https://youtu.be/vid{}", id),
            thumbnail_url: None,
            duration_secs: 45,
            display_order: id as i32,
            verified_status: "valid".to_string(),
            last_checked_at: Some(Utc::now()),
            check_fail_reason: None,
            source_label: Some("YouTube".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn known_category_gets_its_label() {
        assert_eq!(category_label("skilled-trades"), "Skilled Trades");
    }

    #[test]
    fn unknown_category_falls_back_to_slug() {
        assert_eq!(category_label("marine-biology"), "marine-biology");
    }

    #[test]
    fn grouping_caps_each_category() {
        let clips = vec![
            clip(1, "skilled-trades"),
            clip(2, "skilled-trades"),
            clip(3, "skilled-trades"),
            clip(4, "healthcare"),
        ];
        let groups = group_by_category(clips, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "skilled-trades");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "healthcare");
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn grouping_preserves_input_order_within_category() {
        let clips = vec![clip(1, "technology"), clip(2, "technology")];
        let groups = group_by_category(clips, 5);
        let ids: Vec<i64> = groups[0].1.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn zero_limit_yields_no_groups() {
        let groups = group_by_category(vec![clip(1, "technology")], 0);
        assert!(groups.is_empty());
    }
}
