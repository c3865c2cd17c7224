//! Compliance statistics
//!
//! Pure functions over a point-in-time snapshot of items.

use crate::catalog::TableSummary;
use crate::error::{validation_error, AppError};
use crate::governance::item::{DescriptionItem, ItemStatus, ObjectType};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub applied: u64,
    pub tables: u64,
    pub columns: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceStats {
    #[serde(flatten)]
    pub counts: Counts,
    pub compliance_score: f64,
    pub compliance_grade: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProgress {
    pub schema: String,
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub pct_complete: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBucket {
    pub bucket_start: DateTime<Utc>,
    pub approved: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerActivity {
    pub reviewer: String,
    pub status: ItemStatus,
    pub count: u64,
    pub first_review: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCoverage {
    pub schema_name: String,
    pub total_tables: u64,
    pub documented: u64,
    pub missing: u64,
    pub pct_complete: f64,
}

/// Width of a review activity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketWindow {
    Hour,
    #[default]
    Day,
    Week,
    Seconds(i64),
}

impl BucketWindow {
    pub fn seconds(&self) -> i64 {
        match self {
            BucketWindow::Hour => 3_600,
            BucketWindow::Day => 86_400,
            BucketWindow::Week => 604_800,
            BucketWindow::Seconds(secs) => *secs,
        }
    }
}

impl FromStr for BucketWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(BucketWindow::Hour),
            "day" => Ok(BucketWindow::Day),
            "week" => Ok(BucketWindow::Week),
            other => match other.parse::<i64>() {
                Ok(secs) if secs > 0 => Ok(BucketWindow::Seconds(secs)),
                _ => Err(validation_error(
                    "window",
                    format!("Window must be hour, day, week or a positive number of seconds, got '{}'", s),
                )),
            },
        }
    }
}

pub fn counts(items: &[DescriptionItem]) -> Counts {
    let mut counts = Counts::default();
    for item in items {
        counts.total += 1;
        match item.status {
            ItemStatus::Pending => counts.pending += 1,
            ItemStatus::Approved => counts.approved += 1,
            ItemStatus::Rejected => counts.rejected += 1,
            ItemStatus::Applied => counts.applied += 1,
        }
        match item.object_type {
            ObjectType::Table => counts.tables += 1,
            ObjectType::Column => counts.columns += 1,
        }
    }
    counts
}

/// Percentage of items applied; 0 for an empty set
pub fn compliance_score(counts: &Counts) -> f64 {
    if counts.total == 0 {
        return 0.0;
    }
    counts.applied as f64 / counts.total as f64 * 100.0
}

pub fn compliance_grade(score: f64) -> char {
    match score {
        s if s >= 90.0 => 'A',
        s if s >= 80.0 => 'B',
        s if s >= 70.0 => 'C',
        s if s >= 60.0 => 'D',
        _ => 'F',
    }
}

pub fn compliance_stats(items: &[DescriptionItem]) -> ComplianceStats {
    let counts = counts(items);
    let score = compliance_score(&counts);
    ComplianceStats {
        counts,
        compliance_score: score,
        compliance_grade: compliance_grade(score),
    }
}

/// One row per schema, ordered by schema name
pub fn schema_progress(items: &[DescriptionItem]) -> Vec<SchemaProgress> {
    let mut by_schema: BTreeMap<&str, (u64, u64, u64)> = BTreeMap::new();
    for item in items {
        let entry = by_schema.entry(item.schema_name.as_str()).or_default();
        entry.0 += 1;
        match item.status {
            ItemStatus::Applied => entry.1 += 1,
            ItemStatus::Pending => entry.2 += 1,
            _ => {}
        }
    }

    by_schema
        .into_iter()
        .map(|(schema, (total, completed, pending))| SchemaProgress {
            schema: schema.to_string(),
            total,
            completed,
            pending,
            pct_complete: if total == 0 {
                0
            } else {
                (completed as f64 / total as f64 * 100.0).round() as u32
            },
        })
        .collect()
}

/// Reviewed items bucketed by `floor(reviewedAt / window)`, ascending.
/// APPLIED items count as approvals.
pub fn review_activity(items: &[DescriptionItem], window: BucketWindow) -> Vec<ActivityBucket> {
    let width = window.seconds().max(1);
    let mut buckets: BTreeMap<i64, (u64, u64)> = BTreeMap::new();

    for item in items {
        let Some(reviewed_at) = item.reviewed_at else {
            continue;
        };
        let key = reviewed_at.timestamp().div_euclid(width);
        let entry = buckets.entry(key).or_default();
        match item.status {
            ItemStatus::Approved | ItemStatus::Applied => entry.0 += 1,
            ItemStatus::Rejected => entry.1 += 1,
            ItemStatus::Pending => {}
        }
    }

    buckets
        .into_iter()
        .filter_map(|(key, (approved, rejected))| {
            let start = Utc.timestamp_opt(key * width, 0).single()?;
            Some(ActivityBucket {
                bucket_start: start,
                approved,
                rejected,
            })
        })
        .collect()
}

/// Per reviewer and resulting status, ordered by reviewer then status
pub fn reviewer_activity(items: &[DescriptionItem]) -> Vec<ReviewerActivity> {
    let mut grouped: BTreeMap<(String, &'static str), ReviewerActivity> = BTreeMap::new();

    for item in items {
        let (Some(reviewer), Some(at)) = (&item.reviewer, item.reviewed_at) else {
            continue;
        };
        grouped
            .entry((reviewer.clone(), item.status.as_str()))
            .and_modify(|a| {
                a.count += 1;
                a.first_review = a.first_review.min(at);
                a.last_review = a.last_review.max(at);
            })
            .or_insert_with(|| ReviewerActivity {
                reviewer: reviewer.clone(),
                status: item.status,
                count: 1,
                first_review: at,
                last_review: at,
            });
    }

    grouped.into_values().collect()
}

/// Documented-table coverage of one schema, as reported by the catalog
pub fn schema_coverage(schema: &str, tables: &[TableSummary]) -> SchemaCoverage {
    let total = tables.len() as u64;
    let documented = tables.iter().filter(|t| t.is_documented()).count() as u64;
    let pct = if total == 0 {
        0.0
    } else {
        (documented as f64 / total as f64 * 10_000.0).round() / 100.0
    };
    SchemaCoverage {
        schema_name: schema.to_string(),
        total_tables: total,
        documented,
        missing: total - documented,
        pct_complete: pct,
    }
}

/// Highest coverage first, then by name
pub fn sort_coverage(rows: &mut [SchemaCoverage]) {
    rows.sort_by(|a, b| {
        b.pct_complete
            .total_cmp(&a.pct_complete)
            .then_with(|| a.schema_name.cmp(&b.schema_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::item::{ObjectPath, Transition};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn item(path: &str) -> DescriptionItem {
        DescriptionItem::new_pending(
            &ObjectPath::parse(path).unwrap(),
            None,
            "text".to_string(),
            "m".to_string(),
        )
    }

    fn reviewed(path: &str, approve: bool, reviewer: &str, at: DateTime<Utc>) -> DescriptionItem {
        let mut it = item(path);
        let transition = if approve {
            Transition::Approve {
                text: "ok".to_string(),
                reviewer: reviewer.to_string(),
            }
        } else {
            Transition::Reject {
                reviewer: reviewer.to_string(),
            }
        };
        it.apply_transition(&transition, at).unwrap();
        it
    }

    fn applied(path: &str, at: DateTime<Utc>) -> DescriptionItem {
        let mut it = reviewed(path, true, "ana", at);
        it.apply_transition(&Transition::Apply, at).unwrap();
        it
    }

    #[test]
    fn test_empty_set_scores_zero() {
        let stats = compliance_stats(&[]);
        assert_eq!(stats.counts.total, 0);
        assert_eq!(stats.compliance_score, 0.0);
        assert_eq!(stats.compliance_grade, 'F');
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(compliance_grade(90.0), 'A');
        assert_eq!(compliance_grade(89.9), 'B');
        assert_eq!(compliance_grade(80.0), 'B');
        assert_eq!(compliance_grade(70.0), 'C');
        assert_eq!(compliance_grade(60.0), 'D');
        assert_eq!(compliance_grade(59.99), 'F');
    }

    #[test]
    fn test_counts_and_score() {
        let now = Utc::now();
        let items = vec![
            applied("main.a.t1", now),
            applied("main.a.t1.c1", now),
            reviewed("main.a.t2", false, "bob", now),
            item("main.b.t3"),
        ];
        let stats = compliance_stats(&items);
        assert_eq!(
            stats.counts,
            Counts {
                total: 4,
                pending: 1,
                approved: 0,
                rejected: 1,
                applied: 2,
                tables: 3,
                columns: 1,
            }
        );
        assert_eq!(stats.compliance_score, 50.0);
        assert_eq!(stats.compliance_grade, 'F');
    }

    #[test]
    fn test_schema_progress_example() {
        let now = Utc::now();
        let items = vec![
            applied("main.a.t1", now),
            item("main.a.t2"),
            applied("main.b.t3", now),
        ];
        let progress = schema_progress(&items);
        assert_eq!(
            progress,
            vec![
                SchemaProgress {
                    schema: "a".to_string(),
                    total: 2,
                    completed: 1,
                    pending: 1,
                    pct_complete: 50,
                },
                SchemaProgress {
                    schema: "b".to_string(),
                    total: 1,
                    completed: 1,
                    pending: 0,
                    pct_complete: 100,
                },
            ]
        );
    }

    #[test]
    fn test_review_activity_buckets_by_day() {
        let day = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let items = vec![
            reviewed("main.a.t1", true, "ana", day),
            reviewed("main.a.t2", false, "ana", day + Duration::hours(5)),
            applied("main.a.t3", day + Duration::days(1)),
            item("main.a.t4"),
        ];

        let buckets = review_activity(&items, BucketWindow::Day);
        assert_eq!(
            buckets,
            vec![
                ActivityBucket {
                    bucket_start: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                    approved: 1,
                    rejected: 1,
                },
                ActivityBucket {
                    bucket_start: Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
                    approved: 1,
                    rejected: 0,
                },
            ]
        );
        assert_eq!(review_activity(&items, BucketWindow::Week).len(), 1);
    }

    #[test]
    fn test_window_parsing() {
        assert_eq!("HOUR".parse::<BucketWindow>().unwrap(), BucketWindow::Hour);
        assert_eq!("900".parse::<BucketWindow>().unwrap().seconds(), 900);
        assert!("0".parse::<BucketWindow>().is_err());
        assert!("fortnight".parse::<BucketWindow>().is_err());
    }

    #[test]
    fn test_reviewer_activity_groups_by_reviewer_and_status() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let items = vec![
            reviewed("main.a.t1", true, "ana", t0),
            reviewed("main.a.t2", true, "ana", t0 + Duration::hours(2)),
            reviewed("main.a.t3", false, "bob", t0),
        ];
        let activity = reviewer_activity(&items);

        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].reviewer, "ana");
        assert_eq!(activity[0].count, 2);
        assert_eq!(activity[0].first_review, t0);
        assert_eq!(activity[0].last_review, t0 + Duration::hours(2));
        assert_eq!(activity[1].status, ItemStatus::Rejected);
    }

    #[test]
    fn test_schema_coverage_rounds_to_two_places() {
        let table = |comment: Option<&str>| TableSummary {
            table_name: "t".to_string(),
            table_type: "BASE TABLE".to_string(),
            column_count: 1,
            current_comment: comment.map(str::to_string),
        };
        let coverage = schema_coverage("a", &[table(Some("x")), table(None), table(Some(" "))]);
        assert_eq!(coverage.documented, 1);
        assert_eq!(coverage.missing, 2);
        assert_eq!(coverage.pct_complete, 33.33);
    }
}
