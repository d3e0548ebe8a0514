//! Focus score from app usage.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::session::{BreakInterval, CompletedSession};
use crate::usage::AppUsageTotal;

/// Splits apps into work and non-work by a configured list.
///
/// Matching ignores ASCII case and surrounding whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppClassifier {
    work_apps: BTreeSet<String>,
}

impl AppClassifier {
    pub fn new<I, S>(work_apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            work_apps: work_apps.into_iter().map(|a| normalize(a.as_ref())).collect(),
        }
    }

    pub fn is_work_app(&self, app_identifier: &str) -> bool {
        self.work_apps.contains(&normalize(app_identifier))
    }

    /// Flip an app between work and non-work. Returns the new classification.
    pub fn toggle(&mut self, app_identifier: &str) -> bool {
        let key = normalize(app_identifier);
        if self.work_apps.remove(&key) {
            false
        } else {
            self.work_apps.insert(key);
            true
        }
    }

    pub fn work_apps(&self) -> impl Iterator<Item = &str> {
        self.work_apps.iter().map(String::as_str)
    }
}

fn normalize(app: &str) -> String {
    app.trim().to_ascii_lowercase()
}

/// One app's usage with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedUsage {
    pub app_identifier: String,
    pub foreground_seconds: u64,
    pub is_work_app: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusMetrics {
    /// Share of app time spent in work apps, 0..=100.
    pub focus_score: u8,
    pub productive_seconds: u64,
    pub distracted_seconds: u64,
    pub break_seconds: u64,
    pub total_work_seconds: u64,
    pub apps: Vec<ClassifiedUsage>,
}

/// Combine session history, breaks, and app usage into focus metrics.
///
/// With no recorded app time the score is 0.
pub fn compute_focus_metrics(
    history: &[CompletedSession],
    breaks: &[BreakInterval],
    usage: &[AppUsageTotal],
    classifier: &AppClassifier,
) -> FocusMetrics {
    let total_work_seconds = history.iter().map(|s| s.duration_seconds).sum();
    let break_seconds = breaks
        .iter()
        .filter_map(|b| b.ended_at.map(|end| b.duration_seconds(end)))
        .sum();

    let apps: Vec<ClassifiedUsage> = usage
        .iter()
        .map(|u| ClassifiedUsage {
            app_identifier: u.app_identifier.clone(),
            foreground_seconds: u.foreground_seconds,
            is_work_app: classifier.is_work_app(&u.app_identifier),
        })
        .collect();

    let (productive_seconds, distracted_seconds) =
        apps.iter().fold((0u64, 0u64), |(p, d), app| {
            if app.is_work_app {
                (p + app.foreground_seconds, d)
            } else {
                (p, d + app.foreground_seconds)
            }
        });

    FocusMetrics {
        focus_score: focus_score(productive_seconds, distracted_seconds),
        productive_seconds,
        distracted_seconds,
        break_seconds,
        total_work_seconds,
        apps,
    }
}

/// `round(productive / (productive + distracted) * 100)`, half up.
pub fn focus_score(productive_seconds: u64, distracted_seconds: u64) -> u8 {
    let total = productive_seconds as u128 + distracted_seconds as u128;
    if total == 0 {
        return 0;
    }
    let scaled = (productive_seconds as u128 * 200 + total) / (2 * total);
    scaled.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{BreakKind, SessionId};
    use chrono::{Duration, TimeZone, Utc};

    fn usage(app: &str, secs: u64) -> AppUsageTotal {
        AppUsageTotal {
            app_identifier: app.to_string(),
            foreground_seconds: secs,
        }
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(focus_score(0, 0), 0);
        assert_eq!(focus_score(1, 2), 33);
        assert_eq!(focus_score(2, 1), 67);
        assert_eq!(focus_score(1, 199), 1); // 0.5 rounds up
        assert_eq!(focus_score(5, 0), 100);
        assert_eq!(focus_score(0, 5), 0);
    }

    #[test]
    fn classifier_ignores_case_and_toggles() {
        let mut classifier = AppClassifier::new(["Slack", " com.apple.mail "]);
        assert!(classifier.is_work_app("slack"));
        assert!(classifier.is_work_app("COM.APPLE.MAIL"));
        assert!(!classifier.is_work_app("tiktok"));

        assert!(classifier.toggle("TikTok"));
        assert!(classifier.is_work_app("tiktok"));
        assert!(!classifier.toggle("slack"));
        assert!(!classifier.is_work_app("Slack"));
    }

    #[test]
    fn metrics_combine_history_breaks_and_usage() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let history = vec![CompletedSession {
            session_id: SessionId::from("s1"),
            started_at: start,
            ended_at: start + Duration::hours(2),
            duration_seconds: 7200,
        }];
        let breaks = vec![
            BreakInterval {
                kind: BreakKind::Coffee,
                started_at: start + Duration::minutes(30),
                ended_at: Some(start + Duration::minutes(40)),
            },
            BreakInterval {
                kind: BreakKind::Lunch,
                started_at: start + Duration::minutes(90),
                ended_at: None,
            },
        ];
        let apps = vec![usage("slack", 3000), usage("youtube", 1000)];
        let classifier = AppClassifier::new(["slack"]);

        let metrics = compute_focus_metrics(&history, &breaks, &apps, &classifier);
        assert_eq!(metrics.focus_score, 75);
        assert_eq!(metrics.productive_seconds, 3000);
        assert_eq!(metrics.distracted_seconds, 1000);
        assert_eq!(metrics.break_seconds, 600);
        assert_eq!(metrics.total_work_seconds, 7200);
        assert!(metrics.apps[0].is_work_app);
    }

    #[test]
    fn no_app_time_scores_zero() {
        let metrics = compute_focus_metrics(&[], &[], &[], &AppClassifier::default());
        assert_eq!(metrics, FocusMetrics::default());
    }
}
