use std::fmt::Write;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::EvaluateError;
use crate::models::{AlertEvent, CheckinRecord, Emotion, Priority, StudentContext};
use crate::notify::Notifier;

/// How many of the most recent check-ins a pattern must span.
pub const PATTERN_WINDOW: usize = 3;

/// The fixed guidance attached to one tracked emotion.
pub struct SeverityBundle {
    pub headline: &'static str,
    pub label: &'static str,
    pub priority: Priority,
    pub actions: &'static [&'static str],
    pub follow_up: &'static str,
}

static STRESSED_BUNDLE: SeverityBundle = SeverityBundle {
    headline: "student needs close attention",
    label: "stressed or low mood on 3 consecutive check-ins",
    priority: Priority::High,
    actions: &[
        "Hold an individual counseling session as soon as possible",
        "Contact a parent or guardian to coordinate support",
        "Consider a peer support group session",
        "Review academic or social factors that may be contributing",
        "Watch the daily check-ins closely over the next week",
    ],
    follow_up: "Schedule a meeting within 1-2 school days",
};

static SLEEPY_BUNDLE: SeverityBundle = SeverityBundle {
    headline: "health check recommended",
    label: "sleepy or fatigued on 3 consecutive check-ins",
    priority: Priority::Medium,
    actions: &[
        "Ask the student about sleep habits and general health",
        "Check screen time in the hours before bed",
        "Talk with a parent or guardian about the evening routine",
        "Refer to the school health service if fatigue persists",
        "Review homework and extracurricular load",
    ],
    follow_up: "Arrange a light counseling chat within 2-3 days",
};

static NORMAL_BUNDLE: SeverityBundle = SeverityBundle {
    headline: "routine monitoring",
    label: "flat energy on 3 consecutive check-ins",
    priority: Priority::Low,
    actions: &[
        "Check in informally to understand how the student is doing",
        "Gauge motivation and engagement in class",
        "Look for opportunities to involve the student positively",
        "Watch whether this is a consistent pattern or a passing phase",
    ],
    follow_up: "Observe and check in informally this week",
};

/// Severity lookup for the tracked set. `None` means the emotion is not
/// monitored for repeated-pattern alerts.
pub fn severity_for(emotion: Emotion) -> Option<&'static SeverityBundle> {
    match emotion {
        Emotion::Stressed => Some(&STRESSED_BUNDLE),
        Emotion::Sleepy => Some(&SLEEPY_BUNDLE),
        Emotion::Normal => Some(&NORMAL_BUNDLE),
        Emotion::Happy | Emotion::Neutral => None,
    }
}

pub fn is_tracked(emotion: Emotion) -> bool {
    severity_for(emotion).is_some()
}

pub struct PatternMatch {
    pub pattern: Emotion,
    pub bundle: &'static SeverityBundle,
}

/// A pattern exists only when the whole window shares one tracked
/// emotion. Mixed windows never match, tracked or not.
pub fn detect_pattern(window: &[CheckinRecord]) -> Option<PatternMatch> {
    if window.len() < PATTERN_WINDOW {
        return None;
    }
    let first = window[0].emotion;
    if !window.iter().all(|checkin| checkin.emotion == first) {
        return None;
    }
    severity_for(first).map(|bundle| PatternMatch {
        pattern: first,
        bundle,
    })
}

pub fn compose_message(student: &StudentContext, found: &PatternMatch) -> String {
    let bundle = found.bundle;
    let mut message = String::new();

    let _ = writeln!(message, "CLASSPULSE ALERT - {}", bundle.headline);
    let _ = writeln!(message);
    let _ = writeln!(message, "Student: {}", student.student_name);
    let _ = writeln!(message, "Class: {}", student.class_name);
    let _ = writeln!(message, "Pattern: {}", bundle.label);
    let _ = writeln!(message, "Priority: {}", bundle.priority);
    let _ = writeln!(message);
    let _ = writeln!(message, "Recommended follow-up:");
    for (index, action) in bundle.actions.iter().enumerate() {
        let _ = writeln!(message, "{}. {}", index + 1, action);
    }
    let _ = writeln!(message);
    let _ = write!(message, "Next step: {}", bundle.follow_up);

    message
}

/// The outcome of one detection pass.
#[derive(Debug)]
pub enum Evaluation {
    InsufficientHistory { available: usize },
    NoPattern,
    Alerted {
        event: AlertEvent,
        student: StudentContext,
        sent: bool,
    },
}

/// Inspect a student's most recent check-ins and dispatch an alert when
/// they form a uniform tracked pattern. Dispatch failure is reported in
/// the `sent` flag, never as an error; the classification stands either
/// way.
pub async fn evaluate(
    pool: &PgPool,
    notifier: &Notifier,
    student_id: Uuid,
) -> Result<Evaluation, EvaluateError> {
    let window = db::fetch_recent_checkins(pool, student_id, PATTERN_WINDOW).await?;
    if window.len() < PATTERN_WINDOW {
        return Ok(Evaluation::InsufficientHistory {
            available: window.len(),
        });
    }

    let Some(found) = detect_pattern(&window) else {
        return Ok(Evaluation::NoPattern);
    };

    let student = db::fetch_student(pool, student_id)
        .await?
        .ok_or(EvaluateError::StudentNotFound(student_id))?;

    let message = compose_message(&student, &found);
    let sent = match notifier.send(&message).await {
        Ok(()) => {
            log::info!(
                "alert dispatched for student {student_id} ({} pattern, {} priority)",
                found.pattern,
                found.bundle.priority
            );
            true
        }
        Err(err) => {
            log::warn!("alert dispatch failed for student {student_id}: {err}");
            false
        }
    };

    Ok(Evaluation::Alerted {
        event: AlertEvent {
            student_id,
            pattern: found.pattern,
            priority: found.bundle.priority,
            label: found.bundle.label,
            window,
        },
        student,
        sent,
    })
}

/// Post-check-in entry point for the spawned secondary task: one
/// attempt, no retry, failures logged rather than thrown.
pub async fn run_post_checkin(pool: PgPool, notifier: Notifier, student_id: Uuid) {
    match evaluate(&pool, &notifier, student_id).await {
        Ok(Evaluation::InsufficientHistory { available }) => {
            log::debug!(
                "student {student_id}: {available} check-ins on record, pattern check skipped"
            );
        }
        Ok(Evaluation::NoPattern) => {
            log::debug!("student {student_id}: no repeated pattern in the last {PATTERN_WINDOW} check-ins");
        }
        Ok(Evaluation::Alerted { event, sent, .. }) => {
            log::debug!(
                "student {}: {} pattern handled (priority {}, sent: {sent})",
                event.student_id,
                event.pattern,
                event.priority
            );
        }
        Err(err) => {
            log::warn!("pattern evaluation failed for student {student_id}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn window_of(emotions: &[Emotion]) -> Vec<CheckinRecord> {
        let student_id = Uuid::new_v4();
        emotions
            .iter()
            .enumerate()
            .map(|(days_ago, emotion)| CheckinRecord {
                id: Uuid::new_v4(),
                student_id,
                emotion: *emotion,
                note: None,
                created_at: Utc::now() - Duration::days(days_ago as i64),
            })
            .collect()
    }

    fn sample_student() -> StudentContext {
        StudentContext {
            student_name: "Naila Putri".to_string(),
            class_name: "7A".to_string(),
        }
    }

    #[test]
    fn tracked_set_is_stressed_sleepy_normal() {
        assert!(is_tracked(Emotion::Stressed));
        assert!(is_tracked(Emotion::Sleepy));
        assert!(is_tracked(Emotion::Normal));
        assert!(!is_tracked(Emotion::Happy));
        assert!(!is_tracked(Emotion::Neutral));
    }

    #[test]
    fn short_windows_never_match() {
        assert!(detect_pattern(&window_of(&[])).is_none());
        assert!(detect_pattern(&window_of(&[Emotion::Stressed])).is_none());
        assert!(detect_pattern(&window_of(&[Emotion::Stressed, Emotion::Stressed])).is_none());
    }

    #[test]
    fn uniform_tracked_windows_match_with_their_priority() {
        let cases = [
            (Emotion::Stressed, Priority::High),
            (Emotion::Sleepy, Priority::Medium),
            (Emotion::Normal, Priority::Low),
        ];
        for (emotion, priority) in cases {
            let found = detect_pattern(&window_of(&[emotion; 3]));
            let found = found.unwrap_or_else(|| panic!("{emotion} x3 should match"));
            assert_eq!(found.pattern, emotion);
            assert_eq!(found.bundle.priority, priority);
        }
    }

    #[test]
    fn uniform_untracked_windows_do_not_match() {
        assert!(detect_pattern(&window_of(&[Emotion::Happy; 3])).is_none());
        assert!(detect_pattern(&window_of(&[Emotion::Neutral; 3])).is_none());
    }

    #[test]
    fn two_of_three_is_not_a_pattern() {
        let window = window_of(&[Emotion::Stressed, Emotion::Stressed, Emotion::Happy]);
        assert!(detect_pattern(&window).is_none());
    }

    #[test]
    fn mixed_tracked_emotions_are_not_a_pattern() {
        let window = window_of(&[Emotion::Stressed, Emotion::Sleepy, Emotion::Stressed]);
        assert!(detect_pattern(&window).is_none());
    }

    #[test]
    fn severity_mapping_is_fixed_per_tracked_tag() {
        let stressed = severity_for(Emotion::Stressed).expect("stressed is tracked");
        assert_eq!(stressed.priority, Priority::High);
        let sleepy = severity_for(Emotion::Sleepy).expect("sleepy is tracked");
        assert_eq!(sleepy.priority, Priority::Medium);
        let normal = severity_for(Emotion::Normal).expect("normal is tracked");
        assert_eq!(normal.priority, Priority::Low);
        assert!(severity_for(Emotion::Happy).is_none());
    }

    #[test]
    fn message_names_the_student_class_pattern_and_priority() {
        let window = window_of(&[Emotion::Stressed; 3]);
        let found = detect_pattern(&window).expect("uniform stressed window");
        let message = compose_message(&sample_student(), &found);

        assert!(message.contains("Naila Putri"));
        assert!(message.contains("7A"));
        assert!(message.contains(found.bundle.label));
        assert!(message.contains("Priority: high"));
        for action in found.bundle.actions {
            assert!(message.contains(action));
        }
    }
}
