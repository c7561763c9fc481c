use std::fmt::Write;

use serde::Serialize;

use crate::alert;
use crate::models::{ClassCheckin, ClassRef, Emotion};

#[derive(Debug, Clone, Serialize)]
pub struct EmotionCount {
    pub emotion: Emotion,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub checked_in: usize,
    pub total_students: usize,
    pub checked_in_percentage: u32,
    pub positive: CategoryShare,
    pub tired: CategoryShare,
    pub needs_support: CategoryShare,
}

/// Per-emotion counts over today's check-ins, all five emotions always
/// present in declaration order.
pub fn emotion_distribution(checkins: &[ClassCheckin]) -> Vec<EmotionCount> {
    let total = checkins.len();
    Emotion::ALL
        .iter()
        .map(|&emotion| {
            let count = checkins
                .iter()
                .filter(|checkin| checkin.emotion == emotion)
                .count();
            EmotionCount {
                emotion,
                count,
                percentage: percentage(count, total),
            }
        })
        .collect()
}

/// Headline numbers for one class today. Category shares are measured
/// against the students who checked in; the check-in rate is measured
/// against the roster and capped at 100.
pub fn dashboard_summary(checkins: &[ClassCheckin], total_students: usize) -> DashboardSummary {
    if total_students == 0 {
        return DashboardSummary {
            checked_in: 0,
            total_students: 0,
            checked_in_percentage: 0,
            positive: CategoryShare {
                count: 0,
                percentage: 0,
            },
            tired: CategoryShare {
                count: 0,
                percentage: 0,
            },
            needs_support: CategoryShare {
                count: 0,
                percentage: 0,
            },
        };
    }

    let checked_in = checkins.len();
    DashboardSummary {
        checked_in,
        total_students,
        checked_in_percentage: percentage(checked_in, total_students).min(100),
        positive: category(checkins, &[Emotion::Happy, Emotion::Neutral]),
        tired: category(checkins, &[Emotion::Sleepy]),
        needs_support: category(checkins, &[Emotion::Stressed, Emotion::Normal]),
    }
}

/// Today's check-ins whose emotion is in the tracked set, in roster
/// order.
pub fn needing_attention(checkins: &[ClassCheckin]) -> Vec<&ClassCheckin> {
    checkins
        .iter()
        .filter(|checkin| alert::is_tracked(checkin.emotion))
        .collect()
}

pub fn render_class_summary(
    class: &ClassRef,
    checkins: &[ClassCheckin],
    total_students: usize,
) -> String {
    let summary = dashboard_summary(checkins, total_students);
    let distribution = emotion_distribution(checkins);
    let attention = needing_attention(checkins);

    let mut output = String::new();
    let _ = writeln!(output, "# Mood summary for class {}", class.name);
    let _ = writeln!(
        output,
        "{} of {} students checked in ({}%)",
        summary.checked_in, summary.total_students, summary.checked_in_percentage
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Emotion mix");

    if checkins.is_empty() {
        let _ = writeln!(output, "No check-ins recorded today.");
    } else {
        for entry in distribution.iter() {
            let _ = writeln!(
                output,
                "- {}: {} ({}%)",
                entry.emotion, entry.count, entry.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students needing attention");

    if attention.is_empty() {
        let _ = writeln!(output, "No students need attention today.");
    } else {
        for checkin in attention.iter() {
            match &checkin.note {
                Some(note) => {
                    let _ = writeln!(
                        output,
                        "- {} ({}) at {}: {}",
                        checkin.student_name,
                        checkin.emotion,
                        checkin.created_at.format("%H:%M"),
                        note
                    );
                }
                None => {
                    let _ = writeln!(
                        output,
                        "- {} ({}) at {}",
                        checkin.student_name,
                        checkin.emotion,
                        checkin.created_at.format("%H:%M")
                    );
                }
            }
        }
    }

    output
}

fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u32
    }
}

fn category(checkins: &[ClassCheckin], members: &[Emotion]) -> CategoryShare {
    let count = checkins
        .iter()
        .filter(|checkin| members.contains(&checkin.emotion))
        .count();
    CategoryShare {
        count,
        percentage: percentage(count, checkins.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_checkin(name: &str, emotion: Emotion) -> ClassCheckin {
        ClassCheckin {
            student_id: Uuid::new_v4(),
            student_name: name.to_string(),
            emotion,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn distribution_always_lists_all_five_emotions() {
        let checkins = vec![
            sample_checkin("a", Emotion::Happy),
            sample_checkin("b", Emotion::Happy),
            sample_checkin("c", Emotion::Stressed),
        ];

        let distribution = emotion_distribution(&checkins);
        assert_eq!(distribution.len(), 5);

        let happy = &distribution[0];
        assert_eq!(happy.emotion, Emotion::Happy);
        assert_eq!(happy.count, 2);
        assert_eq!(happy.percentage, 67);

        let stressed = distribution
            .iter()
            .find(|entry| entry.emotion == Emotion::Stressed)
            .expect("stressed entry");
        assert_eq!(stressed.count, 1);
        assert_eq!(stressed.percentage, 33);

        let sleepy = distribution
            .iter()
            .find(|entry| entry.emotion == Emotion::Sleepy)
            .expect("sleepy entry");
        assert_eq!(sleepy.count, 0);
        assert_eq!(sleepy.percentage, 0);
    }

    #[test]
    fn empty_roster_yields_an_all_zero_summary() {
        let summary = dashboard_summary(&[], 0);
        assert_eq!(summary.checked_in, 0);
        assert_eq!(summary.total_students, 0);
        assert_eq!(summary.checked_in_percentage, 0);
        assert_eq!(summary.positive.count, 0);
        assert_eq!(summary.needs_support.percentage, 0);
    }

    #[test]
    fn categories_split_over_checked_in_students() {
        let checkins = vec![
            sample_checkin("a", Emotion::Happy),
            sample_checkin("b", Emotion::Neutral),
            sample_checkin("c", Emotion::Stressed),
            sample_checkin("d", Emotion::Normal),
            sample_checkin("e", Emotion::Sleepy),
        ];

        let summary = dashboard_summary(&checkins, 10);
        assert_eq!(summary.checked_in, 5);
        assert_eq!(summary.checked_in_percentage, 50);
        assert_eq!(
            summary.positive,
            CategoryShare {
                count: 2,
                percentage: 40
            }
        );
        assert_eq!(
            summary.tired,
            CategoryShare {
                count: 1,
                percentage: 20
            }
        );
        assert_eq!(
            summary.needs_support,
            CategoryShare {
                count: 2,
                percentage: 40
            }
        );
    }

    #[test]
    fn checkin_rate_is_capped_at_one_hundred() {
        let checkins: Vec<ClassCheckin> = (0..7)
            .map(|i| sample_checkin(&format!("s{i}"), Emotion::Happy))
            .collect();
        let summary = dashboard_summary(&checkins, 5);
        assert_eq!(summary.checked_in_percentage, 100);
    }

    #[test]
    fn attention_list_keeps_only_tracked_emotions() {
        let checkins = vec![
            sample_checkin("a", Emotion::Happy),
            sample_checkin("b", Emotion::Stressed),
            sample_checkin("c", Emotion::Neutral),
            sample_checkin("d", Emotion::Sleepy),
            sample_checkin("e", Emotion::Normal),
        ];

        let attention = needing_attention(&checkins);
        let names: Vec<&str> = attention
            .iter()
            .map(|checkin| checkin.student_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "d", "e"]);
    }

    #[test]
    fn summary_text_covers_rate_mix_and_attention() {
        let class = ClassRef {
            id: Uuid::new_v4(),
            name: "7A".to_string(),
        };
        let checkins = vec![
            sample_checkin("Naila Putri", Emotion::Happy),
            sample_checkin("Raka Pratama", Emotion::Stressed),
        ];

        let text = render_class_summary(&class, &checkins, 4);
        assert!(text.contains("# Mood summary for class 7A"));
        assert!(text.contains("2 of 4 students checked in (50%)"));
        assert!(text.contains("- happy: 1 (50%)"));
        assert!(text.contains("Raka Pratama (stressed)"));
        assert!(!text.contains("Naila Putri (happy)"));
    }
}
