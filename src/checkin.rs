use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::SubmitError;
use crate::models::{CheckinRecord, Emotion, NewCheckin};

pub const MAX_NOTE_CHARS: usize = 100;

/// The submission contract as it arrives at the boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub student_id: String,
    pub emotion: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Validate a raw submission. Checks run in a fixed order: student id,
/// then emotion membership, then note length.
pub fn validate(
    student_id: &str,
    emotion: &str,
    note: Option<&str>,
) -> Result<NewCheckin, SubmitError> {
    if student_id.is_empty() {
        return Err(SubmitError::InvalidInput);
    }
    let student_id = Uuid::parse_str(student_id).map_err(|_| SubmitError::InvalidInput)?;

    let emotion = Emotion::parse(emotion).ok_or(SubmitError::InvalidEmotion)?;

    let note = normalize_note(note)?;

    Ok(NewCheckin {
        student_id,
        emotion,
        note,
    })
}

/// Trim the note and enforce the length cap. A note that trims to
/// nothing is treated as absent.
pub fn normalize_note(note: Option<&str>) -> Result<Option<String>, SubmitError> {
    let Some(raw) = note else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTE_CHARS {
        return Err(SubmitError::NoteTooLong);
    }
    Ok(Some(trimmed.to_string()))
}

/// Accept one check-in for today. The same-day pre-check keeps the
/// common duplicate path cheap; the unique constraint behind
/// `db::insert_checkin` closes the race between concurrent submissions.
pub async fn submit(pool: &PgPool, request: &SubmitRequest) -> Result<CheckinRecord, SubmitError> {
    let new = validate(&request.student_id, &request.emotion, request.note.as_deref())?;

    if db::has_checkin_today(pool, new.student_id).await? {
        return Err(SubmitError::AlreadyCheckedInToday);
    }

    db::insert_checkin(pool, &new).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDENT: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";

    #[test]
    fn accepts_every_emotion_value() {
        for emotion in Emotion::ALL {
            let checked = validate(STUDENT, emotion.as_str(), None);
            assert!(checked.is_ok(), "{emotion} should validate");
            assert_eq!(checked.ok().map(|c| c.emotion), Some(emotion));
        }
    }

    #[test]
    fn rejects_unknown_emotions() {
        for raw in ["angry", "", "null", "happy sad"] {
            assert!(matches!(
                validate(STUDENT, raw, None),
                Err(SubmitError::InvalidEmotion)
            ));
        }
    }

    #[test]
    fn emotion_matching_is_case_sensitive_and_untrimmed() {
        for raw in ["Happy", "HAPPY", " happy", "happy ", "Stressed", "sleepy\n"] {
            assert!(matches!(
                validate(STUDENT, raw, None),
                Err(SubmitError::InvalidEmotion)
            ));
        }
    }

    #[test]
    fn rejects_missing_or_malformed_student_id() {
        for raw in ["", "not-a-uuid", "12345"] {
            assert!(matches!(
                validate(raw, "happy", None),
                Err(SubmitError::InvalidInput)
            ));
        }
    }

    #[test]
    fn student_id_is_checked_before_emotion() {
        assert!(matches!(
            validate("", "angry", None),
            Err(SubmitError::InvalidInput)
        ));
    }

    #[test]
    fn note_boundary_sits_at_one_hundred_characters() {
        let exactly = "a".repeat(MAX_NOTE_CHARS);
        let over = "a".repeat(MAX_NOTE_CHARS + 1);

        assert_eq!(
            normalize_note(Some(&exactly)).ok().flatten(),
            Some(exactly.clone())
        );
        assert!(matches!(
            normalize_note(Some(&over)),
            Err(SubmitError::NoteTooLong)
        ));
    }

    #[test]
    fn note_length_counts_characters_not_bytes() {
        let exactly = "é".repeat(MAX_NOTE_CHARS);
        let over = "é".repeat(MAX_NOTE_CHARS + 1);

        assert!(normalize_note(Some(&exactly)).is_ok());
        assert!(matches!(
            normalize_note(Some(&over)),
            Err(SubmitError::NoteTooLong)
        ));
    }

    #[test]
    fn note_is_trimmed_before_the_length_check() {
        let padded = format!("   {}   ", "a".repeat(MAX_NOTE_CHARS));
        assert_eq!(
            normalize_note(Some(&padded)).ok().flatten(),
            Some("a".repeat(MAX_NOTE_CHARS))
        );
    }

    #[test]
    fn blank_notes_are_stored_as_absent() {
        assert_eq!(normalize_note(None).ok().flatten(), None);
        assert_eq!(normalize_note(Some("")).ok().flatten(), None);
        assert_eq!(normalize_note(Some("   \t ")).ok().flatten(), None);
    }
}
