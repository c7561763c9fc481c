use anyhow::Context;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::SubmitError;
use crate::models::{CheckinRecord, ClassCheckin, ClassRef, Emotion, NewCheckin, StudentContext};

/// Constraint names from migrations/0001_init.sql; insert_checkin maps
/// violations of these to domain errors.
const DAILY_UNIQUE_CONSTRAINT: &str = "one_checkin_per_day";
const STUDENT_FK_CONSTRAINT: &str = "checkins_student_fk";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let classes = vec![
        (Uuid::parse_str("b1a4c7de-61f2-4f3a-9a58-0c29f6f3b1e4")?, "7A"),
        (Uuid::parse_str("5e9f2c10-8d4b-49d7-bb6a-2a1d9c0e7f33")?, "7B"),
    ];

    let mut class_ids = Vec::new();
    for (id, name) in classes {
        let class_id: Uuid = sqlx::query(
            r#"
            INSERT INTO classpulse.classes (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(pool)
        .await?
        .get("id");
        class_ids.push(class_id);
    }

    let students = vec![
        ("Naila Putri", class_ids[0]),
        ("Raka Pratama", class_ids[0]),
        ("Sinta Dewi", class_ids[0]),
        ("Alvin Chandra", class_ids[1]),
        ("Maya Lestari", class_ids[1]),
        ("Dimas Saputra", class_ids[1]),
    ];

    let mut raka_id = None;
    for (name, class_id) in students {
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO classpulse.students (id, name, class_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (class_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(class_id)
        .fetch_one(pool)
        .await?
        .get("id");

        if name == "Raka Pratama" {
            raka_id = Some(student_id);
        }
    }

    // Three consecutive stressed days for one student, so an `evaluate`
    // run against fresh seed data exercises the alert path.
    let raka_id = raka_id.context("seed student missing")?;
    for days_ago in 1..=3i64 {
        sqlx::query(
            r#"
            INSERT INTO classpulse.checkins
            (id, student_id, emotion, note, created_at, checkin_day)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, checkin_day) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(raka_id)
        .bind("stressed")
        .bind("seeded history")
        .bind(Utc::now() - Duration::days(days_ago))
        .bind(Utc::now().date_naive() - Duration::days(days_ago))
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Import a class roster from CSV. Classes are upserted by name; students
/// already on a roster are left untouched. Returns how many students were
/// inserted.
pub async fn import_roster(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        class_name: String,
        student_name: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let class_id: Uuid = sqlx::query(
            r#"
            INSERT INTO classpulse.classes (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.class_name)
        .fetch_one(pool)
        .await?
        .get("id");

        let result = sqlx::query(
            r#"
            INSERT INTO classpulse.students (id, name, class_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (class_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.student_name)
        .bind(class_id)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn has_checkin_today(pool: &PgPool, student_id: Uuid) -> anyhow::Result<bool> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM classpulse.checkins
            WHERE student_id = $1 AND checkin_day = CURRENT_DATE
        ) AS present
        "#,
    )
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("present"))
}

/// Insert a validated check-in. The database assigns the timestamp and
/// the calendar day; violations of the per-day and student constraints
/// come back as domain errors rather than raw storage failures.
pub async fn insert_checkin(pool: &PgPool, new: &NewCheckin) -> Result<CheckinRecord, SubmitError> {
    let id = Uuid::new_v4();
    let row = sqlx::query(
        r#"
        INSERT INTO classpulse.checkins (id, student_id, emotion, note)
        VALUES ($1, $2, $3, $4)
        RETURNING created_at
        "#,
    )
    .bind(id)
    .bind(new.student_id)
    .bind(new.emotion.as_str())
    .bind(&new.note)
    .fetch_one(pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db) if db.constraint() == Some(DAILY_UNIQUE_CONSTRAINT) => {
            SubmitError::AlreadyCheckedInToday
        }
        sqlx::Error::Database(db) if db.constraint() == Some(STUDENT_FK_CONSTRAINT) => {
            SubmitError::StudentNotFound
        }
        other => SubmitError::Persistence(anyhow::Error::from(other)),
    })?;

    Ok(CheckinRecord {
        id,
        student_id: new.student_id,
        emotion: new.emotion,
        note: new.note.clone(),
        created_at: row.get("created_at"),
    })
}

pub async fn fetch_recent_checkins(
    pool: &PgPool,
    student_id: Uuid,
    limit: usize,
) -> anyhow::Result<Vec<CheckinRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, emotion, note, created_at
        FROM classpulse.checkins
        WHERE student_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(student_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut checkins = Vec::new();
    for row in rows {
        checkins.push(checkin_from_row(&row)?);
    }

    Ok(checkins)
}

pub async fn fetch_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Option<StudentContext>> {
    let row = sqlx::query(
        r#"
        SELECT st.name AS student_name, cl.name AS class_name
        FROM classpulse.students st
        JOIN classpulse.classes cl ON cl.id = st.class_id
        WHERE st.id = $1
        "#,
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| StudentContext {
        student_name: row.get("student_name"),
        class_name: row.get("class_name"),
    }))
}

pub async fn fetch_class(pool: &PgPool, class_id: Uuid) -> anyhow::Result<Option<ClassRef>> {
    let row = sqlx::query("SELECT id, name FROM classpulse.classes WHERE id = $1")
        .bind(class_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| ClassRef {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

pub async fn fetch_class_by_name(pool: &PgPool, name: &str) -> anyhow::Result<Option<ClassRef>> {
    let row = sqlx::query("SELECT id, name FROM classpulse.classes WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| ClassRef {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

pub async fn count_students(pool: &PgPool, class_id: Uuid) -> anyhow::Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM classpulse.students WHERE class_id = $1")
        .bind(class_id)
        .fetch_one(pool)
        .await?;

    Ok(row.get("total"))
}

pub async fn fetch_today_class_checkins(
    pool: &PgPool,
    class_id: Uuid,
) -> anyhow::Result<Vec<ClassCheckin>> {
    let rows = sqlx::query(
        r#"
        SELECT c.student_id, st.name AS student_name, c.emotion, c.note, c.created_at
        FROM classpulse.checkins c
        JOIN classpulse.students st ON st.id = c.student_id
        WHERE st.class_id = $1 AND c.checkin_day = CURRENT_DATE
        ORDER BY st.name
        "#,
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    let mut checkins = Vec::new();
    for row in rows {
        let raw: String = row.get("emotion");
        let emotion = parse_stored_emotion(&raw)?;
        checkins.push(ClassCheckin {
            student_id: row.get("student_id"),
            student_name: row.get("student_name"),
            emotion,
            note: row.get("note"),
            created_at: row.get("created_at"),
        });
    }

    Ok(checkins)
}

fn checkin_from_row(row: &PgRow) -> anyhow::Result<CheckinRecord> {
    let raw: String = row.get("emotion");
    let emotion = parse_stored_emotion(&raw)?;
    Ok(CheckinRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        emotion,
        note: row.get("note"),
        created_at: row.get("created_at"),
    })
}

fn parse_stored_emotion(raw: &str) -> anyhow::Result<Emotion> {
    Emotion::parse(raw).with_context(|| format!("unrecognized emotion '{raw}' in storage"))
}
