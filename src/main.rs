use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod alert;
mod checkin;
mod db;
mod error;
mod models;
mod notify;
mod server;
mod stats;

use crate::checkin::SubmitRequest;
use crate::notify::{Notifier, NotifierConfig};

#[derive(Parser)]
#[command(name = "classpulse")]
#[command(about = "Daily classroom mood check-ins with repeated-pattern alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo roster with a ready-made alert history
    Seed,
    /// Import a class roster from a CSV file
    ImportRoster {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one student's mood for today
    Checkin {
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        emotion: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Re-run pattern detection for one student
    Evaluate {
        #[arg(long)]
        student_id: String,
    },
    /// Print today's mood summary for a class
    Dashboard {
        #[arg(long)]
        class: String,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let notifier = Notifier::new(NotifierConfig::from_env());
    if !notifier.is_configured() {
        log::warn!(
            "TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set; alerts will be classified but not delivered"
        );
    }

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportRoster { csv } => {
            let inserted = db::import_roster(&pool, &csv).await?;
            println!("Added {inserted} students from {}.", csv.display());
        }
        Commands::Checkin {
            student_id,
            emotion,
            note,
        } => {
            let request = SubmitRequest {
                student_id,
                emotion,
                note,
            };
            let record = checkin::submit(&pool, &request).await?;
            println!(
                "Check-in saved: {} at {}.",
                record.emotion,
                record.created_at.format("%Y-%m-%d %H:%M")
            );
            if alert::is_tracked(record.emotion) {
                report_evaluation(alert::evaluate(&pool, &notifier, record.student_id).await?);
            }
        }
        Commands::Evaluate { student_id } => {
            let student_id =
                Uuid::parse_str(&student_id).context("--student-id must be a UUID")?;
            report_evaluation(alert::evaluate(&pool, &notifier, student_id).await?);
        }
        Commands::Dashboard { class } => {
            let class = db::fetch_class_by_name(&pool, &class)
                .await?
                .with_context(|| format!("no class named {class}"))?;
            let checkins = db::fetch_today_class_checkins(&pool, class.id).await?;
            let total_students = db::count_students(&pool, class.id).await? as usize;
            print!(
                "{}",
                stats::render_class_summary(&class, &checkins, total_students)
            );
        }
        Commands::Serve { addr } => {
            server::serve(addr, pool, notifier).await?;
        }
    }

    Ok(())
}

fn report_evaluation(evaluation: alert::Evaluation) {
    match evaluation {
        alert::Evaluation::InsufficientHistory { available } => {
            println!("Only {available} check-ins on record; 3 are needed before patterns are evaluated.");
        }
        alert::Evaluation::NoPattern => {
            println!("No repeated pattern in the last 3 check-ins.");
        }
        alert::Evaluation::Alerted {
            event,
            student,
            sent,
        } => {
            println!(
                "Pattern for {} ({}): {}; priority {}.",
                student.student_name, student.class_name, event.label, event.priority
            );
            if let (Some(newest), Some(oldest)) = (event.window.first(), event.window.last()) {
                println!(
                    "Matching check-ins span {} to {}.",
                    oldest.created_at.format("%Y-%m-%d"),
                    newest.created_at.format("%Y-%m-%d")
                );
            }
            if sent {
                println!("Alert delivered.");
            } else {
                println!("Alert could not be delivered; see logs.");
            }
        }
    }
}
