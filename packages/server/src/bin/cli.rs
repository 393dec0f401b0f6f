//! Operator CLI (§6): `migrate {up|down|status}`, `seed`, `cleanup`.
//! Grounded on the teacher's `Config::from_env` startup pattern, wired to
//! `clap` the way the teacher's `dev-cli` package structures its
//! subcommands.

use aeon_core::config::Config;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "aeon-cli")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    Seed,
    Cleanup,
}

#[derive(Subcommand)]
enum MigrateAction {
    Up,
    Down,
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&config.database_url).await?;

    let result = match cli.command {
        Command::Migrate { action } => run_migrate(&pool, action).await,
        Command::Seed => run_seed(&pool).await,
        Command::Cleanup => run_cleanup(&pool).await,
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_migrate(pool: &sqlx::PgPool, action: MigrateAction) -> anyhow::Result<()> {
    let migrator = sqlx::migrate!("./migrations");
    match action {
        MigrateAction::Up => {
            migrator.run(pool).await?;
            println!("migrations applied");
        }
        MigrateAction::Down => {
            anyhow::bail!("down migrations are not supported; restore from backup instead");
        }
        MigrateAction::Status => {
            let applied = sqlx::query("SELECT version FROM _sqlx_migrations ORDER BY version")
                .fetch_all(pool)
                .await?;
            println!("{} migrations applied", applied.len());
        }
    }
    Ok(())
}

/// Inserts a minimal demo broadcast (one DJ, one format clock, one
/// program, one always-on schedule entry) so a fresh environment has
/// something for the Scheduler to materialize.
async fn run_seed(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let dj_id = uuid::Uuid::new_v4();
    sqlx::query(
        "INSERT INTO djs (id, voice_ref, language, personality_traits, bio, created_at) VALUES ($1, 'voice-demo-1', 'en', ARRAY['warm','curious'], 'A steady overnight host.', NOW())",
    )
    .bind(dj_id)
    .execute(pool)
    .await?;

    let clock_id = uuid::Uuid::new_v4();
    sqlx::query("INSERT INTO format_clocks (id, name, created_at) VALUES ($1, 'standard-hour', NOW())")
        .bind(clock_id)
        .execute(pool)
        .await?;
    sqlx::query(
        "INSERT INTO format_slots (id, format_clock_id, slot_type, duration_sec, order_index, required) VALUES ($1, $2, 'news', 1800, 0, true), ($3, $2, 'music_break', 1800, 1, true)",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(clock_id)
    .bind(uuid::Uuid::new_v4())
    .execute(pool)
    .await?;

    let program_id = uuid::Uuid::new_v4();
    sqlx::query(
        "INSERT INTO programs (id, format_clock_id, dj_ids, conversation_format, genre, description, active, created_at) VALUES ($1, $2, $3, NULL, 'news', 'A rolling digest of the colony and its neighbors.', true, NOW())",
    )
    .bind(program_id)
    .bind(clock_id)
    .bind(vec![dj_id])
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO broadcast_schedule (id, program_id, day_of_week, start_time, end_time, priority, active, created_at) VALUES ($1, $2, NULL, '00:00:00', '23:59:59', 5, true, NOW())",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(program_id)
    .execute(pool)
    .await?;

    println!("seeded demo program {program_id}");
    Ok(())
}

/// Purges segments, jobs, DLQ, and health checks; retains configuration
/// (programs, DJs, format clocks, schedules) per §6.
async fn run_cleanup(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM dead_letter_queue").execute(pool).await?;
    sqlx::query("DELETE FROM jobs").execute(pool).await?;
    sqlx::query("DELETE FROM segments").execute(pool).await?;
    sqlx::query("DELETE FROM health_checks").execute(pool).await?;
    println!("cleanup complete");
    Ok(())
}
