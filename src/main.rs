//! Quickskills CLI - talk to the Quick AI Skills backend from a terminal

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quickskills::config::Config;
use quickskills::{
    ApiClient, FileCredentialStore, InterceptorChain, LessonStreamer, QuickSkillsApi,
    RequestConfig, SessionManager, StreamEvent, TracingBreadcrumbs,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quickskills")]
#[command(about = "Quick AI Skills API client", long_about = None)]
struct Args {
    /// Config file path (default: search quickskills.toml, /etc, ~/.config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is reachable
    Health,
    /// GET an arbitrary endpoint and print the JSON payload
    Get { endpoint: String },
    /// Log in and store the session locally
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the session and remove stored credentials
    Logout,
    /// Show the current user's profile
    Profile,
    /// Show today's lesson
    Lesson,
    /// Stream a lesson's content as it is generated
    Stream { lesson_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let cfg = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .init();

    let session = build_session(&cfg)?;
    let client = ApiClient::builder(cfg.api.clone())
        .session(session.clone())
        .interceptors(InterceptorChain::new().with_observer(Arc::new(TracingBreadcrumbs)))
        .build()
        .context("Failed to build API client")?;
    let api = QuickSkillsApi::new(client);

    match args.command {
        Command::Health => print_json(&api.health().await?),
        Command::Get { endpoint } => {
            let env = api
                .client()
                .get::<serde_json::Value>(&endpoint, RequestConfig::new())
                .await?;
            tracing::debug!("{} -> {}", endpoint, env.status);
            print_json(&env.data)
        }
        Command::Login { email, password } => {
            api.login(&email, &password).await?;
            println!("Logged in as {email}");
            Ok(())
        }
        Command::Logout => {
            if let Err(e) = api.logout().await {
                tracing::warn!("Server logout failed: {}", e);
            }
            println!("Logged out");
            Ok(())
        }
        Command::Profile => {
            let profile = api.get_user_profile().await?;
            println!(
                "{} <{}> - {} XP, {} day streak",
                profile.name.as_deref().unwrap_or("(no name)"),
                profile.email,
                profile.xp,
                profile.streak
            );
            Ok(())
        }
        Command::Lesson => {
            let lesson = api.get_daily_lesson().await?;
            println!("[{}] {}", lesson.id, lesson.title);
            print_json(&lesson.content)
        }
        Command::Stream { lesson_id } => run_stream(&cfg, session, &lesson_id).await,
    }
}

/// Credentials live in the configured file, or the platform config dir
fn build_session(cfg: &Config) -> Result<SessionManager> {
    let store = if cfg.session.credentials_file.is_empty() {
        FileCredentialStore::default_location().context("No config directory for credentials")?
    } else {
        FileCredentialStore::new(&cfg.session.credentials_file)
    };
    tracing::debug!("Using credential file: {}", store.path().display());

    Ok(SessionManager::new(Arc::new(store)).with_unauthorized_hook(Arc::new(|| {
        eprintln!("Session expired. Run `quickskills login` to sign in again.");
    })))
}

async fn run_stream(cfg: &Config, session: SessionManager, lesson_id: &str) -> Result<()> {
    let streamer = LessonStreamer::new(&cfg.api, session)?;
    let mut stream = streamer.stream_lesson(lesson_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                stream.stop();
                tracing::info!("Stream interrupted");
                return Ok(());
            }
            event = stream.next() => match event {
                Some(StreamEvent::Open) => tracing::info!("Streaming lesson {}...", lesson_id),
                Some(StreamEvent::Chunk(chunk)) => {
                    print!("{}", chunk.content);
                    let _ = std::io::stdout().flush();
                }
                Some(StreamEvent::Done) | None => {
                    println!();
                    return Ok(());
                }
                Some(StreamEvent::Error(e)) => return Err(e).context("Lesson stream failed"),
            }
        }
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
