mod activity;
mod anthropic;
mod cli;
mod config;
mod error;
mod planner;
mod session;
mod summary;
mod timeline;
mod ui;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::warn;

use activity::{Activity, color_for_index};
use anthropic::AnthropicClient;
use cli::{Cli, Command};
use config::TimelyConfig;
use error::TimelyError;
use planner::ActivityPlanner;
use session::{JsonFileStore, PersistedSession, Session, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose only changes the default.
    let default_filter = if cli.verbose { "mr_timely=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = TimelyConfig::load()?;
    if let Some(path) = cli.session {
        config.session_path = path;
    }
    let store = JsonFileStore::new(config.session_path.clone());
    let now = Utc::now();

    match cli.command {
        Command::Setup { duration } => {
            let duration = duration.unwrap_or_else(|| config.default_duration());
            save(&store, Session::new(duration, now), now)?;
            ui::print_ok(&format!(
                "New session of {}",
                ui::format_clock(duration.num_seconds())
            ));
        }
        Command::Add {
            name,
            id,
            description,
        } => {
            let mut session = load_session(&store, &config, now)?;
            let added = match id {
                Some(id) => {
                    let activity = Activity {
                        id,
                        name: name.trim().to_string(),
                        description,
                        colors: color_for_index(session.machine().len()),
                        created_at: now,
                    };
                    session.insert_activity(activity)?.id.clone()
                }
                None => session.add_activity(&name, description, now)?.id.clone(),
            };
            save(&store, session, now)?;
            ui::print_ok(&format!("Added {added}"));
        }
        Command::Start { id } => {
            let mut session = load_session(&store, &config, now)?;
            session.start(&id, now)?;
            save(&store, session, now)?;
            ui::print_ok(&format!("Started {id}"));
        }
        Command::Switch { id } => {
            let mut session = load_session(&store, &config, now)?;
            session.switch_to(&id, now)?;
            save(&store, session, now)?;
            ui::print_ok(&format!("Switched to {id}"));
        }
        Command::Complete { id } => {
            let mut session = load_session(&store, &config, now)?;
            let completed = match id {
                Some(id) => {
                    session.complete(&id, now)?;
                    Some(id)
                }
                None => session.complete_current(now)?,
            };
            let done = session.is_completed();
            save(&store, session, now)?;
            match completed {
                Some(id) => ui::print_ok(&format!("Completed {id}")),
                None => println!("  Nothing is running."),
            }
            if done {
                ui::print_ok("All activities done. Run `mr-timely summary`.");
            }
        }
        Command::Remove { id } => {
            let mut session = load_session(&store, &config, now)?;
            session.remove(&id, now)?;
            save(&store, session, now)?;
            ui::print_ok(&format!("Removed {id}"));
        }
        Command::Status => {
            let session = load_session(&store, &config, now)?;
            ui::print_status(&session, now);
        }
        Command::Summary { json } => {
            let session = load_session(&store, &config, now)?;
            let summary = session.summary(now);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                ui::print_summary(&summary);
            }
        }
        Command::Plan { prompt } => {
            let mut session = load_session(&store, &config, now)?;
            if session.machine().has_started_any() {
                return Err(TimelyError::SessionInProgress.into());
            }

            let progress = ui::PlanProgress::start(&prompt);
            let plan = if config.api_key.is_empty() {
                ActivityPlanner::plan::<AnthropicClient>(
                    None,
                    &config.planner_model,
                    &prompt,
                    config.max_planned_activities,
                )
                .await
            } else {
                let client = AnthropicClient::new(config.api_key.clone())?;
                ActivityPlanner::plan(
                    Some(&client),
                    &config.planner_model,
                    &prompt,
                    config.max_planned_activities,
                )
                .await
            };
            progress.finish(&plan);

            session.apply_plan(&plan, now)?;
            save(&store, session, now)?;
        }
        Command::Reset => {
            store.clear()?;
            ui::print_ok("Session discarded");
        }
    }

    Ok(())
}

/// Loads the saved session, discarding it when it is too old to resume.
fn load_session(
    store: &impl SessionStore,
    config: &TimelyConfig,
    now: DateTime<Utc>,
) -> Result<Session, TimelyError> {
    let Some(persisted) = store.load()? else {
        return Err(TimelyError::NoSession);
    };
    if !persisted.is_recoverable(now, config.max_session_age()) {
        warn!(last_saved = %persisted.last_saved, "saved session is too old, discarding it");
        store.clear()?;
        return Err(TimelyError::NoSession);
    }
    Ok(persisted.session)
}

fn save(store: &impl SessionStore, session: Session, now: DateTime<Utc>) -> Result<(), TimelyError> {
    store.save(&PersistedSession::new(session, now))
}
