//! Command-line orchestrator
//!
//! Collects the process inputs, logs in, prints the course report, and
//! submits completion tracking for every unfinished video lesson.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use almsbot::config::AppConfig;
use almsbot::{AlmsClient, Credentials, FileSessionStore, TrackResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("almsbot=info".parse()?),
        )
        .init();

    let mut config = AppConfig::load();
    let host = prompt_unless(config.host.clone(), "Portal host")?;
    let course_id = prompt_unless(config.course_id.clone().unwrap_or_default(), "Course id")?;
    let username = prompt_unless(config.username.clone().unwrap_or_default(), "Username")?;
    let password = prompt("Password")?;

    config.host = host.clone();
    config.course_id = Some(course_id.clone());
    config.username = Some(username.clone());
    if let Err(e) = config.save() {
        tracing::warn!("could not save config: {e}");
    }

    let sessions_dir =
        AppConfig::sessions_dir().context("could not determine a session directory")?;
    let store = Arc::new(FileSessionStore::new(sessions_dir));
    let client = AlmsClient::new(&host, Credentials::new(username.clone(), password), store)?;

    println!("Logging in as {username}...");
    client
        .login(Duration::from_secs(config.login_timeout_secs))
        .await
        .context("login failed")?;

    println!("Logged in. Fetching course progress...");
    let snapshot = client
        .progress()
        .get_class_progress(&course_id)
        .await
        .context("could not fetch course progress")?;

    let (finished, unfinished): (Vec<_>, Vec<_>) = snapshot
        .activities
        .iter()
        .filter(|a| a.is_trackable_video())
        .partition(|a| a.is_finished());

    // Tracking only registers for lessons whose pages have been opened in a
    // browser at least once.
    println!();
    println!("Finished lessons:   {}", finished.len());
    println!("Unfinished lessons: {}", unfinished.len());

    println!();
    println!("Finished:");
    for activity in &finished {
        println!(
            "    {} | {} - {}",
            activity.added_date, activity.user_name, activity.name
        );
    }

    println!();
    println!("Unfinished:");
    for activity in &unfinished {
        println!(
            "    {} | {} - {}",
            activity.added_date, activity.user_name, activity.name
        );
    }

    println!();
    println!("Completing lessons:");
    for activity in &unfinished {
        let result = client
            .progress()
            .submit_track(&activity.id, &activity.enrollment_id)
            .await
            .with_context(|| format!("could not complete {:?}", activity.name))?;
        match result {
            TrackResult::NoVideo => {
                println!("    Skipped (no video uploaded) - {}", activity.name);
            }
            TrackResult::Submitted(response) => {
                println!("    Done - {}: {}", activity.name, response);
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    println!();
    println!("All lessons processed.");
    client.dispose().await;
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Uses the remembered value when present, otherwise asks for one
fn prompt_unless(remembered: String, label: &str) -> anyhow::Result<String> {
    if remembered.is_empty() {
        prompt(label)
    } else {
        println!("{label}: {remembered}");
        Ok(remembered)
    }
}
