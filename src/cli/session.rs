//! CLI handler for session commands.
//!
//! All commands communicate with the running service via its HTTP API.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::cli::args::{SessionCliArgs, SessionCommand};

const BASE_URL: &str = "http://127.0.0.1:3939";

pub async fn handle_session_command(args: SessionCliArgs) -> Result<()> {
    match args.command {
        SessionCommand::Join { id, name } => join_session(&id, name.as_deref()).await,
        SessionCommand::Leave { id } => leave_session(&id).await,
        SessionCommand::Status { id } => show_status(&id).await,
        SessionCommand::List => list_sessions().await,
    }
}

async fn join_session(id: &str, name: Option<&str>) -> Result<()> {
    let client = reqwest::Client::new();
    let mut body = serde_json::Map::new();
    if let Some(n) = name {
        body.insert("name".to_string(), Value::String(n.to_string()));
    }

    let response = client
        .post(format!("{}/sessions/{}/join", BASE_URL, id))
        .json(&body)
        .send()
        .await
        .context("Failed to connect to Huddle service. Is it running?")?;

    let status = response.status();
    let json: Value = response.json().await?;

    if !status.is_success() {
        bail!(
            "Failed to join meeting: {}",
            json.get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
        );
    }

    println!(
        "Joined meeting {} (phase: {})",
        id,
        json.get("phase").and_then(|v| v.as_str()).unwrap_or("?")
    );

    Ok(())
}

async fn leave_session(id: &str) -> Result<()> {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/sessions/{}/leave", BASE_URL, id))
        .send()
        .await
        .context("Failed to connect to Huddle service. Is it running?")?;

    let status = response.status();
    let json: Value = response.json().await?;

    if !status.is_success() {
        bail!(
            "Failed to leave meeting: {}",
            json.get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
        );
    }

    println!("Left meeting {}", id);

    Ok(())
}

async fn show_status(id: &str) -> Result<()> {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/sessions/{}", BASE_URL, id))
        .send()
        .await
        .context("Failed to connect to Huddle service. Is it running?")?;

    let status = response.status();
    let json: Value = response.json().await?;

    if !status.is_success() {
        bail!(
            "Failed to get session: {}",
            json.get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
        );
    }

    print_session(&json);

    Ok(())
}

async fn list_sessions() -> Result<()> {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/sessions", BASE_URL))
        .send()
        .await
        .context("Failed to connect to Huddle service. Is it running?")?;

    let json: Value = response.json().await?;
    let sessions = json
        .get("sessions")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    if sessions.is_empty() {
        println!("No live sessions.");
        return Ok(());
    }

    for session in &sessions {
        print_session(session);
    }

    Ok(())
}

fn print_session(session: &Value) {
    let id = session
        .get("meeting_id")
        .and_then(|v| v.as_str())
        .unwrap_or("?");
    let name = session
        .get("meeting_name")
        .and_then(|v| v.as_str())
        .unwrap_or("?");
    let phase = session.get("phase").and_then(|v| v.as_str()).unwrap_or("?");
    let dispatch = session
        .get("dispatch_status")
        .and_then(|v| v.as_str())
        .unwrap_or("?");

    println!("{} ({}): {}, agent: {}", id, name, phase, dispatch);

    if let Some(error) = session.get("last_error").and_then(|v| v.as_str()) {
        println!("  last error: {}", error);
    }
}
