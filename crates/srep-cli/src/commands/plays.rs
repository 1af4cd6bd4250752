//! `srep start|plays|active|find|cancel|check`: play lifecycle.

use anyhow::{Context, Result};
use tracing::info;

use srep_client::{
    CancelPlayRequest, CheckPlayRequest, Client, FindPlayRequest, GetActivePlayRequest,
    GetPlaysRequest, StartPlayRequest,
};
use srep_core::context::CallContext;
use srep_core::plays::Play;

/// Start a new play of `scenario` and print its ID.
pub async fn run_start(client: &Client, scenario: &str) -> Result<()> {
    let resp = client
        .start_play(
            &CallContext::new(),
            &StartPlayRequest {
                scenario: scenario.to_string(),
            },
        )
        .await
        .with_context(|| format!("failed to start scenario '{scenario}'"))?;
    info!(id = %resp.id, scenario, "play started");
    println!("{}", resp.id);
    Ok(())
}

/// List the caller's plays.
pub async fn run_list(client: &Client, json: bool) -> Result<()> {
    let resp = client
        .get_plays(&CallContext::new(), &GetPlaysRequest {})
        .await
        .context("failed to list plays")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resp.plays)?);
        return Ok(());
    }

    print_header();
    for play in &resp.plays {
        print_row(play);
    }
    if resp.plays.is_empty() {
        println!("(no plays)");
    }
    Ok(())
}

/// Show the play that is currently running, if any.
pub async fn run_active(client: &Client, json: bool) -> Result<()> {
    let resp = client
        .get_active_play(&CallContext::new(), &GetActivePlayRequest {})
        .await
        .context("failed to get active play")?;
    print_one(resp.play.as_ref(), json, "no active play")
}

pub async fn run_find(client: &Client, id: &str, json: bool) -> Result<()> {
    let resp = client
        .find_play(&CallContext::new(), &FindPlayRequest { id: id.to_string() })
        .await
        .with_context(|| format!("failed to find play {id}"))?;
    print_one(resp.play.as_ref(), json, "play not found")
}

pub async fn run_cancel(client: &Client, id: &str) -> Result<()> {
    client
        .cancel_play(&CallContext::new(), &CancelPlayRequest { id: id.to_string() })
        .await
        .with_context(|| format!("failed to cancel play {id}"))?;
    println!("Cancelled {id}");
    Ok(())
}

/// Ask the API whether the play's objective is met. A failed check
/// exits non-zero.
pub async fn run_check(client: &Client, id: &str) -> Result<()> {
    let resp = client
        .check_play(&CallContext::new(), &CheckPlayRequest { id: id.to_string() })
        .await
        .with_context(|| format!("failed to check play {id}"))?;
    if resp.passed {
        println!("PASSED");
        Ok(())
    } else {
        println!("NOT PASSED");
        anyhow::bail!("play {id} has not passed yet")
    }
}

fn print_one(play: Option<&Play>, json: bool, missing: &str) -> Result<()> {
    match (play, json) {
        (Some(play), true) => println!("{}", serde_json::to_string_pretty(play)?),
        (Some(play), false) => {
            print_header();
            print_row(play);
        }
        (None, true) => println!("null"),
        (None, false) => println!("({missing})"),
    }
    Ok(())
}

fn print_header() {
    println!("{:<38} {:<24} {:<10} {}", "ID", "SCENARIO", "STATUS", "CREATED");
    println!("{:<38} {:<24} {:<10} {}", "──", "────────", "──────", "───────");
}

fn print_row(play: &Play) {
    println!(
        "{:<38} {:<24} {:<10} {}",
        play.id, play.scenario, play.status, play.created_at
    );
}
