//! `srep scenarios [name]`: browse the scenario catalog.

use anyhow::{Context, Result};

use srep_client::{Client, FindScenarioRequest, GetScenariosRequest};
use srep_core::context::CallContext;
use srep_core::scenarios::Scenario;

pub async fn run(client: &Client, name: Option<&str>, json: bool) -> Result<()> {
    let ctx = CallContext::new();
    match name {
        None => {
            let resp = client
                .get_scenarios(&ctx, &GetScenariosRequest {})
                .await
                .context("failed to list scenarios")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resp.scenarios)?);
                return Ok(());
            }
            println!("{:<24} {:<12} {:<10} {}", "NAME", "DIFFICULTY", "VERSION", "DESCRIPTION");
            println!("{:<24} {:<12} {:<10} {}", "────", "──────────", "───────", "───────────");
            for scenario in &resp.scenarios {
                println!(
                    "{:<24} {:<12} {:<10} {}",
                    scenario.name, scenario.difficulty, scenario.version, scenario.description
                );
            }
            if resp.scenarios.is_empty() {
                println!("(no scenarios)");
            }
        }
        Some(name) => {
            let resp = client
                .find_scenario(
                    &ctx,
                    &FindScenarioRequest {
                        scenario: name.to_string(),
                    },
                )
                .await
                .with_context(|| format!("failed to find scenario '{name}'"))?;
            match (resp.scenario, json) {
                (Some(scenario), true) => println!("{}", serde_json::to_string_pretty(&scenario)?),
                (Some(scenario), false) => describe(&scenario),
                (None, true) => println!("null"),
                (None, false) => println!("(scenario not found)"),
            }
        }
    }
    Ok(())
}

fn describe(scenario: &Scenario) {
    println!("Name:        {}", scenario.name);
    println!("Version:     {}", scenario.version);
    println!("Difficulty:  {}", scenario.difficulty);
    if !scenario.tags.is_empty() {
        println!("Tags:        {}", scenario.tags.join(", "));
    }
    if scenario.privileged {
        println!("Privileged:  yes");
    }
    for port in &scenario.ports {
        println!("Port:        {} -> {}", port.host, port.container);
    }
    println!();
    println!("{}", scenario.description);
}
