//! `parley rules`: Canned-answer rule management.
//!
//! By default every command talks to the running gateway's admin API, so
//! edits land in its live rule cache immediately. `--offline` writes to the
//! configured store directly and then asks the gateway, if one is up, to
//! reload.

use super::{CliResult, load_config};
use crate::gateway_client::{ClientError, GatewayClient};
use parley_core::rule::{NewRule, Rule, RuleUpdate};
use parley_rules::{ReloadReport, ReloadStatus, RuleAdmin, RuleCache, RuleHit, RuleMatcher, RuleMutation};
use std::path::Path;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where rule commands are applied.
#[derive(Debug, Clone, Default)]
pub struct Target {
    /// Gateway base URL; the configured listen address when unset
    pub gateway: Option<String>,
    pub offline: bool,
}

enum Backend {
    Gateway(GatewayClient),
    Offline { admin: RuleAdmin, gateway: GatewayClient },
}

async fn connect(config_path: Option<&Path>, target: &Target) -> Result<Backend, BoxError> {
    let config = load_config(config_path)?;
    let client = GatewayClient::from_config(&config, target.gateway.as_deref());
    if !target.offline {
        return Ok(Backend::Gateway(client));
    }

    if config.store.backend == "memory" {
        eprintln!("  ⚠️  store.backend is 'memory'; changes are lost when this command exits");
    }
    let (rules, _) = parley_gateway::open_stores(&config).await?;
    if config.rules.seed_defaults {
        parley_rules::seed_if_empty(rules.as_ref()).await?;
    }
    Ok(Backend::Offline {
        admin: RuleAdmin::new(rules, Arc::new(RuleCache::new())),
        gateway: client,
    })
}

fn gateway_error(e: ClientError) -> BoxError {
    if e.is_unreachable() {
        format!("{e}\n   Start it with `parley serve`, or pass --offline to edit the store directly").into()
    } else {
        e.into()
    }
}

/// Ask a running gateway to pick up a change written straight to the store.
async fn notify_gateway(client: &GatewayClient) -> Option<ReloadReport> {
    match client.reload().await {
        Ok(report) => {
            println!(
                "  🔄 Gateway at {} reloaded (generation {})",
                client.base_url(),
                report.generation
            );
            Some(report)
        }
        Err(e) if e.is_unreachable() => {
            println!("  ℹ️  No gateway at {}; it loads the change on start", client.base_url());
            None
        }
        Err(e) => {
            eprintln!("  ⚠️  Saved, but the running gateway was not reloaded: {e}");
            None
        }
    }
}

async fn list_rules(backend: &Backend) -> Result<Vec<Rule>, BoxError> {
    match backend {
        Backend::Gateway(client) => client.list().await.map_err(gateway_error),
        Backend::Offline { admin, .. } => Ok(admin.list().await?),
    }
}

async fn create_rule(backend: &Backend, rule: NewRule) -> Result<RuleMutation<Rule>, BoxError> {
    match backend {
        Backend::Gateway(client) => client.create(&rule).await.map_err(gateway_error),
        Backend::Offline { admin, gateway } => {
            let mutation = admin.create(rule).await?;
            notify_gateway(gateway).await;
            Ok(mutation)
        }
    }
}

async fn update_rule(backend: &Backend, id: i64, update: RuleUpdate) -> Result<RuleMutation<Rule>, BoxError> {
    match backend {
        Backend::Gateway(client) => client.update(id, &update).await.map_err(gateway_error),
        Backend::Offline { admin, gateway } => {
            let mutation = admin.update(id, update).await?;
            notify_gateway(gateway).await;
            Ok(mutation)
        }
    }
}

async fn delete_rule(backend: &Backend, id: i64) -> Result<RuleMutation<i64>, BoxError> {
    match backend {
        Backend::Gateway(client) => client.delete(id).await.map_err(gateway_error),
        Backend::Offline { admin, gateway } => {
            let mutation = admin.delete(id).await?;
            notify_gateway(gateway).await;
            Ok(mutation)
        }
    }
}

async fn test_rules(backend: &Backend, text: &str) -> Result<Option<RuleHit>, BoxError> {
    match backend {
        Backend::Gateway(client) => client.test(text).await.map_err(gateway_error),
        Backend::Offline { admin, .. } => {
            let report = admin.reload().await?;
            if !report.skipped.is_empty() {
                eprintln!("  ⚠️  Skipped rules with invalid patterns: {:?}", report.skipped);
            }
            Ok(RuleMatcher::new(admin.cache().clone()).check(text))
        }
    }
}

fn print_rule(rule: &Rule) {
    let status = if rule.active { "✅" } else { "⏸️ " };
    println!("  {status} #{:<3} {}", rule.id, rule.patterns.join(" | "));
    let answer: String = rule.answer.chars().take(60).collect();
    println!("        → {answer}");
    if !rule.source.is_empty() {
        println!("        source: {}", rule.source);
    }
}

/// Only meaningful for gateway mutations; an offline cache is discarded.
fn print_reload(backend: &Backend, reload: &ReloadStatus) {
    if !matches!(backend, Backend::Gateway(_)) {
        return;
    }
    if let ReloadStatus::Failed { error } = reload {
        eprintln!("  ⚠️  Saved, but the gateway could not reload its rule cache: {error}");
    }
}

pub async fn list(config_path: Option<&Path>, target: &Target) -> CliResult {
    let backend = connect(config_path, target).await?;
    let rules = list_rules(&backend).await?;

    println!("📋 Rules ({})", rules.len());
    println!("==========");
    if rules.is_empty() {
        println!("   No rules. Add one with `parley rules add`.");
    }
    for rule in &rules {
        print_rule(rule);
    }
    Ok(())
}

pub async fn add(
    config_path: Option<&Path>,
    target: &Target,
    patterns: Vec<String>,
    answer: String,
    source: String,
) -> CliResult {
    let backend = connect(config_path, target).await?;
    let mutation = create_rule(&backend, NewRule::new(patterns, answer, source)).await?;
    println!("✅ Created rule #{}", mutation.item.id);
    print_rule(&mutation.item);
    print_reload(&backend, &mutation.reload);
    Ok(())
}

pub async fn remove(config_path: Option<&Path>, target: &Target, id: i64) -> CliResult {
    let backend = connect(config_path, target).await?;
    let mutation = delete_rule(&backend, id).await?;
    println!("🗑️  Deleted rule #{}", mutation.item);
    print_reload(&backend, &mutation.reload);
    Ok(())
}

pub async fn set_active(config_path: Option<&Path>, target: &Target, id: i64, active: bool) -> CliResult {
    let backend = connect(config_path, target).await?;
    let mutation = update_rule(&backend, id, RuleUpdate::activate(active)).await?;
    let verb = if active { "Enabled" } else { "Disabled" };
    println!("✅ {verb} rule #{}", mutation.item.id);
    print_reload(&backend, &mutation.reload);
    Ok(())
}

pub async fn test(config_path: Option<&Path>, target: &Target, text: &str) -> CliResult {
    let backend = connect(config_path, target).await?;
    match test_rules(&backend, text).await? {
        Some(hit) => {
            println!("🎯 Rule #{} answers:", hit.rule_id);
            println!("   {}", hit.answer);
            if !hit.source.is_empty() {
                println!("   source: {}", hit.source);
            }
        }
        None => println!("   No rule matches; the message would go to retrieval and the model."),
    }
    Ok(())
}
