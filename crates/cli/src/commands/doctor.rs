//! `parley doctor`: Diagnose system health.

use super::{CliResult, config_file, load_config};
use parley_core::store::RuleStore;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> CliResult {
    println!("🩺 Parley Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let path = config_file(config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file — run `parley config init` (defaults in use)");
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key configured — set PARLEY_API_KEY or add api_key to config.toml");
        issues += 1;
    }

    match parley_gateway::open_stores(&config).await {
        Ok((rules, _)) => match rules.list_rules().await {
            Ok(list) => {
                let active = list.iter().filter(|r| r.active).count();
                println!("  ✅ Store reachable ({}): {} rules, {active} active", config.store.backend, list.len());
            }
            Err(e) => {
                println!("  ❌ Store query failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Store unavailable: {e}");
            issues += 1;
        }
    }

    let router = parley_providers::build_from_config(&config);
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ⚠️  Provider '{}' responded but reported unhealthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ No default provider configured");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
