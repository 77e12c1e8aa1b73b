//! `parley config`: Configuration management commands.

use super::{CliResult, config_file, load_config};
use parley_config::AppConfig;
use std::path::Path;

const SECRET_KEYS: &[&str] = &["api_key", "admin_token"];

/// Replace secret values anywhere in the tree.
fn redact_secrets(value: &mut toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (key, v) in table.iter_mut() {
                if SECRET_KEYS.contains(&key.as_str()) {
                    *v = toml::Value::String("***".into());
                } else {
                    redact_secrets(v);
                }
            }
        }
        toml::Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

pub async fn show(config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let mut value = toml::Value::try_from(&config)?;
    redact_secrets(&mut value);
    println!("{}", toml::to_string_pretty(&value)?);
    Ok(())
}

pub async fn init(config_path: Option<&Path>, force: bool) -> CliResult {
    let path = config_file(config_path);

    if path.exists() && !force {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;

    println!("✅ Created config.toml at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Add your API key (or set PARLEY_API_KEY)");
    println!("   2. Run: parley ask \"客服电话是多少\"");
    println!("   3. Run: parley serve\n");
    Ok(())
}

pub async fn validate(config_path: Option<&Path>) -> CliResult {
    println!("🔍 Validating configuration...");

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set PARLEY_API_KEY, DEEPSEEK_API_KEY or OPENAI_API_KEY)");
    }
    if config.gateway.host == "0.0.0.0" && config.gateway.admin_token.is_none() {
        warnings.push("Gateway bound to 0.0.0.0 with no admin_token; rule admin is open");
    }
    if config.pipeline.drawing_keywords.is_empty() {
        warnings.push("No drawing keywords; image generation is never triggered");
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Provider:  {}", config.default_provider);
    println!("   Model:     {}", config.default_model);
    println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {}", config.store.backend);
    println!("   Knowledge: {} (top {})", config.knowledge.backend, config.knowledge.top_k);
    println!(
        "   Pipeline:  window {}, timeouts {}s / {}s",
        config.pipeline.history_window,
        config.pipeline.inference_timeout_secs,
        config.pipeline.retrieval_timeout_secs
    );

    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> CliResult {
    println!("{}", config_file(config_path).display());
    Ok(())
}
