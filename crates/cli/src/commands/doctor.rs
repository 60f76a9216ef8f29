//! `planlens doctor`: Diagnose configuration and prompt catalogue.

use crate::runtime;
use planlens_analysis::catalog;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 PlanLens Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config = match runtime::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured (model: {})", config.backend.model);
    } else {
        println!("  ⚠️  No API key — set PLANLENS_API_KEY or GEMINI_API_KEY");
        issues += 1;
    }

    match runtime::ledger(&config).await {
        Ok(ledger) => println!("  ✅ Ledger ready ({})", ledger.name()),
        Err(e) => {
            println!("  ❌ Ledger unavailable: {e}");
            issues += 1;
        }
    }

    let store = runtime::prompt_store(&config)?;
    let keys = catalog::required_keys();
    match store.verify(config.prompts.default_scope.as_deref(), keys.iter().copied()).await {
        Ok(missing) if missing.is_empty() => {
            println!("  ✅ All {} prompt fragments present", keys.len());
        }
        Ok(missing) => {
            println!("  ❌ {} of {} prompt fragments missing:", missing.len(), keys.len());
            for key in &missing {
                println!("       - {key}");
            }
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Prompt storage error: {e}");
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
