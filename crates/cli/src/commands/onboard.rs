//! `planlens onboard`: First-time setup.

use planlens_analysis::catalog;
use planlens_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let config_path = config_path.unwrap_or(&default_path);

    println!("📐 PlanLens — First-Time Setup");
    println!("==============================\n");

    if let Some(dir) = config_path.parent() {
        if dir.exists() {
            println!("  Config directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load_from(config_path)?;
    let prompts_dir = &config.prompts.dir;
    if !prompts_dir.exists() {
        std::fs::create_dir_all(prompts_dir)?;
        println!("✅ Created prompt directory: {}", prompts_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Export PLANLENS_API_KEY (or GEMINI_API_KEY)");
    println!("   2. Put the prompt fragments in {}:", prompts_dir.display());
    for key in catalog::required_keys() {
        println!("        {key}");
    }
    println!("   3. Run: planlens doctor\n");

    Ok(())
}
