//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::KnowledgeDb;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub force: bool,
}

/// Initialize concierge configuration and database
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::AlreadyInitialized(
            config.paths.base_dir.display().to_string(),
        ));
    }

    config.validate()?;
    config.save()?;

    let db = KnowledgeDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}

/// Print init result to console
pub fn print_init(config: &Config) {
    println!("✓ Initialized concierge at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("\nNext steps:");
    println!("  concierge keywords seed                        # Seed routing keywords");
    println!("  concierge backfill records.jsonl               # Chunk existing records");
    println!("  concierge retrieve \"question\" --tenant shop-1  # Try a retrieval");
}
