//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::DbContext;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let database = settings.database_path();
    let ctx = DbContext::from_url(&database.display().to_string(), settings.write_buffer);
    let applied = ctx.migrate().await?;

    for name in &applied {
        println!("  {} Applied migration {}", style("✓").green(), name);
    }

    println!(
        "{} Initialized mediatrack in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  {} Database: {}", style("→").dim(), database.display());

    Ok(())
}
