use std::ops::ControlFlow;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use usermgmt_manager::{ManagerConfig, UserManager};

/// Configuration comes from `config.{toml,yaml,json}` and `USERMGMT__*`
/// environment variables.
#[derive(Parser)]
#[command(name = "usermgmt")]
#[command(about = "List the accounts of the configured user manager, optionally filtered by user id.")]
#[command(version)]
struct Cli {
    /// Case-insensitive substring of the user id. Lists every account when omitted.
    search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = ManagerConfig::load().context("Failed to load configuration")?;
    info!("Starting with configuration: {:?}", config);

    let manager = UserManager::from_config(&config).context("Failed to build user manager")?;

    match cli.search {
        Some(pattern) => {
            let users = manager
                .search(&pattern)
                .await
                .context("Failed to search users")?;
            for user in &users {
                println!("{}\t{}", user.uid(), user.display_name());
            }
            info!("{} users matched {:?}", users.len(), pattern);
        }
        None => {
            manager
                .call_for_all_users(|user| {
                    println!(
                        "{}\t{}\t{}",
                        user.uid(),
                        user.display_name(),
                        user.email().unwrap_or("-")
                    );
                    ControlFlow::Continue(())
                })
                .await
                .context("Failed to list users")?;
            let count = manager.count_users().await.context("Failed to count users")?;
            info!("{} users", count);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_is_optional() {
        let cli = Cli::try_parse_from(["usermgmt"]).unwrap();
        assert!(cli.search.is_none());

        let cli = Cli::try_parse_from(["usermgmt", "ali"]).unwrap();
        assert_eq!(cli.search.as_deref(), Some("ali"));
    }

    #[test]
    fn test_flags_are_not_taken_as_search() {
        let help = Cli::try_parse_from(["usermgmt", "--help"]).err().unwrap();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);

        assert!(Cli::try_parse_from(["usermgmt", "--bogus"]).is_err());
    }
}
