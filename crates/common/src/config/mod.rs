mod account_storage_config;
mod backend_config;

pub use account_storage_config::AccountStorageConfig;
pub use backend_config::BackendConfig;

use config::ConfigError;

/// A state file may not exist yet, but the directory it goes in must.
fn validate_state_file(state_file: &str, label: &str) -> Result<(), ConfigError> {
    if state_file.is_empty() {
        return Err(ConfigError::Message(format!(
            "{label} state_file cannot be empty"
        )));
    }

    let parent = std::path::Path::new(state_file).parent().ok_or_else(|| {
        ConfigError::Message(format!(
            "{label} state_file must have a valid parent directory"
        ))
    })?;
    // A bare file name has an empty parent, meaning the working directory
    if !parent.as_os_str().is_empty() && !parent.exists() {
        return Err(ConfigError::Message(format!(
            "{label} state_file parent directory does not exist: {}",
            parent.display()
        )));
    }

    Ok(())
}
