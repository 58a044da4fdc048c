pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::Settings;

/// Name of the variable that selects the project env file.
pub const ENV_FILE_VAR: &str = "THREADKEEP_ENV_FILE";

/// Load environment variables from .env files.
///
/// Loads the project env file from the current directory
/// (`$THREADKEEP_ENV_FILE`, default `.env`), then `~/.env`. dotenv never
/// overwrites a variable that is already set, so project values take
/// precedence over home directory values, and both lose to the real
/// environment. Returns true if the project env file was found.
/// Call this before parsing CLI args to ensure env vars are available.
pub fn load_env_file() -> bool {
    let env_file = std::env::var(ENV_FILE_VAR).unwrap_or_else(|_| ".env".to_string());
    let project_found = std::env::current_dir()
        .map(|cwd| dotenv::from_path(cwd.join(&env_file)).is_ok())
        .unwrap_or(false);

    if let Some(home) = dirs::home_dir() {
        dotenv::from_path(home.join(".env")).ok();
    }

    if project_found {
        tracing::info!("Loaded {} file", env_file);
    }
    project_found
}
