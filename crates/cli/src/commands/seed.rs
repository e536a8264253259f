use sha2::{Digest, Sha256};

use crate::commands::CommandResult;
use maitred_core::config::{AppConfig, LoadOptions};
use maitred_core::domain::customer::CustomerDetails;
use maitred_db::repositories::{RepositoryError, SqlUserRepository, UserRepository};
use maitred_db::{connect, migrations};

const DEMO_USERNAME: &str = "demo";
const DEMO_PASSWORD: &str = "demo-password";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let users = SqlUserRepository::new(pool.clone());
        let outcome = seed_demo_user(&users).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

async fn seed_demo_user(
    users: &dyn UserRepository,
) -> Result<String, (&'static str, String, u8)> {
    let hash = hash_credential(DEMO_USERNAME, DEMO_PASSWORD);

    let user = match users.create(DEMO_USERNAME, &hash).await {
        Ok(user) => user,
        Err(RepositoryError::DuplicateUsername(_)) => {
            return Ok(format!("demo user `{DEMO_USERNAME}` already present, nothing to do"));
        }
        Err(error) => return Err(("seed_execution", error.to_string(), 6u8)),
    };

    users
        .update_profile(user.id, &demo_profile())
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;

    Ok(format!(
        "created demo user `{DEMO_USERNAME}` (password `{DEMO_PASSWORD}`) with a contact profile"
    ))
}

fn demo_profile() -> CustomerDetails {
    CustomerDetails {
        title: Some("Mr".to_string()),
        first_name: Some("Demo".to_string()),
        surname: Some("Diner".to_string()),
        email: Some("demo.diner@example.com".to_string()),
        mobile: Some("07700 900123".to_string()),
        ..CustomerDetails::default()
    }
}

/// Same credential scheme as the server's auth shell: the username doubles
/// as a salt, the digest is tagged hex.
fn hash_credential(username: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update([0x1f]);
    hasher.update(password.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}
