use std::fs;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use opsdesk::auth::hash_password;
use opsdesk::config::ServerConfig;
use opsdesk::server::{AppState, create_router};
use opsdesk::store::{SqliteStore, Store};
use opsdesk::types::{User, pick_avatar};

const BOOTSTRAP_USERNAME: &str = "root";
const GENERATED_PASSWORD_LEN: usize = 20;
const AVATAR_BATCH: i32 = 200;

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn create_user(
    store: &SqliteStore,
    username: &str,
    password: &str,
    is_staff: bool,
    is_superuser: bool,
) -> anyhow::Result<User> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: hash_password(password)?,
        email: String::new(),
        is_staff,
        is_superuser,
        date_joined: Utc::now(),
    };
    store.create_user(&user)?;
    store.ensure_profile(&user.id, pick_avatar(rand::thread_rng().r#gen()))?;
    Ok(user)
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "opsdesk")]
#[command(about = "An administration dashboard server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and bootstrap superuser)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Assign avatars to users missing a profile or avatar
    AssignAvatars {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let db_path = data_path.join("opsdesk.db");
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let password_file = data_path.join(".superuser_password");

    if store.has_superuser()? {
        bail!(
            "Server already initialized. Superuser credentials were written to: {}",
            password_file.display()
        );
    }

    let password = generate_password();
    create_user(&store, BOOTSTRAP_USERNAME, &password, true, true)?;
    fs::write(&password_file, &password)?;

    #[cfg(unix)]
    set_restrictive_permissions(&password_file);

    println!();
    println!("========================================");
    println!("Superuser '{BOOTSTRAP_USERNAME}' created with password (save this, it won't be shown again):");
    println!();
    println!("  {password}");
    println!();
    println!("Password also written to: {}", password_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_default_user_prompt(&store)?;
    }

    Ok(())
}

fn create_default_user_prompt(store: &SqliteStore) -> anyhow::Result<()> {
    let create = inquire::Confirm::new("Would you like to create a regular user?")
        .with_default(false)
        .prompt()?;

    if !create {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let password = generate_password();
    create_user(store, &username, &password, false, false)?;

    println!();
    println!("========================================");
    println!("Created user '{username}' with password:");
    println!();
    println!("  {password}");
    println!();
    println!("========================================");
    println!();

    Ok(())
}

fn run_assign_avatars(data_dir: String) -> anyhow::Result<()> {
    let data_path: std::path::PathBuf = data_dir.into();
    let store = SqliteStore::new(data_path.join("opsdesk.db"))?;
    store.initialize()?;

    let mut created = 0u32;
    let mut updated = 0u32;
    let mut cursor = String::new();

    loop {
        let users = store.list_users(&cursor, AVATAR_BATCH)?;
        let Some(last) = users.last() else { break };
        cursor = last.id.clone();

        for user in &users {
            let avatar = pick_avatar(rand::thread_rng().r#gen());
            match store.get_profile(&user.id)? {
                Some(profile) if !profile.avatar.is_empty() => {}
                Some(_) => {
                    store.ensure_profile(&user.id, avatar)?;
                    updated += 1;
                }
                None => {
                    store.ensure_profile(&user.id, avatar)?;
                    created += 1;
                }
            }
        }
    }

    println!(
        "Profiles created: {created}, avatars set: {}",
        created + updated
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("opsdesk=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
            AdminCommands::AssignAvatars { data_dir } => {
                run_assign_avatars(data_dir)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
            };

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;
            if !store.has_superuser()? {
                bail!(
                    "Server not initialized. Run 'opsdesk admin init' first to create the database and bootstrap superuser."
                );
            }

            let state = Arc::new(AppState::new(Arc::new(store)));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
