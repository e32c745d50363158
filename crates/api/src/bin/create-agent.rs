//! Create an agent account from the command line
//!
//! Useful when `ENABLE_SIGNUP=false` and the first agent has to be
//! provisioned by hand.
//!
//! Usage:
//!   cargo run --bin create-agent -- "Ada Lovelace" ada@example.com
//!   cargo run --bin create-agent -- "Ada Lovelace" ada@example.com "CorrectHorse9!Battery"
//!
//! The password is read from stdin when not given, so it stays out of the
//! process list.

use anyhow::{bail, Context};
use livedesk_api::auth::{hash_password, validate_password_strength};
use livedesk_api::routes::auth::{normalize_email, validate_name};
use livedesk_shared::{create_pool, run_migrations};
use std::io::{self, Write};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args().skip(1);
    let (Some(name), Some(email)) = (args.next(), args.next()) else {
        bail!("usage: create-agent <name> <email> [password]");
    };

    let password = match args.next() {
        Some(password) => password,
        None => {
            print!("Password: ");
            io::stdout().flush()?;
            let mut password = String::new();
            io::stdin().read_line(&mut password)?;
            password.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let name = validate_name(&name)?;
    let email = normalize_email(&email)?;
    validate_password_strength(&password)?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = create_pool(&database_url, 1).await?;
    run_migrations(&pool).await?;

    let password_hash = hash_password(&password)?;

    let mut tx = pool.begin().await?;

    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("could not create {} (already registered?)", email))?;

    let app_id: Uuid = sqlx::query_scalar(
        "INSERT INTO workspace_settings (id, user_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    println!("Created agent {} <{}>", name, email);
    println!("  user id: {}", user_id);
    println!("  app id:  {}", app_id);

    Ok(())
}
