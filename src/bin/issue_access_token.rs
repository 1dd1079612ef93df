//! Mint an opaque bearer token for an existing user.
//!
//! The token is printed once; only its SHA-256 digest is stored.

use anyhow::{Context, Result, bail};
use clap::Parser;
use enterprise_api::{
    config::ConfigLoader,
    db,
    repositories::{CredentialRepository, UserRepository},
};

#[derive(Parser, Debug)]
#[command(name = "issue_access_token", about, long_about = None)]
struct Args {
    /// Username of the platform user the token authenticates as.
    #[arg(long)]
    username: String,

    /// Hours until the token expires.
    #[arg(long, default_value_t = 24 * 30)]
    ttl_hours: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.ttl_hours <= 0 {
        bail!("--ttl-hours must be positive");
    }

    let config = ConfigLoader::new().load().context("loading configuration")?;
    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    let user = UserRepository::new(&db)
        .find_by_username(&args.username)
        .await
        .context("looking up user")?
        .with_context(|| format!("user {} does not exist", args.username))?;

    let issued = CredentialRepository::new(&db)
        .issue_access_token(user.id, chrono::Duration::hours(args.ttl_hours))
        .await
        .context("storing access token")?;

    println!("{}", issued.token);
    eprintln!(
        "Issued token for {} expiring at {}.",
        user.username,
        issued.record.expires_at.to_rfc3339()
    );

    Ok(())
}
