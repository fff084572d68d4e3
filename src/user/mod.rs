use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::telemetry::{self};
use crate::telemetry::ops::user::Phase as UserPhase;

pub mod db;

/// agg user add/ls
#[derive(Args)]
pub struct UserCmd {
    #[command(subcommand)]
    pub cmd: UserSub,
}

#[derive(Subcommand)]
pub enum UserSub {
    /// Register a user
    Add { name: String },
    /// List users
    Ls,
}

#[derive(Serialize)]
struct UserList {
    users: Vec<db::UserRow>,
}

pub async fn run(pool: &PgPool, args: UserCmd) -> Result<()> {
    let log = telemetry::user();
    let _g = log.root_span().entered();
    match args.cmd {
        UserSub::Add { name } => {
            let _s = log.span(&UserPhase::Add).entered();
            let name = name.trim();
            if name.is_empty() { bail!("username is required"); }
            let Some(user) = db::create_user(pool, name).await? else {
                bail!("user {:?} already exists", name);
            };
            log.info(format!("👤 Registered {} ({})", user.name, user.id));
            if telemetry::config::json_mode() { log.result(&user)?; }
        }
        UserSub::Ls => {
            let _s = log.span(&UserPhase::List).entered();
            let users = db::list_users(pool).await?;
            for u in &users { log.info(format!("* {} (since {})", u.name, u.created_at.format("%Y-%m-%d"))); }
            if telemetry::config::json_mode() { log.result(&UserList { users })?; }
        }
    }
    Ok(())
}

/// Resolves a `--user` flag to an id, with a friendly error for unknown names.
pub async fn require_user(pool: &PgPool, name: &str) -> Result<Uuid> {
    db::find_user_id(pool, name)
        .await
        .context("looking up user")?
        .with_context(|| format!("user {:?} not found (register with `user add` first)", name))
}
