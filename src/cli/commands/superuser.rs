//! Create-superuser command handler

use sea_orm::Set;

use crate::auth::{hash_password, validate_password_policy};
use crate::config::Config;
use crate::db::{NewUser, Store};
use crate::entities::{sea_orm_active_enums::Role, users};

pub async fn cmd_create_superuser(
    config: &Config,
    utorid: &str,
    email: &str,
    name: Option<&str>,
    password: &str,
) -> anyhow::Result<()> {
    validate_password_policy(password).map_err(anyhow::Error::msg)?;

    let utorid = utorid.trim().to_lowercase();
    let email = email.trim().to_lowercase();
    if utorid.is_empty() || !email.contains('@') {
        anyhow::bail!("A utorid and a valid email address are required");
    }

    let store = Store::with_pool_options(
        &config.general.database_url,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    let repo = store.users();
    let password_hash = hash_password(password, &config.auth).await?;

    if let Some(existing) = repo.get_by_utorid(&utorid).await? {
        let mut active: users::ActiveModel = existing.into();
        active.role = Set(Role::Superuser);
        active.password_hash = Set(Some(password_hash));
        active.verified = Set(true);
        active.activated = Set(true);
        repo.update(active).await?;

        println!("Promoted {utorid} to superuser and reset the password.");
        return Ok(());
    }

    if repo.get_by_email(&email).await?.is_some() {
        anyhow::bail!("{email} is already used by another account");
    }

    repo.insert(NewUser {
        utorid: utorid.clone(),
        name: name.unwrap_or(&utorid).to_string(),
        email,
        password_hash: Some(password_hash),
        role: Role::Superuser,
        verified: true,
        activated: true,
        reset_token: None,
        reset_expires_at: None,
        verification_token: None,
        google_sub: None,
    })
    .await?;

    println!("Created superuser {utorid}.");
    Ok(())
}
