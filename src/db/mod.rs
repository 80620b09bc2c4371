use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::entities::sea_orm_active_enums::Role;

pub mod migrator;
pub mod repositories;

pub use repositories::event::{EventFilter, EventRepository, EventSummary, GuestAdd, NewEvent};
pub use repositories::ledger::{
    AmountOperator, AppliedPromotion, LedgerError, LedgerRepository, NewEntry, TransactionFilter,
    TransactionRecord,
};
pub use repositories::promotion::{NewPromotion, PromotionFilter, PromotionRepository};
pub use repositories::stats::{CashierStats, ManagerStats, StatsRepository};
pub use repositories::user::{NewUser, UserFilter, UserRepository};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn events(&self) -> EventRepository {
        EventRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn promotions(&self) -> PromotionRepository {
        PromotionRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn stats(&self) -> StatsRepository {
        StatsRepository::new(self.conn.clone())
    }

    /// Creates the configured superuser when no account with that utorid
    /// exists. Returns `true` if an account was created.
    pub async fn ensure_superuser(&self, config: &Config) -> Result<bool> {
        let bootstrap = &config.bootstrap;
        if !bootstrap.enabled {
            return Ok(false);
        }

        let users = self.users();
        if users.get_by_utorid(&bootstrap.superuser_utorid).await?.is_some() {
            return Ok(false);
        }

        let password_hash =
            crate::auth::hash_password(&bootstrap.superuser_password, &config.auth).await?;

        users
            .insert(NewUser {
                utorid: bootstrap.superuser_utorid.clone(),
                name: "Administrator".to_string(),
                email: bootstrap.superuser_email.clone(),
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

        info!(utorid = %bootstrap.superuser_utorid, "Bootstrap superuser created");
        Ok(true)
    }
}
