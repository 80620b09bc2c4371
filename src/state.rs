use std::sync::Arc;

use crate::auth::JwtService;
use crate::clients::build_http_client;
use crate::clients::email::{HttpMailer, LogMailer, Mailer};
use crate::clients::google::{GoogleTokenInfoClient, IdTokenVerifier};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuthService, EventService, PromotionService, SeaOrmAuthService, SeaOrmEventService,
    SeaOrmPromotionService, SeaOrmTransactionService, SeaOrmUserService, TransactionService,
    UserService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub mailer: Arc<dyn Mailer>,

    pub auth_service: Arc<dyn AuthService>,

    pub user_service: Arc<dyn UserService>,

    pub transaction_service: Arc<dyn TransactionService>,

    pub event_service: Arc<dyn EventService>,

    pub promotion_service: Arc<dyn PromotionService>,
}

impl SharedState {
    /// Connects to the database and wires the production email and Google
    /// clients from `config`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_http_client(config.email.request_timeout_seconds)?;

        let mailer: Arc<dyn Mailer> = if config.email.api_key.is_empty() {
            Arc::new(LogMailer)
        } else {
            Arc::new(HttpMailer::new(
                http_client.clone(),
                config.email.api_url.clone(),
                config.email.api_key.clone(),
                config.email.from_address.clone(),
            ))
        };

        let google: Arc<dyn IdTokenVerifier> = Arc::new(GoogleTokenInfoClient::new(
            http_client,
            config.auth.google_tokeninfo_url.clone(),
            config.auth.google_client_id.clone(),
        ));

        Self::with_clients(config, mailer, google).await
    }

    /// Like [`SharedState::new`] with caller-supplied external clients.
    pub async fn with_clients(
        config: Config,
        mailer: Arc<dyn Mailer>,
        google: Arc<dyn IdTokenVerifier>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        store.ensure_superuser(&config).await?;

        let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
        let frontend_url = config.server.frontend_url.clone();

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            jwt,
            mailer.clone(),
            google,
            config.auth.clone(),
            frontend_url.clone(),
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let user_service = Arc::new(SeaOrmUserService::new(
            store.clone(),
            mailer.clone(),
            config.auth.clone(),
            frontend_url.clone(),
        )) as Arc<dyn UserService + Send + Sync + 'static>;

        let transaction_service = Arc::new(SeaOrmTransactionService::new(store.clone()))
            as Arc<dyn TransactionService + Send + Sync + 'static>;

        let event_service = Arc::new(SeaOrmEventService::new(
            store.clone(),
            mailer.clone(),
            frontend_url,
        )) as Arc<dyn EventService + Send + Sync + 'static>;

        let promotion_service = Arc::new(SeaOrmPromotionService::new(store.clone()))
            as Arc<dyn PromotionService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(config),
            store,
            mailer,
            auth_service,
            user_service,
            transaction_service,
            event_service,
            promotion_service,
        })
    }
}
