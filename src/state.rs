use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::auth::{
    jwt::JwtKeys,
    mailer::{EmailSender, LogMailer, SmtpMailer},
    password::Argon2Hasher,
    repo::PgUserStore,
    services::AuthService,
};
use crate::clock::SystemClock;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Connects to Postgres and wires the production collaborators.
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let mailer: Arc<dyn EmailSender> = match &config.mail.smtp_host {
            Some(host) => {
                info!(host = %host, port = config.mail.smtp_port, "smtp mailer enabled");
                Arc::new(SmtpMailer::new(&config.mail, host)?)
            }
            None => {
                info!("SMTP_HOST not set; emails will be logged only");
                Arc::new(LogMailer)
            }
        };

        let auth = Arc::new(AuthService::new(
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(Argon2Hasher::default()),
            Arc::new(JwtKeys::from_config(&config.jwt)),
            mailer,
            Arc::new(SystemClock),
        ));

        Ok((Self::from_parts(config, auth), db))
    }

    pub fn from_parts(config: Arc<AppConfig>, auth: Arc<AuthService>) -> Self {
        Self { config, auth }
    }
}
