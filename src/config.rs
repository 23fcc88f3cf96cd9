use anyhow::{Context, Result};

/// Process configuration, assembled once at boot from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub projects_root_path: String,
    pub docker_network: String,
    pub nginx_config_path: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let projects_root_path = std::env::var("PROJECTS_ROOT_PATH")
            .unwrap_or_else(|_| "/var/versiongate/projects".to_string());

        let docker_network =
            std::env::var("DOCKER_NETWORK").unwrap_or_else(|_| "versiongate-net".to_string());

        let nginx_config_path = std::env::var("NGINX_CONFIG_PATH")
            .unwrap_or_else(|_| "/etc/nginx/conf.d/upstream.conf".to_string());

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            port,
            database_url,
            projects_root_path,
            docker_network,
            nginx_config_path,
            log_level,
        })
    }
}
