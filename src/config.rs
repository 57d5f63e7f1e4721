use std::net::SocketAddr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Base URL of the optional document-store mirror. None disables mirroring.
    pub mirror_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match dotenv::var("PORT") {
            Ok(port) => port.parse::<u16>().context("PORT must be a port number")?,
            Err(_) => 3000,
        };

        let database_url = dotenv::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:securechat.db?mode=rwc".to_owned());

        let mirror_url = dotenv::var("MIRROR_URL").ok().filter(|url| !url.is_empty());

        Ok(Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            database_url,
            mirror_url,
        })
    }
}
