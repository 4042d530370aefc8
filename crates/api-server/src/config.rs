//! Server configuration from environment

use std::net::SocketAddr;

use anyhow::Context;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";
const DEFAULT_EXECUTOR_URL: &str = "http://127.0.0.1:6400";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the REST API listens on (`TESTRUN_BIND_ADDR`)
    pub bind_addr: SocketAddr,
    /// Base URL of the remote test executor (`TESTRUN_EXECUTOR_URL`)
    pub executor_url: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("TESTRUN_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("Invalid TESTRUN_BIND_ADDR: {}", bind_addr))?;

        let executor_url = std::env::var("TESTRUN_EXECUTOR_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXECUTOR_URL.to_string());

        Ok(Self {
            bind_addr,
            executor_url,
        })
    }
}
