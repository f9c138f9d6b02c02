use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use reqwest::Client;
use serde::Deserialize;

use crate::connector::{Credentials, DatabaseConnector, Fuseki, GraphDb};
use crate::error::SyncError;
use crate::reconciler::IngestPolicy;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Fuseki,
    GraphDb,
}

impl FromStr for Backend {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fuseki" => Ok(Backend::Fuseki),
            "graphdb" => Ok(Backend::GraphDb),
            other => Err(SyncError::invalid(format!(
                "Unknown database type '{other}' [Expected: fuseki, graphdb]"
            ))),
        }
    }
}

/// Process configuration. Field names double as the (unprefixed) environment
/// variables they are read from, e.g. `DATA` and `SPARQL_ENDPOINT`.
#[derive(Clone, Deserialize, Debug)]
pub struct SyncSettings {
    #[serde(default = "default_data_dir")]
    pub data: PathBuf,
    #[serde(default)]
    pub sparql_endpoint: String,
    #[serde(default)]
    pub database_type: Backend,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default)]
    pub admin_password: String,
    #[serde(default = "default_config_output")]
    pub config_output: PathBuf,
    #[serde(default = "default_base_config")]
    pub base_config: PathBuf,
    #[serde(default = "default_repository_config")]
    pub repository_config: PathBuf,
    #[serde(default)]
    pub startup_delay: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub ingest_policy: IngestPolicy,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_config_output() -> PathBuf {
    PathBuf::from("/config/config-docker-compose.ttl")
}

fn default_base_config() -> PathBuf {
    PathBuf::from("/var/www/html/config-docker-compose.ttl")
}

fn default_repository_config() -> PathBuf {
    PathBuf::from("/app/skosmos-repository.ttl")
}

fn default_request_timeout() -> u64 {
    60
}

impl SyncSettings {
    /// Optional `vocab-sync.{toml,yaml,json}` in the working directory, overridden by the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("vocab-sync").required(false))
            .add_source(Environment::default())
            .build()?;

        config.try_deserialize()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.admin_username, &self.admin_password)
    }

    pub fn http_client(&self) -> Result<Client, SyncError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.request_timeout))
            .build()?)
    }

    pub fn connector(&self, client: Client) -> Result<Box<dyn DatabaseConnector>, SyncError> {
        if self.sparql_endpoint.is_empty() {
            return Err(SyncError::Environment(
                "No SPARQL endpoint configured (SPARQL_ENDPOINT)".into(),
            ));
        }
        let connector: Box<dyn DatabaseConnector> = match self.database_type {
            Backend::Fuseki => Box::new(Fuseki::new(
                client,
                &self.sparql_endpoint,
                self.credentials(),
            )),
            Backend::GraphDb => Box::new(GraphDb::new(
                client,
                &self.sparql_endpoint,
                self.credentials(),
                &self.repository_config,
            )),
        };
        Ok(connector)
    }
}
