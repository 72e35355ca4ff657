use cadence_core::models::MaterializationConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite database file, created on first use
    pub database_path: String,
    pub materialization: MaterializationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            materialization: MaterializationConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then `cadence.toml`, then `CADENCE_*` variables
    /// (`CADENCE_MATERIALIZATION__LOOKAHEAD_DAYS=60`).
    pub fn new() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("cadence.toml"))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
    }
}
