use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// Orders file for the flat-file backend. Unset means in-memory only.
    pub data_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Self {
        let data_file = env::var("TAVOLA_DATA_FILE").ok().map(PathBuf::from);
        if data_file.is_none() {
            info!("TAVOLA_DATA_FILE not set, orders held in memory");
        }

        Self {
            port: try_load("RUST_PORT", "3001"),
            data_file,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
