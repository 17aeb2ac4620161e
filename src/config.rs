//! Application configuration.
//!
//! Loaded from TOML, every key optional:
//!
//! ```toml
//! addr           = "0.0.0.0:3000"
//! default_locale = "en-US"
//! encoding       = "utf-8"
//! ```
//!
//! `ACTIO_ADDR` in the environment overrides `addr` (see [`Config::from_env`]).

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::locale::Locale;

pub const ADDR_ENV: &str = "ACTIO_ADDR";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listen address, `host:port`.
    pub addr: String,
    /// Locale used when the request carries no usable `Accept-Language`.
    pub default_locale: Locale,
    /// Character encoding announced on text responses.
    pub encoding: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            default_locale: Locale::default(),
            encoding: "utf-8".to_owned(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Applies environment overrides on top of `self`.
    pub fn from_env(mut self) -> Self {
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            self.addr = addr;
        }
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr.parse().map_err(|_| Error::InvalidAddr(self.addr.clone()))
    }
}
