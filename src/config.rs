use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BEST_SCORE_PATH: &str = ".data/best-score.json";

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub best_score_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub seed: Option<u32>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup` so tests need not touch the process
    /// environment. Unset or blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let port = match value("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => DEFAULT_PORT,
        };
        let best_score_path = value("BEST_SCORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BEST_SCORE_PATH));
        let static_dir = value("STATIC_DIR").map(PathBuf::from);
        let seed = match value("GAME_SEED") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .with_context(|| format!("GAME_SEED must be a u32, got {raw:?}"))?,
            ),
            None => None,
        };

        Ok(Self {
            port,
            best_score_path,
            static_dir,
            seed,
        })
    }

    /// First directory holding an `index.html`: `STATIC_DIR`, then the usual
    /// build output locations.
    pub fn resolve_static_dir(&self) -> Option<PathBuf> {
        if let Some(path) = self.static_dir.as_ref() {
            if path.join("index.html").is_file() {
                return Some(path.clone());
            }
        }
        [PathBuf::from("dist/client"), PathBuf::from("public")]
            .into_iter()
            .find(|path| path.join("index.html").is_file())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).expect("defaults");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.best_score_path, PathBuf::from(DEFAULT_BEST_SCORE_PATH));
        assert_eq!(config.static_dir, None);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", " 9000 "),
            ("BEST_SCORE_PATH", "/tmp/best.json"),
            ("STATIC_DIR", "web"),
            ("GAME_SEED", "42"),
            ("UNRELATED", "x"),
        ]))
        .expect("parsed");
        assert_eq!(config.port, 9000);
        assert_eq!(config.best_score_path, PathBuf::from("/tmp/best.json"));
        assert_eq!(config.static_dir, Some(PathBuf::from("web")));
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("PORT", "  "), ("GAME_SEED", "")]))
                .expect("defaults");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert!(ServerConfig::from_lookup(lookup_from(&[("PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup_from(&[("GAME_SEED", "-1")])).is_err());
    }
}
