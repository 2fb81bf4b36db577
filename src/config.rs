//! Configuration management for the publication streamer

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Publicly reachable base URL, used when building `self` links. Falls
    /// back to the listen address.
    pub public_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Directory scanned at startup; every recognizable package found in it
    /// is bound under its file stem.
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                public_url: None,
            },
            library: LibraryConfig { dir: None },
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let host = if self.host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &self.host
        };
        format!("http://{}:{}", host, self.port)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
                public_url: env::var("PUBLIC_URL").ok(),
            },
            library: LibraryConfig {
                dir: env::var("LIBRARY_DIR").ok().map(PathBuf::from),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_substitutes_the_wildcard_host() {
        let config = Config::default();
        assert_eq!(config.server.base_url(), "http://127.0.0.1:3000");
    }

    #[test]
    fn public_url_wins_and_is_trimmed() {
        let mut config = Config::default();
        config.server.public_url = Some("https://books.example.com/".to_string());
        assert_eq!(config.server.base_url(), "https://books.example.com");
    }
}
