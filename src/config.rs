use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/tunebot/config.toml";

/// Bot configuration
///
/// The secrets come from the environment: `BOT_TOKEN` is required at startup,
/// `YT_API_KEY` is only needed once someone asks for music. The optional
/// config file carries the non-secret knobs.
pub struct Config {
    pub discord_token: String,
    pub yt_api_key: Option<String>,
    pub general: General,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
}

fn default_prefix() -> String {
    "!".to_string()
}

impl Default for General {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
        }
    }
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct ConfigFile {
    #[serde(default)]
    general: General,
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let discord_token = std::env::var("BOT_TOKEN")
            .map_err(|_| anyhow!("save your token in the BOT_TOKEN env variable!"))?;
        let yt_api_key = std::env::var("YT_API_KEY").ok();
        let general = Self::load_file().await?.general;

        Ok(Self {
            discord_token,
            yt_api_key,
            general,
        })
    }

    /// A missing config file is not an error; everything in it has a default.
    async fn load_file() -> Result<ConfigFile> {
        let path = Self::config_path()?;

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConfigFile::default())
            }
            Err(e) => {
                return Err(anyhow!(
                    "Could not open configuration at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        toml::from_str(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_file_uses_defaults() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(cfg.general.command_prefix, "!");
    }

    #[test]
    fn prefix_can_be_overridden() {
        let cfg: ConfigFile = toml::from_str("[general]\ncommand_prefix = \";\"\n").unwrap();
        assert_eq!(cfg.general.command_prefix, ";");
    }
}
