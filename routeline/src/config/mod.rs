use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Loaded configuration of type `C`.
#[derive(Debug, Default)]
pub struct Config<C> {
    config: C,
}

impl<C> Config<C>
where
    C: Default + DeserializeOwned,
{
    pub fn new(provider: &impl ConfigProvider<C>) -> Result<Self, ConfigProviderError> {
        provider.load().map(|config| Config { config })
    }

    pub fn get(&self) -> &C {
        &self.config
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.config
    }

    pub fn into_inner(self) -> C {
        self.config
    }
}

pub trait ConfigProvider<C>
where
    C: Default + DeserializeOwned,
{
    fn load(&self) -> Result<C, ConfigProviderError>;
}

/// Provides `C::default()`.
pub struct DefaultConfigProvider;

impl<C> ConfigProvider<C> for DefaultConfigProvider
where
    C: Default + DeserializeOwned,
{
    fn load(&self) -> Result<C, ConfigProviderError> {
        Ok(C::default())
    }
}

/// Reads a JSON document from `base_path/config_name`.
pub struct FileConfigProvider {
    pub base_path: PathBuf,
    pub config_name: String,
}

impl FileConfigProvider {
    pub fn new(base_path: impl Into<PathBuf>, config_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            config_name: config_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        Path::new(&self.base_path).join(&self.config_name)
    }
}

impl<C> ConfigProvider<C> for FileConfigProvider
where
    C: Default + DeserializeOwned,
{
    fn load(&self) -> Result<C, ConfigProviderError> {
        let config_path = self.path();
        log::info!("Loading configuration from '{}'", config_path.display());
        let file = File::open(&config_path).map_err(|e| {
            let msg = format!("Could not open config file '{}': {}", config_path.display(), e);
            ConfigProviderError::load_error(msg)
        })?;
        serde_json::from_reader(file).map_err(|e| {
            let msg = format!("Could not parse config file '{}': {}", config_path.display(), e);
            ConfigProviderError::load_error(msg)
        })
    }
}

/// Hands out a configuration value built in code.
pub struct ProgrammaticConfigProvider<C> {
    pub config: C,
}

impl<C> ProgrammaticConfigProvider<C> {
    pub fn new(config: C) -> Self {
        Self { config }
    }
}

impl<C> ConfigProvider<C> for ProgrammaticConfigProvider<C>
where
    C: Default + DeserializeOwned + Clone + Serialize,
{
    fn load(&self) -> Result<C, ConfigProviderError> {
        Ok(self.config.clone())
    }
}

#[derive(Error, Debug)]
pub enum ConfigProviderError {
    #[error("Could not load configuration. {message}")]
    Load { message: String },
}

impl ConfigProviderError {
    #[inline]
    pub(crate) fn load_error(msg: impl Into<String>) -> Self {
        Self::Load {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn test_default_provider() {
        let config: Config<Sample> = Config::new(&DefaultConfigProvider).unwrap();
        assert_eq!(config.get(), &Sample::default());
    }

    #[test]
    fn test_programmatic_provider() {
        let sample = Sample {
            name: "api".to_string(),
            retries: 2,
        };
        let provider = ProgrammaticConfigProvider::new(sample.clone());
        let mut config = Config::new(&provider).unwrap();
        config.get_mut().retries = 3;
        assert_eq!(config.into_inner().retries, 3);
        assert_eq!(provider.load().unwrap(), sample);
    }

    #[test]
    fn test_file_provider() {
        let dir = std::env::temp_dir().join(format!("routeline-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = File::create(dir.join("sample.json")).unwrap();
        file.write_all(br#"{"name": "from-file"}"#).unwrap();

        let provider = FileConfigProvider::new(&dir, "sample.json");
        let loaded: Sample = provider.load().unwrap();
        assert_eq!(loaded.name, "from-file");
        assert_eq!(loaded.retries, 0);

        let missing = FileConfigProvider::new(&dir, "missing.json");
        assert!(matches!(
            ConfigProvider::<Sample>::load(&missing),
            Err(ConfigProviderError::Load { .. })
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
