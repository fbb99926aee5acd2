//! Configuration builder for layered configuration loading

use crate::{build_chain, Config, ConfigError, ConfigResult, Container, DecoderContainer};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Log levels accepted by [`crate::LoggingConfig::level`]
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File { path: PathBuf, format: FileFormat },
    Defaults,
    Environment { prefix: String },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source; missing files are skipped
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = Self::detect_format(&path);
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add a configuration file source with explicit format
    pub fn add_source_file_with_format<P: AsRef<Path>>(
        mut self,
        path: P,
        format: FileFormat,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        self.sources.push(ConfigSource::File { path, format });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // Defaults are always the base layer
        let defaults_value = serde_yaml::to_value(Config::default())
            .map_err(|e| ConfigError::other(format!("Failed to serialize defaults: {}", e)))?;
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&defaults_value)?);

        for source in &self.sources {
            match source {
                ConfigSource::File { path, format } => {
                    if path.exists() {
                        debug!("Loading configuration from {}", path.display());
                        self.inner = self
                            .inner
                            .add_source(File::from(path.clone()).format(*format));
                    }
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix)
                            .prefix_separator(&self.env_separator)
                            .separator(&self.env_separator)
                            .try_parsing(true),
                    );
                }
                ConfigSource::Defaults => {}
            }
        }

        let config = self.inner.build()?;
        let result: Config = config.try_deserialize()?;

        Self::validate(&result)?;

        Ok(result)
    }

    /// Try to build the configuration, returning defaults on error
    pub fn build_or_default(self) -> Config {
        self.build().unwrap_or_default()
    }

    /// Detect file format from extension
    fn detect_format(path: &Path) -> FileFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Validate the configuration
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        if !config.encoder.filters.is_empty() {
            build_chain(&config.encoder.filters)
                .map_err(|e| ConfigError::validation(format!("encoder.filters: {}", e)))?;
        }
        if config.encoder.container == Container::Raw && config.encoder.filters.is_empty() {
            return Err(ConfigError::validation(
                "encoder.filters is required for the raw container",
            ));
        }

        if !config.decoder.filters.is_empty() {
            build_chain(&config.decoder.filters)
                .map_err(|e| ConfigError::validation(format!("decoder.filters: {}", e)))?;
        }
        if config.decoder.container == DecoderContainer::Raw && config.decoder.filters.is_empty()
        {
            return Err(ConfigError::validation(
                "decoder.filters is required for the raw container",
            ));
        }

        Ok(())
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzstream_types::{Check, FilterId, OptionBlock};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(temp_file, "{}", content).unwrap();
        temp_file
    }

    #[test]
    fn test_builder_defaults() {
        let config = ConfigBuilder::new().add_defaults().build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.stream.buffer_size.get(), 8192);
    }

    #[test]
    fn test_builder_yaml_file() {
        let temp_file = yaml_file(
            r#"
stream:
  buffer_size: 65536
  async_mode: true
encoder:
  preset: 9
  check: sha256
  filters:
    - id: LZMA_FILTER_DELTA
      options:
        delta:
          distance: 4
    - id: lzma2
      options:
        lzma:
          preset: 3
          nice_len: 128
decoder:
  memlimit: 1048576
  concatenated: true
"#,
        );

        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build()
            .unwrap();

        assert_eq!(config.stream.buffer_size.get(), 65536);
        assert!(config.stream.async_mode);
        assert_eq!(config.encoder.preset.level(), 9);
        assert_eq!(config.encoder.check, Check::Sha256);
        assert_eq!(config.encoder.filters.len(), 2);
        assert!(matches!(
            config.encoder.filters[1].options,
            Some(OptionBlock::Lzma(options)) if options.nice_len == Some(128)
        ));
        assert_eq!(config.decoder.memlimit, Some(1 << 20));
        assert!(config.decoder.concatenated);

        let chain = build_chain(&config.encoder.filters).unwrap();
        assert_eq!(chain.stages()[1].id(), FilterId::Lzma2);
    }

    #[test]
    fn test_builder_rejects_invalid_log_level() {
        let temp_file = yaml_file("logging:\n  level: verbose\n");
        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Log level must be one of"));
    }

    #[test]
    fn test_builder_rejects_bad_filter_chain() {
        let temp_file = yaml_file(
            r#"
encoder:
  filters:
    - id: LZMA_FILTER_X86
      options:
        delta:
          distance: 2
"#,
        );
        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();

        let message = result.unwrap_err().to_string();
        assert!(message.contains("encoder.filters"), "{}", message);
        assert!(message.contains("does not accept options"), "{}", message);
    }

    #[test]
    fn test_builder_rejects_invalid_preset() {
        let temp_file = yaml_file("encoder:\n  preset: 12\n");
        let result = ConfigBuilder::new()
            .add_defaults()
            .add_source_file(temp_file.path())
            .build();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let config = ConfigBuilder::new()
            .add_defaults()
            .add_source_file("/nonexistent/lzstream.yaml")
            .build()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("LZSTREAM_BUILDER_TEST__STREAM__BUFFER_SIZE", "4096");
        let config = ConfigBuilder::new()
            .add_defaults()
            .add_env_prefix("LZSTREAM_BUILDER_TEST")
            .build();
        std::env::remove_var("LZSTREAM_BUILDER_TEST__STREAM__BUFFER_SIZE");

        assert_eq!(config.unwrap().stream.buffer_size.get(), 4096);
    }
}
