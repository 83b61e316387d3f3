use std::path::Path;

use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "hierarchies.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[must_use]
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "hierarchies", "hierarchies")
}

/// Maximum number of rows a single hierarchy level may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSizeLimit")]
pub enum SizeLimit {
    Unbounded,
    Rows(u64),
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self::Rows(1000)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSizeLimit {
    Rows(u64),
    Keyword(String),
}

impl TryFrom<RawSizeLimit> for SizeLimit {
    type Error = String;

    fn try_from(raw: RawSizeLimit) -> Result<Self, Self::Error> {
        match raw {
            RawSizeLimit::Rows(0) => Err("size limit must be a positive number".to_string()),
            RawSizeLimit::Rows(rows) => Ok(Self::Rows(rows)),
            RawSizeLimit::Keyword(keyword) if keyword.eq_ignore_ascii_case("unbounded") => {
                Ok(Self::Unbounded)
            }
            RawSizeLimit::Keyword(other) => Err(format!(
                "expected a positive number or \"unbounded\", got \"{other}\""
            )),
        }
    }
}

/// Labels of synthetic grouping nodes that have no value to display.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupingLabels {
    pub unspecified: String,
    pub other: String,
}

impl Default for GroupingLabels {
    fn default() -> Self {
        Self {
            unspecified: "Not specified".to_string(),
            other: "Other".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub hierarchy_level_size_limit: SizeLimit,
    pub query_concurrency: usize,
    pub yield_every: usize,
    pub labels: GroupingLabels,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hierarchy_level_size_limit: SizeLimit::default(),
            query_concurrency: 4,
            yield_every: 1000,
            labels: GroupingLabels::default(),
        }
    }
}

impl Settings {
    pub fn new(project_root: &Path) -> Result<Self, ConfigError> {
        let user_config_file = project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME));

        Self::load_from_paths(project_root, user_config_file.as_deref())
    }

    fn load_from_paths(
        project_root: &Path,
        user_config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            File::from(project_root.join(format!(".{CONFIG_FILE_NAME}")))
                .format(FileFormat::Toml)
                .required(false),
        );

        builder = builder.add_source(
            File::from(project_root.join(CONFIG_FILE_NAME))
                .format(FileFormat::Toml)
                .required(false),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(?settings, "Loaded hierarchy settings");
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.query_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "query_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.yield_every == 0 {
            return Err(ConfigError::Invalid {
                key: "yield_every",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
