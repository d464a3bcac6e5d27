pub mod error;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::package_name;

pub use error::{ConfigError, Result};

/// Configuration file searched for upward from the working directory
pub const CONFIG_FILE_NAME: &str = "gostructcopy.toml";

/// What the emitter produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// Go source text ready for insertion
    #[default]
    SourceText,
    /// An in-process copy operation over dynamic values
    Callable,
}

/// Options recognized by the matcher, plan builder and emitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Fall back to case-insensitive name matching
    #[serde(alias = "matchCaseInsensitive")]
    pub match_case_insensitive: bool,

    /// Match fields through aliases declared in struct tags
    #[serde(alias = "useTagAliases")]
    pub use_tag_aliases: bool,

    pub target: Target,

    /// Tag keys consulted for aliases, in priority order
    #[serde(alias = "aliasTags")]
    pub alias_tags: Vec<String>,

    /// Package of the generated file; when set the output is a complete Go file
    pub package: Option<String>,

    /// Prefix of generated copy function names
    #[serde(alias = "functionPrefix")]
    pub function_prefix: String,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            match_case_insensitive: true,
            use_tag_aliases: true,
            target: Target::SourceText,
            alias_tags: vec!["copy".to_string(), "json".to_string()],
            package: None,
            function_prefix: "Copy".to_string(),
        }
    }
}

impl CopyOptions {
    /// Load options from gostructcopy.toml found in `start_dir` or one of its
    /// parents. Defaults apply when there is no such file.
    pub fn load(start_dir: impl AsRef<Path>) -> Result<Self> {
        let Some(config_path) = find_config_file(start_dir.as_ref())? else {
            debug!("No {} found, using default options", CONFIG_FILE_NAME);
            return Ok(Self::default());
        };

        info!("Loading configuration from: {}", config_path.display());
        let config_data = fs::read_to_string(&config_path).map_err(|source| {
            ConfigError::ReadFailed {
                path: config_path.display().to_string(),
                source,
            }
        })?;

        Self::from_toml_str(&config_data)
    }

    /// Parse and validate options from TOML text
    pub fn from_toml_str(config_data: &str) -> Result<Self> {
        let options: CopyOptions = toml::from_str(config_data)?;
        options.validate()?;
        Ok(options)
    }

    /// Whether types of `package` (an import path) belong to the package the
    /// output is written to. Types of the local package always do.
    pub fn is_output_package(&self, package: &str) -> bool {
        package.is_empty() || self.package.as_deref() == Some(package_name(package))
    }

    /// Validate values that end up in generated source
    pub fn validate(&self) -> Result<()> {
        if !is_go_identifier(&self.function_prefix) {
            return Err(ConfigError::Invalid(format!(
                "'function_prefix' must be a Go identifier, got {:?}",
                self.function_prefix
            )));
        }
        if let Some(package) = &self.package {
            if !is_go_identifier(package) {
                return Err(ConfigError::Invalid(format!(
                    "'package' must be a Go package name, got {:?}",
                    package
                )));
            }
        }
        if let Some(tag) = self
            .alias_tags
            .iter()
            .find(|tag| tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || c == ':' || c == '"'))
        {
            return Err(ConfigError::Invalid(format!("invalid alias tag key {:?}", tag)));
        }
        Ok(())
    }
}

/// Find gostructcopy.toml by searching upward from the given path
fn find_config_file(start_path: &Path) -> Result<Option<PathBuf>> {
    let start_dir = if start_path.is_file() {
        start_path.parent().unwrap_or(start_path)
    } else {
        start_path
    };

    let mut current_dir = start_dir.canonicalize()?;
    loop {
        let config_path = current_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Ok(None),
        }
    }
}

fn is_go_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = CopyOptions::default();
        assert!(options.match_case_insensitive);
        assert!(options.use_tag_aliases);
        assert_eq!(options.target, Target::SourceText);
        assert_eq!(options.alias_tags, vec!["copy", "json"]);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_parse_snake_and_camel_case_keys() {
        let options = CopyOptions::from_toml_str(
            "match_case_insensitive = false\nuseTagAliases = false\ntarget = \"callable\"\n",
        )
        .unwrap();
        assert!(!options.match_case_insensitive);
        assert!(!options.use_tag_aliases);
        assert_eq!(options.target, Target::Callable);
        assert_eq!(options.function_prefix, "Copy");
    }

    #[test]
    fn test_config_validation() {
        let mut options = CopyOptions::default();
        options.function_prefix = "1Copy".to_string();
        assert!(options.validate().is_err());

        options.function_prefix = "Map".to_string();
        options.package = Some("my-package".to_string());
        assert!(options.validate().is_err());

        options.package = Some("mapper".to_string());
        options.alias_tags = vec!["json".to_string(), "bad key".to_string()];
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_output_package() {
        let options = CopyOptions {
            package: Some("dto".to_string()),
            ..CopyOptions::default()
        };
        assert!(options.is_output_package(""));
        assert!(options.is_output_package("example.com/app/dto"));
        assert!(!options.is_output_package("example.com/app/model"));
        assert!(!CopyOptions::default().is_output_package("example.com/app/dto"));
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        assert!(CopyOptions::from_toml_str("target = \"bytecode\"").is_err());
    }

    #[test]
    fn test_find_config_file() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "package = \"mapper\"\n")?;

        // Should find config in same directory
        let found = find_config_file(temp_dir.path())?.unwrap();
        assert_eq!(found.canonicalize()?, config_path.canonicalize()?);

        // Should find config from subdirectory
        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir)?;
        let options = CopyOptions::load(&sub_dir)?;
        assert_eq!(options.package.as_deref(), Some("mapper"));

        Ok(())
    }
}
