//! Configuration Loader
//!
//! Builds a [`ConfigTree`] from JSON, TOML or YAML documents:
//! - objects/tables/mappings become named children, in document order
//! - arrays become children `0..n`
//! - scalars become their string form, `null` an absent value
//!
//! An optional environment overlay is applied last: with prefix `APP`,
//! `APP_components__0__type=Greeter` sets `components:0:type`.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{LoadResult, LoaderError};
use crate::node::{join_key, ConfigNodeBuilder, ConfigTree};

/// Document formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment variable segment separator, mapped to `:`
const ENV_SEPARATOR: &str = "__";

/// Configuration loader with optional search paths and environment overlay
#[derive(Debug, Clone, Default)]
pub struct ConfigurationLoader {
    search_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
}

impl ConfigurationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory searched by [`ConfigurationLoader::find_configuration_file`]
    pub fn add_search_path<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Overlay variables named `{prefix}_a__b` as key `a:b`
    pub fn env_prefix<S: Into<String>>(&mut self, prefix: S) -> &mut Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// First `{stem}.json|toml|yaml|yml` found in the search paths
    pub fn find_configuration_file(&self, stem: &str) -> Option<PathBuf> {
        static EXTENSIONS: [&str; 4] = ["json", "toml", "yaml", "yml"];
        self.search_paths
            .iter()
            .flat_map(|dir| EXTENSIONS.iter().map(move |ext| dir.join(format!("{stem}.{ext}"))))
            .find(|candidate| candidate.is_file())
    }

    /// Load a file, choosing the format from its extension
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> LoadResult<ConfigTree> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            LoaderError::UnsupportedFormat(format!("{:?}", path.extension()))
        })?;
        let content = fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = self.load(format, &content)?;
        info!(path = %path.display(), %format, "configuration loaded");
        Ok(tree)
    }

    pub fn load_from_json(&self, content: &str) -> LoadResult<ConfigTree> {
        self.load(ConfigFormat::Json, content)
    }

    pub fn load_from_toml(&self, content: &str) -> LoadResult<ConfigTree> {
        self.load(ConfigFormat::Toml, content)
    }

    pub fn load_from_yaml(&self, content: &str) -> LoadResult<ConfigTree> {
        self.load(ConfigFormat::Yaml, content)
    }

    /// Parse `content` and overlay the process environment
    pub fn load(&self, format: ConfigFormat, content: &str) -> LoadResult<ConfigTree> {
        self.load_with_vars(format, content, env::vars())
    }

    /// Parse `content` and overlay the given variables instead of the process environment
    pub fn load_with_vars<I>(&self, format: ConfigFormat, content: &str, vars: I) -> LoadResult<ConfigTree>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut builder = parse(format, content)?;
        self.apply_environment_variables(&mut builder, vars);
        Ok(builder.build_tree())
    }

    fn apply_environment_variables<I>(&self, builder: &mut ConfigNodeBuilder, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let Some(prefix) = &self.env_prefix else {
            return;
        };
        let prefix = format!("{prefix}_");

        let mut applied = 0usize;
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(&prefix) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            builder.insert(&key.replace(ENV_SEPARATOR, ":"), Some(value));
            applied += 1;
        }
        debug!(prefix = %prefix, applied, "environment overlay applied");
    }
}

/// Parse a document into a tree builder
pub fn parse(format: ConfigFormat, content: &str) -> LoadResult<ConfigNodeBuilder> {
    let parse_error = |reason: String| LoaderError::Parse {
        format: format.as_str(),
        reason,
    };
    let mut builder = ConfigNodeBuilder::new();
    match format {
        ConfigFormat::Json => {
            let document: serde_json::Value =
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
            flatten_json(&mut builder, "", &document);
        }
        ConfigFormat::Toml => {
            let document: toml::Table = content.parse().map_err(|e: toml::de::Error| parse_error(e.to_string()))?;
            flatten_toml(&mut builder, "", &toml::Value::Table(document));
        }
        ConfigFormat::Yaml => {
            let document: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
            flatten_yaml(&mut builder, "", &document).map_err(parse_error)?;
        }
    }
    Ok(builder)
}

fn flatten_json(builder: &mut ConfigNodeBuilder, path: &str, value: &serde_json::Value) {
    use serde_json::Value;
    match value {
        Value::Null => builder.insert(path, None),
        Value::Bool(flag) => builder.insert(path, Some(flag.to_string())),
        Value::Number(number) => builder.insert(path, Some(number.to_string())),
        Value::String(text) => builder.insert(path, Some(text.clone())),
        Value::Array(items) => {
            builder.insert(path, None);
            for (index, item) in items.iter().enumerate() {
                flatten_json(builder, &join_key(path, &index.to_string()), item);
            }
        }
        Value::Object(entries) => {
            builder.insert(path, None);
            for (name, item) in entries {
                flatten_json(builder, &join_key(path, name), item);
            }
        }
    }
}

fn flatten_toml(builder: &mut ConfigNodeBuilder, path: &str, value: &toml::Value) {
    use toml::Value;
    match value {
        Value::String(text) => builder.insert(path, Some(text.clone())),
        Value::Integer(number) => builder.insert(path, Some(number.to_string())),
        Value::Float(number) => builder.insert(path, Some(number.to_string())),
        Value::Boolean(flag) => builder.insert(path, Some(flag.to_string())),
        Value::Datetime(datetime) => builder.insert(path, Some(datetime.to_string())),
        Value::Array(items) => {
            builder.insert(path, None);
            for (index, item) in items.iter().enumerate() {
                flatten_toml(builder, &join_key(path, &index.to_string()), item);
            }
        }
        Value::Table(entries) => {
            builder.insert(path, None);
            for (name, item) in entries {
                flatten_toml(builder, &join_key(path, name), item);
            }
        }
    }
}

fn flatten_yaml(builder: &mut ConfigNodeBuilder, path: &str, value: &serde_yaml::Value) -> Result<(), String> {
    use serde_yaml::Value;
    match value {
        Value::Null => builder.insert(path, None),
        Value::Bool(flag) => builder.insert(path, Some(flag.to_string())),
        Value::Number(number) => builder.insert(path, Some(number.to_string())),
        Value::String(text) => builder.insert(path, Some(text.clone())),
        Value::Sequence(items) => {
            builder.insert(path, None);
            for (index, item) in items.iter().enumerate() {
                flatten_yaml(builder, &join_key(path, &index.to_string()), item)?;
            }
        }
        Value::Mapping(entries) => {
            builder.insert(path, None);
            for (name, item) in entries {
                let name = yaml_key(name).ok_or_else(|| format!("unsupported mapping key at '{path}'"))?;
                flatten_yaml(builder, &join_key(path, &name), item)?;
            }
        }
        Value::Tagged(tagged) => flatten_yaml(builder, path, &tagged.value)?,
    }
    Ok(())
}

fn yaml_key(key: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match key {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
