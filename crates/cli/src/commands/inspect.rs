use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use binding::{
    CoercionEngine, CoercionRequest, ConfigNode, ConfigStore, ConfigTree, ConfigurationLoader,
    ParameterBinder, ParameterCapability, TypeDescriptor, KEY_DELIMITER,
};
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Configuration file (.json, .toml, .yaml or .yml)
    pub file: PathBuf,

    /// Overlay environment variables PREFIX_a__b onto key a:b
    #[arg(long)]
    pub env_prefix: Option<String>,
}

impl SourceArgs {
    fn load(&self) -> Result<ConfigTree> {
        let mut loader = ConfigurationLoader::new();
        if let Some(prefix) = &self.env_prefix {
            loader.env_prefix(prefix.as_str());
        }
        let tree = loader
            .load_from_file(&self.file)
            .with_context(|| format!("loading {}", self.file.display()))?;
        info!(file = %self.file.display(), "configuration loaded");
        Ok(tree)
    }
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the tree as JSON instead of key = value lines
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    pub fn execute(&self) -> Result<()> {
        let tree = self.source.load()?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&**tree.root())?);
        } else {
            for line in flatten(tree.root(), "") {
                println!("{line}");
            }
        }
        Ok(())
    }
}

/// `key = value` for every node carrying a value, depth first
fn flatten(node: &ConfigNode, prefix: &str) -> Vec<String> {
    let mut lines = Vec::new();
    if !prefix.is_empty() && (node.value().is_some() || !node.has_children()) {
        lines.push(format!("{prefix} = {}", node.value().unwrap_or_default()));
    }
    for (name, child) in node.children() {
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}{KEY_DELIMITER}{name}")
        };
        lines.extend(flatten(child, &key));
    }
    lines
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Colon-separated key, e.g. components:0:type
    pub key: String,
}

impl GetArgs {
    pub fn execute(&self) -> Result<()> {
        let tree = self.source.load()?;
        let value = tree
            .get(&self.key)
            .ok_or_else(|| anyhow!("no value at key '{}'", self.key))?;
        println!("{value}");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct CoerceArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    pub key: String,

    /// Destination type, e.g. i32, Vec<String>, HashMap<String, bool>
    #[arg(long = "type", short = 't')]
    pub type_name: String,
}

impl CoerceArgs {
    pub fn execute(&self) -> Result<()> {
        let descriptor = TypeDescriptor::from_type_name(&self.type_name)
            .ok_or_else(|| anyhow!("unrecognised type name '{}'", self.type_name))?;
        let tree = self.source.load()?;
        let node = tree
            .section(&self.key)
            .unwrap_or_else(|| std::sync::Arc::new(ConfigNode::empty()));

        let engine = CoercionEngine::default();
        let value = engine
            .coerce(CoercionRequest::new(&node, &descriptor))
            .map_err(|err| err.at_key(&self.key))?;
        println!("{value:?}");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ParametersArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Section holding the bindings, e.g. components:0:parameters
    pub key: String,

    /// Build property bindings instead of constructor-parameter bindings
    #[arg(long)]
    pub properties: bool,
}

impl ParametersArgs {
    pub fn execute(&self) -> Result<()> {
        let tree = self.source.load()?;
        let binder = ParameterBinder::default();
        let bindings = if self.properties {
            binder.properties(&tree, &self.key)?
        } else {
            binder.parameters(&tree, &self.key)?
        };

        if bindings.is_empty() {
            println!("no bindings under '{}'", self.key);
        }
        for bound in &bindings {
            let node = bound.node();
            let shown = match node.value() {
                Some(raw) => raw.to_string(),
                None if node.has_children() => format!("<{} children>", node.child_count()),
                None => "<empty>".to_string(),
            };
            println!("{} [{}] = {shown}", bound.source_name(), bound.scope());
        }
        Ok(())
    }
}
