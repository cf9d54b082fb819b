//! Validate and compile sprig configuration files.

use super::CliError;
use crate::schema::Schema;
use crate::{compiler, from_yaml, output};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// YAML configuration text
    pub config: String,
    /// Optional YAML schema text (column name -> type name)
    pub schema: Option<String>,
    /// Only validate, don't report the parsed forms
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Validation passed
    SyntaxValid,
    /// Parsed successfully; canonical forms keyed by result name
    Parsed(serde_json::Value),
}

fn load_schema(text: Option<&str>) -> Result<Option<Schema>, CliError> {
    match text {
        Some(text) => Ok(Some(Schema::from_yaml_str(text)?)),
        None => Ok(None),
    }
}

/// Parse (and, with a schema, validate) a configuration.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let schema = load_schema(options.schema.as_deref())?;
    let nodes = from_yaml(&options.config, schema.as_ref())?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let forms = nodes
        .iter()
        .map(|(name, node)| (name.clone(), output::to_json(node)))
        .collect::<serde_json::Map<String, serde_json::Value>>();
    Ok(CheckResult::Parsed(serde_json::Value::Object(forms)))
}

/// Lower a configuration and render each expression's debug form plus the
/// columns it reads.
pub fn execute_compile(
    config: &str,
    schema_text: Option<&str>,
) -> Result<Vec<(String, String, Vec<String>)>, CliError> {
    let schema = load_schema(schema_text)?;
    let nodes = from_yaml(config, schema.as_ref())?;

    let mut out = Vec::new();
    for (name, node) in &nodes {
        let lowered = compiler::lower(node).map_err(crate::Error::from)?;
        out.push((
            name.clone(),
            format!("{:?}", lowered.expr),
            lowered.columns.into_iter().collect(),
        ));
    }
    Ok(out)
}
