//! Job configuration, loaded from TOML.
//!
//! ```toml
//! name = "persons"
//! delimiter = ","
//! fields = 3
//! exclude_prefix = "#"
//! required = [0, 1]
//!
//! [routing]
//! field = 2
//! routes = ["SALES", "ENGINEER"]
//! queue_capacity = 256
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::JobError;

/// Settings of one `batch-run` job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    /// Engine name used in logs.
    pub name: String,
    /// Field delimiter.
    pub delimiter: char,
    /// Expected number of fields; lines with another count are ignored.
    pub fields: Option<usize>,
    /// Lines starting with this prefix are filtered.
    pub exclude_prefix: Option<String>,
    /// Keep blank lines instead of filtering them.
    pub keep_blank: bool,
    /// Field indexes that must be present and non-empty.
    pub required: Vec<usize>,
    /// Stop after reading this many records.
    pub limit: Option<u64>,
    /// Content-based routing of processed records.
    pub routing: Option<RoutingConfig>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: "batch-run".to_string(),
            delimiter: ',',
            fields: None,
            exclude_prefix: Some("#".to_string()),
            keep_blank: false,
            required: Vec::new(),
            limit: None,
            routing: None,
        }
    }
}

/// Route records by the value of one field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Index of the field compared against route values.
    pub field: usize,
    /// One destination queue per value, in evaluation order. Records
    /// matching none go to a default queue.
    pub routes: Vec<String>,
    /// Capacity of every destination queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    1024
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self, JobError> {
        let content = std::fs::read_to_string(path).map_err(|e| JobError::Config {
            context: "read",
            detail: format!("'{}': {e}", path.display()),
        })?;
        Self::parse(&content).map_err(|e| match e {
            JobError::Config { context, detail } => JobError::Config {
                context,
                detail: format!("'{}': {detail}", path.display()),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, JobError> {
        toml::from_str(content).map_err(|e| JobError::Config {
            context: "parse",
            detail: e.to_string(),
        })
    }
}

impl RoutingConfig {
    pub fn new(field: usize, routes: Vec<String>) -> Self {
        Self {
            field,
            routes,
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobConfig::parse("").unwrap();
        assert_eq!(config, JobConfig::default());
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.exclude_prefix.as_deref(), Some("#"));
    }

    #[test]
    fn test_full_config() {
        let config = JobConfig::parse(
            r#"
name = "persons"
delimiter = ";"
fields = 3
required = [0, 1]
limit = 100

[routing]
field = 2
routes = ["SALES", "ENGINEER"]
"#,
        )
        .unwrap();
        assert_eq!(config.name, "persons");
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.fields, Some(3));
        assert_eq!(config.required, vec![0, 1]);
        assert_eq!(config.limit, Some(100));
        let routing = config.routing.unwrap();
        assert_eq!(routing.field, 2);
        assert_eq!(routing.routes, vec!["SALES", "ENGINEER"]);
        assert_eq!(routing.queue_capacity, 1024);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = JobConfig::parse("colour = \"blue\"").unwrap_err();
        assert!(err.to_string().starts_with("config (parse)"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JobConfig::load(&dir.path().join("job.toml")).unwrap_err();
        assert!(err.to_string().starts_with("config (read)"));
    }
}
