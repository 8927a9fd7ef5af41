//! Raw instance records as read from disk.
//!
//! A [`RawInstance`] is the unvalidated input: unit names, capacities, prices,
//! qualities and the list of existing pipes. [`crate::NetworkModel::from_raw`]
//! validates it and computes the derived quantities.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dat;
use crate::error::{PoolError, PoolResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSource {
    pub name: String,
    pub capacity: f64,
    /// Unit purchase cost
    pub cost: f64,
    /// Concentration per contaminant
    pub quality: Vec<f64>,
}

impl RawSource {
    pub fn new(name: &str, capacity: f64, cost: f64, quality: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            cost,
            quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPool {
    pub name: String,
    pub capacity: f64,
}

impl RawPool {
    pub fn new(name: &str, capacity: f64) -> Self {
        Self {
            name: name.to_string(),
            capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDemand {
    pub name: String,
    pub capacity: f64,
    /// Unit selling price
    pub revenue: f64,
    pub min_quality: Vec<f64>,
    pub max_quality: Vec<f64>,
    /// Per-contaminant activity of the minimum bound; all active when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_min: Option<Vec<bool>>,
    /// Per-contaminant activity of the maximum bound; all active when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_max: Option<Vec<bool>>,
}

impl RawDemand {
    pub fn new(
        name: &str,
        capacity: f64,
        revenue: f64,
        min_quality: Vec<f64>,
        max_quality: Vec<f64>,
    ) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            revenue,
            min_quality,
            max_quality,
            active_min: None,
            active_max: None,
        }
    }
}

/// Unvalidated pooling instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstance {
    pub name: String,
    pub contaminants: Vec<String>,
    pub sources: Vec<RawSource>,
    pub pools: Vec<RawPool>,
    pub demands: Vec<RawDemand>,
    /// Existing pipes as `(from, to)` unit names
    pub pipes: Vec<(String, String)>,
}

/// Instance file formats understood by [`load_instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceFormat {
    Json,
    Dat,
}

impl InstanceFormat {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> PoolResult<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Ok(InstanceFormat::Json),
            Some("dat") => Ok(InstanceFormat::Dat),
            other => Err(PoolError::Parse(format!(
                "unsupported instance format '{}'; supported extensions: json, dat",
                other.unwrap_or("")
            ))),
        }
    }
}

/// Load an instance from a `.json` or `.dat` file.
///
/// `.dat` files carry no instance name, so the file stem is used.
pub fn load_instance(path: impl AsRef<Path>) -> PoolResult<RawInstance> {
    let path = path.as_ref();
    let format = InstanceFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "loading instance");

    match format {
        InstanceFormat::Json => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        InstanceFormat::Dat => {
            let contents = std::fs::read_to_string(path)?;
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("instance");
            dat::parse_dat(name, &contents)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn json_instance_roundtrips_through_file() {
        let raw = RawInstance {
            name: "json-case".to_string(),
            contaminants: vec!["c1".to_string()],
            sources: vec![RawSource::new("s1", 10.0, 1.0, vec![0.5])],
            pools: vec![RawPool::new("p1", 10.0)],
            demands: vec![RawDemand::new("d1", 10.0, 2.0, vec![0.0], vec![1.0])],
            pipes: vec![("s1".into(), "p1".into()), ("p1".into(), "d1".into())],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&raw).unwrap().as_bytes())
            .unwrap();

        let loaded = load_instance(&path).unwrap();
        assert_eq!(loaded, raw);
    }

    #[test]
    fn activity_flags_default_to_none() {
        let json = r#"{"name":"d","capacity":5,"revenue":1,"min_quality":[0],"max_quality":[2]}"#;
        let demand: RawDemand = serde_json::from_str(json).unwrap();
        assert!(demand.active_min.is_none());
        assert!(demand.active_max.is_none());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = InstanceFormat::from_path(Path::new("case.xlsx")).unwrap_err();
        assert!(err.to_string().contains("unsupported instance format"));
    }
}
