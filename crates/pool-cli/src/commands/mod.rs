pub mod inspect;
pub mod solve;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use pool_core::instance::load_instance;
use pool_core::NetworkModel;

/// Load and validate an instance file.
pub fn load_network(path: &Path) -> Result<NetworkModel> {
    let raw = load_instance(path)
        .with_context(|| format!("loading instance {}", path.display()))?;
    NetworkModel::from_raw(&raw)
        .with_context(|| format!("validating instance {}", path.display()))
}
