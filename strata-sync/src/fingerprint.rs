//! SHA-256 fingerprint of a section list, used to tell whether a unit of
//! work changed a target's effective layout.

use sha2::{Digest, Sha256};

use strata_core::Section;

use crate::SyncError;

/// Hex SHA-256 of the YAML rendering of `sections`.
pub fn fingerprint(sections: &[Section]) -> Result<String, SyncError> {
    let yaml = serde_yaml::to_string(sections)?;
    let mut hasher = Sha256::new();
    hasher.update(yaml.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
