use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use azrm_core::ResourceState;
use serde::{Deserialize, Serialize};

const VERSION: u32 = 1;

/// The local state file: one entry per managed resource address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub state: ResourceState,
}

impl Default for StateFile {
    fn default() -> Self { Self { version: VERSION, resources: BTreeMap::new() } }
}

impl StateFile {
    /// A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let state: StateFile = serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))?;
        if state.version != VERSION {
            anyhow::bail!("{}: unsupported state version {}", path.display(), state.version);
        }
        Ok(state)
    }

    /// Writes to a sibling temp file and renames it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.write_all(b"\n")?;
        tmp.persist(path).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&Entry> { self.resources.get(address) }

    pub fn put(&mut self, address: String, type_name: &str, state: ResourceState) {
        self.resources.insert(address, Entry { type_name: type_name.to_string(), state });
    }

    pub fn remove(&mut self, address: &str) -> Option<Entry> { self.resources.remove(address) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rg() -> ResourceState {
        ResourceState::new("/subscriptions/0/resourceGroups/rg1", json!({ "name": "rg1", "location": "westeurope" }).as_object().cloned().unwrap())
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("azrm.state.json")).unwrap();
        assert_eq!(state, StateFile::default());
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let mut state = StateFile::default();
        state.put("azurerm_resource_group.main".into(), "azurerm_resource_group", rg());
        state.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["resources"]["azurerm_resource_group.main"]["type"], json!("azurerm_resource_group"));
        assert_eq!(raw["resources"]["azurerm_resource_group.main"]["id"], json!("/subscriptions/0/resourceGroups/rg1"));

        let mut loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.get("azurerm_resource_group.main").unwrap().state, rg());
        assert!(loaded.remove("azurerm_resource_group.main").is_some());
        assert!(loaded.get("azurerm_resource_group.main").is_none());
    }

    #[test]
    fn other_versions_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        std::fs::write(&path, r#"{ "version": 7, "resources": {} }"#).unwrap();
        assert!(StateFile::load(&path).unwrap_err().to_string().contains("unsupported state version 7"));
    }
}
