//! File-backed preference store: a flat JSON object of key → value.

use std::path::PathBuf;

use chrono::Utc;

use livedelay_core::{PreferenceError, PreferenceStore};

const UPDATED_AT_KEY: &str = "updated_at";

#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
    values: serde_json::Map<String, serde_json::Value>,
}

impl FilePreferenceStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => serde_json::Map::new(),
            Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(_) => {
                    return Err(PreferenceError::Malformed(format!(
                        "{} is not a JSON object",
                        path.display()
                    )));
                }
                Err(e) => {
                    return Err(PreferenceError::Malformed(format!("{}: {e}", path.display())));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
            Err(e) => return Err(PreferenceError::Io(e)),
        };
        Ok(Self { path, values })
    }

    /// Write atomically: temp file in the same directory, then rename.
    fn persist(
        &self,
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), PreferenceError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(values)
            .map_err(|e| PreferenceError::Malformed(e.to_string()))?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get_u64(&self, key: &str) -> Result<Option<u64>, PreferenceError> {
        match self.values.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| PreferenceError::InvalidValue {
                    key: key.to_string(),
                }),
        }
    }

    fn set_u64(&mut self, key: &str, value: u64) -> Result<(), PreferenceError> {
        // Memory only changes once the file has it
        let mut next = self.values.clone();
        next.insert(key.to_string(), value.into());
        next.insert(UPDATED_AT_KEY.to_string(), Utc::now().to_rfc3339().into());
        self.persist(&next)?;
        self.values = next;
        Ok(())
    }
}
