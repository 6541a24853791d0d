use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::gemini::{DEFAULT_MODEL, GeminiClient};

/// `~/.soru`, falling back to the working directory when `HOME` is unset.
pub fn soru_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".soru")
}

/// Persisted settings (`~/.soru/config.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoruConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firebase_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firebase_project_id: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for SoruConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: default_model(),
            gemini_base_url: None,
            firebase_api_key: None,
            firebase_project_id: None,
        }
    }
}

impl SoruConfig {
    pub fn config_path() -> PathBuf {
        soru_home().join("config.json")
    }

    /// Load from ~/.soru/config.json.
    pub fn load() -> Option<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        if let Ok(data) = std::fs::read_to_string(path)
            && let Ok(config) = serde_json::from_str(&data)
        {
            return Some(config);
        }
        None
    }

    /// Save to ~/.soru/config.json (mode 0o600)
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let data = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        write_private(path, &data)
    }

    /// Delete ~/.soru/config.json
    pub fn clear() -> Result<(), std::io::Error> {
        remove_if_exists(&Self::config_path())
    }

    /// Client for the configured model, if an API key is known.
    pub fn gemini_client(&self) -> Option<GeminiClient> {
        let key = self.gemini_api_key.as_deref().filter(|k| !k.is_empty())?;
        let mut client = GeminiClient::new(key).with_model(&self.model);
        if let Some(base) = &self.gemini_base_url {
            client = client.with_base_url(base);
        }
        Some(client)
    }

    /// Both Firebase settings are present.
    pub fn firebase(&self) -> Option<(&str, &str)> {
        match (&self.firebase_api_key, &self.firebase_project_id) {
            (Some(key), Some(project)) if !key.is_empty() && !project.is_empty() => {
                Some((key.as_str(), project.as_str()))
            }
            _ => None,
        }
    }
}

/// Refresh token of the signed-in user, so the next launch can restore the
/// session without asking for the password again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub refresh_token: String,
}

#[derive(Clone, Debug)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.soru/session.json`
    pub fn default_location() -> Self {
        Self::new(soru_home().join("session.json"))
    }

    pub fn load(&self) -> Option<SavedSession> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn save(&self, session: &SavedSession) -> Result<(), std::io::Error> {
        let data = serde_json::to_string_pretty(session).map_err(std::io::Error::other)?;
        write_private(&self.path, &data)
    }

    pub fn clear(&self) -> Result<(), std::io::Error> {
        remove_if_exists(&self.path)
    }
}

fn write_private(path: &Path, data: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), std::io::Error> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SoruConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SoruConfig::default());
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!(config.gemini_client().is_none());
        assert!(config.firebase().is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = SoruConfig {
            gemini_api_key: Some("g-key".into()),
            firebase_api_key: Some("f-key".into()),
            firebase_project_id: Some("okul".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(SoruConfig::load_from(&path), Some(config.clone()));
        assert_eq!(config.firebase(), Some(("f-key", "okul")));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn garbage_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SoruConfig::load_from(&path).is_none());
    }

    #[test]
    fn session_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().is_none());

        let saved = SavedSession {
            uid: "u1".into(),
            email: Some("a@b.c".into()),
            refresh_token: "r1".into(),
        };
        file.save(&saved).unwrap();
        assert_eq!(file.load(), Some(saved));

        file.clear().unwrap();
        assert!(file.load().is_none());
        file.clear().unwrap();
    }
}
