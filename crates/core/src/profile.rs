//! Profile management
//!
//! Profiles are named connection settings for an S3-compatible endpoint.
//! Exactly one profile is used per invocation.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Request signing scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureVersion {
    V2,
    #[default]
    V4,
}

impl std::fmt::Display for SignatureVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureVersion::V2 => write!(f, "v2"),
            SignatureVersion::V4 => write!(f, "v4"),
        }
    }
}

/// Connection settings for one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Name of the profile (the key of its table in the file)
    #[serde(skip)]
    pub name: String,

    /// Endpoint host, optionally with scheme and port
    pub endpoint: String,

    /// Access key ID
    pub access_key_id: String,

    /// Secret access key
    pub secret_access_key: String,

    /// Use HTTPS when the endpoint carries no scheme
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,

    /// Signature version
    #[serde(default)]
    pub signature: SignatureVersion,

    /// Region used for signing
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_use_ssl() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Profile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            use_ssl: default_use_ssl(),
            signature: SignatureVersion::default(),
            region: default_region(),
        }
    }

    /// Endpoint as a URL, adding a scheme according to `use_ssl` if missing
    pub fn endpoint_url(&self) -> Result<Url> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config(format!(
                "profile '{}' has an empty endpoint",
                self.name
            )));
        }

        let url = if endpoint.contains("://") {
            Url::parse(endpoint)?
        } else {
            let scheme = if self.use_ssl { "https" } else { "http" };
            Url::parse(&format!("{scheme}://{endpoint}"))?
        };
        Ok(url)
    }

    /// Secret key with all but its first and last two characters hidden
    pub fn masked_secret(&self) -> String {
        mask_secret(&self.secret_access_key)
    }
}

/// Hide a secret for display
///
/// Secrets of four characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }

    let mut masked: String = chars[..2].iter().collect();
    masked.push_str(&"*".repeat(chars.len() - 4));
    masked.extend(&chars[chars.len() - 2..]);
    masked
}

/// Manager for profile operations
#[derive(Debug, Clone)]
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    /// List all configured profiles, sorted by name
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles.into_values().collect())
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Add or update a profile
    pub fn set(&self, profile: Profile) -> Result<()> {
        let mut config = self.config_manager.load()?;
        config.profiles.insert(profile.name.clone(), profile);
        self.config_manager.save(&config)
    }

    /// Name of the profile recorded as current, if it exists
    pub fn current_name(&self) -> Result<Option<String>> {
        let config = self.config_manager.load()?;
        Ok(config
            .current
            .filter(|name| config.profiles.contains_key(name)))
    }

    /// Resolve the profile to use for this invocation
    ///
    /// An explicit name wins; otherwise the current profile, otherwise the
    /// first profile by name.
    pub fn select(&self, explicit: Option<&str>) -> Result<Profile> {
        if let Some(name) = explicit {
            return self.get(name);
        }

        let config = self.config_manager.load()?;
        if let Some(profile) = config
            .current
            .as_deref()
            .and_then(|name| config.profiles.get(name))
        {
            return Ok(profile.clone());
        }

        config.profiles.into_values().next().ok_or_else(|| {
            Error::Config(format!(
                "no profiles configured in {}. Run 's3ctl config init' and edit the file",
                self.config_manager.config_path().display()
            ))
        })
    }

    /// Record `name` as the current profile
    pub fn use_profile(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        if !config.profiles.contains_key(name) {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        config.current = Some(name.to_string());
        self.config_manager.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_profile_manager() -> (ProfileManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_manager = ConfigManager::with_path(config_path);
        let profile_manager = ProfileManager::with_config_manager(config_manager);
        (profile_manager, temp_dir)
    }

    #[test]
    fn test_profile_new() {
        let profile = Profile::new("test", "localhost:9000", "access", "secret");
        assert_eq!(profile.name, "test");
        assert_eq!(profile.region, "us-east-1");
        assert_eq!(profile.signature, SignatureVersion::V4);
        assert!(profile.use_ssl);
    }

    #[test]
    fn test_endpoint_url() {
        let mut profile = Profile::new("p", "play.min.io", "a", "b");
        assert_eq!(profile.endpoint_url().unwrap().as_str(), "https://play.min.io/");

        profile.use_ssl = false;
        profile.endpoint = "127.0.0.1:9000".into();
        assert_eq!(
            profile.endpoint_url().unwrap().as_str(),
            "http://127.0.0.1:9000/"
        );

        profile.endpoint = "https://s3.example.com".into();
        assert_eq!(profile.endpoint_url().unwrap().scheme(), "https");

        profile.endpoint = "  ".into();
        assert!(matches!(profile.endpoint_url(), Err(Error::Config(_))));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "****");
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret("abcde"), "ab*de");
        assert_eq!(mask_secret("THISISSECRETKEY"), "TH***********EY");
    }

    #[test]
    fn test_select_prefers_explicit() {
        let (manager, _temp_dir) = temp_profile_manager();
        manager.set(Profile::new("a", "a:9000", "a", "a")).unwrap();
        manager.set(Profile::new("b", "b:9000", "b", "b")).unwrap();
        manager.use_profile("a").unwrap();

        assert_eq!(manager.select(Some("b")).unwrap().name, "b");
        assert_eq!(manager.select(None).unwrap().name, "a");
        assert!(matches!(
            manager.select(Some("zzz")),
            Err(Error::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let (manager, _temp_dir) = temp_profile_manager();
        manager.set(Profile::new("zeta", "z:9000", "z", "z")).unwrap();
        manager.set(Profile::new("alpha", "a:9000", "a", "a")).unwrap();

        assert_eq!(manager.select(None).unwrap().name, "alpha");
        assert!(manager.current_name().unwrap().is_none());
    }

    #[test]
    fn test_select_without_profiles() {
        let (manager, _temp_dir) = temp_profile_manager();
        let err = manager.select(None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("config init"));
    }

    #[test]
    fn test_use_profile_unknown() {
        let (manager, _temp_dir) = temp_profile_manager();
        manager.set(Profile::new("a", "a:9000", "a", "a")).unwrap();
        assert!(matches!(
            manager.use_profile("missing"),
            Err(Error::ProfileNotFound(_))
        ));
        assert!(manager.current_name().unwrap().is_none());
    }

    #[test]
    fn test_list_sorted() {
        let (manager, _temp_dir) = temp_profile_manager();
        manager.set(Profile::new("b", "b:9000", "b", "b")).unwrap();
        manager.set(Profile::new("a", "a:9000", "a", "a")).unwrap();
        let names: Vec<String> = manager.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
