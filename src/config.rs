// Credential bundle and configuration loading.
//
// Configuration is layered: an optional JSON file, then environment
// variables and command-line flags (both surfaced through `clap` in the
// binary). Each layer is a `FileConfig` of optional fields and later
// layers win. `FileConfig::resolve` fills in defaults and produces the
// `Settings` the synchronizer is built from.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{io_err, ConfigError, PreconditionError};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_REMOTE_DIR: &str = "assets/images";

/// Tokens shorter than this are almost certainly placeholders.
const MIN_PLAUSIBLE_TOKEN_LEN: usize = 10;

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_base: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
    pub branch: Option<String>,
    pub remote_dir: Option<String>,
}

impl FileConfig {
    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, else the default location if a file exists
    /// there, else an empty layer.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => match default_config_path() {
                Some(p) if p.is_file() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: FileConfig) -> FileConfig {
        FileConfig {
            api_base: other.api_base.or(self.api_base),
            owner: other.owner.or(self.owner),
            repo: other.repo.or(self.repo),
            token: other.token.or(self.token),
            branch: other.branch.or(self.branch),
            remote_dir: other.remote_dir.or(self.remote_dir),
        }
    }

    /// Apply defaults. Missing owner/repo/token resolve to empty strings and
    /// are rejected later by [`Credentials::validate`].
    pub fn resolve(self) -> Settings {
        let api_base = self
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let remote_dir = self
            .remote_dir
            .unwrap_or_else(|| DEFAULT_REMOTE_DIR.to_string())
            .trim_matches('/')
            .to_string();
        Settings {
            credentials: Credentials {
                api_base,
                owner: self.owner.unwrap_or_default(),
                repo: self.repo.unwrap_or_default(),
                token: self.token.unwrap_or_default().trim().to_string(),
                branch: self.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            },
            remote_dir,
        }
    }
}

/// `{config_dir}/asset-publish/config.json`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("asset-publish").join("config.json"))
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub credentials: Credentials,
    /// Directory inside the repository that assets are published under.
    pub remote_dir: String,
}

/// Where to publish and how to authenticate. Immutable for a run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub branch: String,
}

// Keep the token out of debug logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.masked_token())
            .field("branch", &self.branch)
            .finish()
    }
}

impl Credentials {
    /// Checks that must hold before the first request is sent.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        if self.token.trim().is_empty() {
            return Err(PreconditionError::MissingToken);
        }
        if !self.token.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(PreconditionError::InvalidToken);
        }
        let api_base_ok = reqwest::Url::parse(&self.api_base)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !api_base_ok {
            return Err(PreconditionError::InvalidApiBase(self.api_base.clone()));
        }
        if self.owner.trim().is_empty() {
            return Err(PreconditionError::MissingField("owner"));
        }
        if self.repo.trim().is_empty() {
            return Err(PreconditionError::MissingField("name"));
        }
        if self.branch.trim().is_empty() {
            return Err(PreconditionError::MissingField("branch"));
        }
        Ok(())
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// First and last four characters of the token, for display.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }

    pub fn looks_like_placeholder(&self) -> bool {
        self.token.chars().count() < MIN_PLAUSIBLE_TOKEN_LEN
    }

    /// Browsable web URL of `dir` on the target branch.
    pub fn tree_url(&self, dir: &str) -> String {
        let web_base = if let Some(host) = self.api_base.strip_suffix("/api/v3") {
            host.to_string()
        } else {
            self.api_base.replacen("://api.", "://", 1)
        };
        format!(
            "{}/{}/{}/tree/{}/{}",
            web_base, self.owner, self.repo, self.branch, dir
        )
    }
}
