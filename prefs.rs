/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! User preferences, loaded from TOML with environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

pub const LOG_ENV: &str = "SPLITLINK_LOG";
pub const HISTORY_INTERCEPTION_ENV: &str = "SPLITLINK_HISTORY_INTERCEPTION";

/// Toolbar titles for the three presentation states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionTitles {
    pub not_split: String,
    pub off: String,
    pub on: String,
}

impl Default for ActionTitles {
    fn default() -> Self {
        Self {
            not_split: "Split Link (split view not active)".to_string(),
            off: "Split Link: off (click to enable)".to_string(),
            on: "Split Link: on (click to disable)".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitLinkPrefs {
    pub action_titles: ActionTitles,
    /// When false the interceptor never wraps history mutations.
    pub history_interception: bool,
    pub log_filter: Option<String>,
}

impl Default for SplitLinkPrefs {
    fn default() -> Self {
        Self {
            action_titles: ActionTitles::default(),
            history_interception: true,
            log_filter: None,
        }
    }
}

/// The slice of preferences an interceptor is installed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorPrefs {
    pub history_interception: bool,
}

impl Default for InterceptorPrefs {
    fn default() -> Self {
        Self {
            history_interception: true,
        }
    }
}

#[derive(Debug)]
pub enum PrefsError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl std::fmt::Display for PrefsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "could not read prefs {}: {message}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "could not parse prefs {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for PrefsError {}

impl SplitLinkPrefs {
    pub fn load(path: &Path) -> Result<Self, PrefsError> {
        let text = fs::read_to_string(path).map_err(|e| PrefsError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| PrefsError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Defaults when `path` is `None`, then environment overrides on top.
    pub fn resolve(path: Option<&Path>) -> Result<Self, PrefsError> {
        let mut prefs = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        prefs.apply_env_overrides();
        Ok(prefs)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(filter) = env::var(LOG_ENV)
            && !filter.trim().is_empty()
        {
            self.log_filter = Some(filter.trim().to_string());
        }
        if let Ok(value) = env::var(HISTORY_INTERCEPTION_ENV) {
            match parse_env_flag(&value) {
                Some(flag) => self.history_interception = flag,
                None => warn!("{HISTORY_INTERCEPTION_ENV} invalid ('{value}'); keeping {}", self.history_interception),
            }
        }
    }

    pub fn interceptor_prefs(&self) -> InterceptorPrefs {
        InterceptorPrefs {
            history_interception: self.history_interception,
        }
    }
}

fn parse_env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_enable_history_interception() {
        let prefs = SplitLinkPrefs::default();
        assert!(prefs.history_interception);
        assert!(prefs.interceptor_prefs().history_interception);
        assert!(prefs.log_filter.is_none());
    }

    #[test]
    fn test_load_partial_toml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "history_interception = false\n\n[action_titles]\non = \"armed\"\n"
        )
        .unwrap();

        let prefs = SplitLinkPrefs::load(file.path()).unwrap();
        assert!(!prefs.history_interception);
        assert_eq!(prefs.action_titles.on, "armed");
        assert_eq!(prefs.action_titles.off, ActionTitles::default().off);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "history_interception = \"sometimes\"").unwrap();

        let err = SplitLinkPrefs::load(file.path()).unwrap_err();
        assert!(matches!(err, PrefsError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SplitLinkPrefs::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, PrefsError::Io { .. }));
    }

    #[test]
    fn test_parse_env_flag() {
        assert_eq!(parse_env_flag(" On "), Some(true));
        assert_eq!(parse_env_flag("0"), Some(false));
        assert_eq!(parse_env_flag("maybe"), None);
    }
}
