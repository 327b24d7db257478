/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Settings namespace in `workspace/didChangeConfiguration` payloads.
pub const SETTINGS_NAMESPACE: &str = "pyls_bridge";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Host interpreter for the analysis worker and mypy (default: python3)
    #[serde(default = "default_python")]
    pub python: String,

    /// Command replacing the embedded worker script, as program plus arguments
    #[serde(default)]
    pub worker_command: Option<Vec<String>>,

    /// Initial validation settings
    #[serde(default)]
    pub settings: Settings,
}

fn default_python() -> String {
    "python3".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            python: default_python(),
            worker_command: None,
            settings: Settings::default(),
        }
    }
}

impl Config {
    /// Load configuration from standard paths or a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or has the wrong shape.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Start with defaults
        builder = builder.set_default("python", default_python())?;

        // 2. Load from user config directory (~/.config/pyls-bridge/config.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("pyls-bridge").join("config.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        // 3. Load from explicit file if provided
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 4. Load from environment variables (PYLS_BRIDGE_PYTHON, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("PYLS_BRIDGE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("worker_command")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config.try_deserialize().context("Failed to deserialize configuration")
    }
}

/// Validation settings, replaceable key by key at runtime.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// pyflakes message categories reported as errors instead of warnings.
    pub pyflakes_errors: Vec<String>,
    /// Extra pycodestyle configuration file, read after the project's own.
    pub pycodestyle_config: Option<PathBuf>,
    /// Hover shows full help rather than inferred values.
    pub help_on_hover: bool,
    /// Run mypy on every validation pass.
    pub mypy_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pyflakes_errors: vec!["UndefinedName".to_string()],
            pycodestyle_config: None,
            help_on_hover: true,
            mypy_enabled: false,
        }
    }
}

/// Which settings keys an update touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub pyflakes_errors: bool,
    pub pycodestyle_config: bool,
    pub help_on_hover: bool,
    pub mypy_enabled: bool,
}

impl SettingsChange {
    /// Whether open documents need to be validated again.
    ///
    /// Only `help_on_hover` leaves diagnostics unaffected.
    #[must_use]
    pub const fn needs_revalidation(&self) -> bool {
        self.pyflakes_errors || self.pycodestyle_config || self.mypy_enabled
    }
}

impl Settings {
    /// Replaces every key present in `update`, leaving the others alone.
    ///
    /// A key counts as changed when it is present, even if its value is the
    /// same as before.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first key whose value has the wrong type;
    /// no key is applied in that case.
    pub fn apply(&mut self, update: &serde_json::Map<String, serde_json::Value>) -> Result<SettingsChange> {
        let mut next = self.clone();
        let mut change = SettingsChange::default();

        if let Some(value) = update.get("pyflakes_errors") {
            next.pyflakes_errors = parse_key("pyflakes_errors", value)?;
            change.pyflakes_errors = true;
        }
        if let Some(value) = update.get("pycodestyle_config") {
            next.pycodestyle_config = parse_key("pycodestyle_config", value)?;
            change.pycodestyle_config = true;
        }
        if let Some(value) = update.get("help_on_hover") {
            next.help_on_hover = parse_key("help_on_hover", value)?;
            change.help_on_hover = true;
        }
        if let Some(value) = update.get("mypy_enabled") {
            next.mypy_enabled = parse_key("mypy_enabled", value)?;
            change.mypy_enabled = true;
        }

        *self = next;
        Ok(change)
    }
}

fn parse_key<T: serde::de::DeserializeOwned>(key: &str, value: &serde_json::Value) -> Result<T> {
    serde_json::from_value(value.clone()).with_context(|| format!("Invalid value for setting '{key}'"))
}

/// Revision counters for caches derived from [`Settings`].
///
/// A cache entry records the revision it was computed under and is stale
/// once the counter has moved on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsRevision {
    /// Bumped when the pycodestyle override file changes.
    pub style: u64,
    /// Bumped when mypy is switched on or off.
    pub type_check: u64,
}

impl SettingsRevision {
    /// Advances the counters affected by `change`.
    pub const fn bump(&mut self, change: SettingsChange) {
        if change.pycodestyle_config {
            self.style += 1;
        }
        if change.mypy_enabled {
            self.type_check += 1;
        }
    }
}
