// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Resolve symbolic section icons to local assets.
//!
//! Icon names arrive as plain data from the host. They are only ever looked
//! up here; a name that could escape the asset directory resolves to the
//! fallback.

use std::collections::HashMap;

/// Asset used for unknown or unusable icon names.
pub const FALLBACK_ICON: &str = "svg/settings-gear-63.svg";

/// Name → asset path.
#[derive(Debug, Clone)]
pub struct IconRegistry {
    base: String,
    fallback: String,
    overrides: HashMap<String, String>,
}

impl Default for IconRegistry {
    fn default() -> Self {
        Self::new("svg")
    }
}

impl IconRegistry {
    /// Registry resolving `name` to `<base>/<name>.svg`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            fallback: FALLBACK_ICON.to_owned(),
            overrides: HashMap::new(),
        }
    }

    /// Use `path` for unresolvable names.
    pub fn with_fallback(mut self, path: impl Into<String>) -> Self {
        self.fallback = path.into();
        self
    }

    /// Map `name` to an explicit asset.
    pub fn register(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.overrides.insert(name.into(), path.into());
    }

    /// Asset path for `name`.
    pub fn resolve(&self, name: &str) -> String {
        if let Some(path) = self.overrides.get(name) {
            return path.clone();
        }
        let usable = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if usable {
            format!("{}/{name}.svg", self.base)
        } else {
            self.fallback.clone()
        }
    }
}
