// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in schema served when no `schema` document has been stored.

use prefs_app_core::Preferences;
use prefs_schema::{SchemaError, Section};
use serde_json::json;

/// Channel of the demo button; the bundled binary logs when it fires.
pub const DEMO_BUTTON_CHANNEL: &str = "do-action-on-main";

/// Demo sections, one per built-in field kind family.
pub fn sections() -> Result<Vec<Section>, SchemaError> {
    let raw = json!([
        {
            "id": "about",
            "label": "About You",
            "icon": "single-01",
            "fields": [
                {"key": "name", "type": "text", "label": "Name", "help": "Your name"},
                {"key": "age", "type": "number", "label": "Age", "min": 0, "max": 150},
                {"key": "tags", "type": "map", "label": "Tags",
                 "key_label": "Tag", "value_label": "Value"}
            ]
        },
        {
            "id": "theme",
            "label": "Theme",
            "icon": "palette",
            "fields": [
                {"key": "theme", "type": "dropdown", "label": "Appearance",
                 "options": [
                     {"label": "Follow system", "value": "system"},
                     {"label": "Light", "value": "light"},
                     {"label": "Dark", "value": "dark"}
                 ]}
            ]
        },
        {
            "id": "security",
            "label": "Security",
            "icon": "lock",
            "fields": [
                {"key": "token", "type": "secret", "label": "API token"}
            ]
        },
        {
            "id": "files",
            "label": "Files",
            "icon": "folder",
            "fields": [
                {"key": "workspace", "type": "directory", "label": "Workspace"},
                {"key": "avatar", "type": "file", "label": "Avatar",
                 "filters": [{"name": "Images", "extensions": ["png", "jpg"]}]},
                {"key": "notify", "type": "checkbox", "label": "Notify on change"}
            ]
        },
        {
            "id": "actions",
            "label": "Actions",
            "icon": "spaceship",
            "fields": [
                {"key": "run", "type": "button", "label": "Run on host",
                 "channel": DEMO_BUTTON_CHANNEL}
            ]
        },
        {
            "id": "lab",
            "label": "Experiments",
            "icon": "flask",
            "enabled": false,
            "fields": []
        }
    ]);
    serde_json::from_value(raw).map_err(|e| SchemaError::Malformed(e.to_string()))
}

/// Defaults that go with [`sections`].
pub fn defaults() -> Preferences {
    let mut doc = Preferences::new();
    doc.set_field("about", "name", json!(""));
    doc.set_field("theme", "theme", json!("system"));
    doc.set_field("files", "notify", json!(false));
    doc
}
