//! UI Configuration: the button layout a control surface renders.
//!
//! Always derived from the current job list; never persisted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Group holding one start button per discovered job.
pub const SCRIPTS_GROUP: &str = "📂 Scripts";

/// Group holding the global controls.
pub const CONTROLS_GROUP: &str = "🛑 Controls";

/// One actionable button. `payload` is sent back verbatim as the payload of
/// an envelope tagged `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiButton {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiGroup {
    pub group: String,
    pub buttons: Vec<UiButton>,
}

/// Ordered list of button groups; serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiConfig {
    pub groups: Vec<UiGroup>,
}

impl UiConfig {
    /// Build the standard layout from `(name, label)` pairs, in the given order.
    ///
    /// The scripts group comes first and is present even when empty; the
    /// controls group always carries the stop-all and reload buttons.
    pub fn for_jobs<'a, I>(jobs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let buttons = jobs
            .into_iter()
            .map(|(name, label)| UiButton {
                label: format!("▶ {label}"),
                kind: "JOB".to_string(),
                payload: json!({ "script": name, "action": "start" }),
                style: "btn-success".to_string(),
            })
            .collect();

        let controls = vec![
            UiButton {
                label: "🛑 STOP ALL".to_string(),
                kind: "JOB".to_string(),
                payload: json!({ "action": "stop_all" }),
                style: "btn-warning".to_string(),
            },
            UiButton {
                label: "♻️ RELOAD UI".to_string(),
                kind: "CMD".to_string(),
                payload: json!("reload_ui"),
                style: String::new(),
            },
        ];

        Self {
            groups: vec![
                UiGroup {
                    group: SCRIPTS_GROUP.to_string(),
                    buttons,
                },
                UiGroup {
                    group: CONTROLS_GROUP.to_string(),
                    buttons: controls,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_groups_with_start_buttons_then_controls() {
        let config = UiConfig::for_jobs([("mine", "Mine"), ("farm", "Farm")]);
        assert_eq!(config.groups.len(), 2);

        let scripts = &config.groups[0];
        assert_eq!(scripts.group, SCRIPTS_GROUP);
        let labels: Vec<_> = scripts.buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["▶ Mine", "▶ Farm"]);
        assert_eq!(
            scripts.buttons[0].payload,
            json!({"script": "mine", "action": "start"})
        );

        let controls = &config.groups[1];
        assert_eq!(controls.buttons[0].payload, json!({"action": "stop_all"}));
        assert_eq!(controls.buttons[1].kind, "CMD");
        assert_eq!(controls.buttons[1].payload, json!("reload_ui"));
    }

    #[test]
    fn serializes_as_array() {
        let value = serde_json::to_value(UiConfig::for_jobs([])).unwrap();
        let groups = value.as_array().expect("array payload");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["buttons"], json!([]));
        assert_eq!(groups[1]["buttons"][0]["type"], "JOB");
    }
}
