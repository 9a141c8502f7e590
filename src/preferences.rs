use crate::storage::{read_soft, KeyValueStorage};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const THEME_STORAGE_KEY: &str = "rag_theme";
pub const LEFT_PANEL_STORAGE_KEY: &str = "leftPanelCollapsed";
pub const RIGHT_PANEL_STORAGE_KEY: &str = "rightPanelCollapsed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}' (expected light or dark)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Left,
    Right,
}

impl Panel {
    fn storage_key(self) -> &'static str {
        match self {
            Panel::Left => LEFT_PANEL_STORAGE_KEY,
            Panel::Right => RIGHT_PANEL_STORAGE_KEY,
        }
    }
}

#[derive(Clone)]
pub struct Preferences {
    storage: Arc<dyn KeyValueStorage>,
}

impl Preferences {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn theme(&self) -> Theme {
        read_soft(self.storage.as_ref(), THEME_STORAGE_KEY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Theme {
        if let Err(err) = self.storage.set(THEME_STORAGE_KEY, theme.as_str()) {
            tracing::warn!(error = %err, "failed to persist theme");
        }
        theme
    }

    pub fn toggle_theme(&self) -> Theme {
        self.set_theme(self.theme().toggled())
    }

    pub fn panel_collapsed(&self, panel: Panel) -> bool {
        read_soft(self.storage.as_ref(), panel.storage_key())
            .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
            .unwrap_or(false)
    }

    pub fn toggle_panel(&self, panel: Panel) -> bool {
        let collapsed = !self.panel_collapsed(panel);
        let raw = if collapsed { "true" } else { "false" };
        if let Err(err) = self.storage.set(panel.storage_key(), raw) {
            tracing::warn!(error = %err, ?panel, "failed to persist panel state");
        }
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn theme_defaults_to_light_and_toggles() {
        let storage = Arc::new(MemoryStorage::new());
        let prefs = Preferences::new(storage.clone());
        assert_eq!(prefs.theme(), Theme::Light);
        assert_eq!(prefs.toggle_theme(), Theme::Dark);
        assert_eq!(storage.get(THEME_STORAGE_KEY).unwrap().as_deref(), Some("dark"));
        assert_eq!(prefs.toggle_theme(), Theme::Light);
    }

    #[test]
    fn unknown_theme_reads_as_light() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(THEME_STORAGE_KEY, "solarized").unwrap();
        assert_eq!(Preferences::new(storage).theme(), Theme::Light);
    }

    #[test]
    fn panels_toggle_independently_and_tolerate_garbage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(RIGHT_PANEL_STORAGE_KEY, "{{").unwrap();
        let prefs = Preferences::new(storage);

        assert!(!prefs.panel_collapsed(Panel::Right));
        assert!(prefs.toggle_panel(Panel::Left));
        assert!(prefs.panel_collapsed(Panel::Left));
        assert!(!prefs.panel_collapsed(Panel::Right));
        assert!(!prefs.toggle_panel(Panel::Left));
    }
}
