use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "/chat";
pub const DEFAULT_TITLE: &str = "Civic Chat";
pub const DEFAULT_WELCOME: &str = "Hello! How can I help you today?";
pub const DEFAULT_LANG: &str = "en";

/// The host element the widget is configured from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountElement {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
    /// `nonce` of the script tag that loaded the widget, if any.
    pub script_nonce: Option<String>,
}

impl MountElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_script_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.script_nonce = Some(nonce.into());
        self
    }

    /// Value of `data-<key>`.
    pub fn data(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(&format!("data-{key}"))
            .map(String::as_str)
    }
}

/// One source of configuration. Every field is optional so layers can be
/// stacked with [`ConfigLayer::over`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigLayer {
    pub api_url: Option<String>,
    pub consent_endpoint: Option<String>,
    pub config_url: Option<String>,
    pub title: Option<String>,
    pub welcome_message: Option<String>,
    pub lang: Option<String>,
    #[serde(rename = "useExternalCSS")]
    pub use_external_css: Option<bool>,
    pub nonce: Option<String>,
    pub auto_show: Option<bool>,
}

fn pick(upper: Option<String>, lower: Option<String>) -> Option<String> {
    upper.filter(|v| !v.is_empty()).or(lower.filter(|v| !v.is_empty()))
}

impl ConfigLayer {
    pub fn from_element(el: &MountElement) -> Self {
        let data = |key: &str| el.data(key).map(str::to_string);
        Self {
            api_url: data("api-url"),
            consent_endpoint: data("consent-endpoint"),
            config_url: data("config-url"),
            title: data("title"),
            welcome_message: data("welcome-message"),
            lang: data("lang"),
            nonce: el.script_nonce.clone(),
            ..Self::default()
        }
    }

    /// Parse a remote config document. Anything that is not a usable object
    /// counts as an empty layer.
    pub fn from_remote(value: serde_json::Value) -> Self {
        if !value.is_object() {
            warn!("remote widget config is not a JSON object; ignoring it");
            return Self::default();
        }
        match serde_json::from_value(value) {
            Ok(layer) => layer,
            Err(err) => {
                warn!(%err, "remote widget config has invalid fields; ignoring it");
                Self::default()
            }
        }
    }

    /// Fill every field `self` leaves unset (or empty) from `lower`.
    pub fn over(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            api_url: pick(self.api_url, lower.api_url),
            consent_endpoint: pick(self.consent_endpoint, lower.consent_endpoint),
            config_url: pick(self.config_url, lower.config_url),
            title: pick(self.title, lower.title),
            welcome_message: pick(self.welcome_message, lower.welcome_message),
            lang: pick(self.lang, lower.lang),
            use_external_css: self.use_external_css.or(lower.use_external_css),
            nonce: pick(self.nonce, lower.nonce),
            auto_show: self.auto_show.or(lower.auto_show),
        }
    }

    /// Apply built-in defaults.
    pub fn resolve(self) -> WidgetConfig {
        WidgetConfig {
            api_url: self.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            // "false" is how a host page opts out of consent in markup
            consent_endpoint: self
                .consent_endpoint
                .filter(|v| !v.is_empty() && v != "false"),
            config_url: self.config_url.filter(|v| !v.is_empty()),
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            welcome_message: self
                .welcome_message
                .unwrap_or_else(|| DEFAULT_WELCOME.to_string()),
            lang: self.lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            use_external_css: self.use_external_css.unwrap_or(false),
            nonce: self.nonce.filter(|v| !v.is_empty()),
            auto_show: self.auto_show.unwrap_or(true),
        }
    }
}

/// Effective widget configuration, fixed for the widget's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub api_url: String,
    pub consent_endpoint: Option<String>,
    pub config_url: Option<String>,
    pub title: String,
    pub welcome_message: String,
    pub lang: String,
    #[serde(rename = "useExternalCSS")]
    pub use_external_css: bool,
    pub nonce: Option<String>,
    pub auto_show: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        ConfigLayer::default().resolve()
    }
}

/// Caller-supplied options for [`super::init`].
#[derive(Debug, Clone, Default)]
pub struct WidgetOptions {
    /// Mount element; when absent the surface is asked for `#civic-chat`.
    pub el: Option<MountElement>,
    pub overrides: ConfigLayer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_without_any_layer() {
        let cfg = WidgetConfig::default();
        assert_eq!(cfg.api_url, "/chat");
        assert_eq!(cfg.title, "Civic Chat");
        assert_eq!(cfg.welcome_message, "Hello! How can I help you today?");
        assert_eq!(cfg.lang, "en");
        assert_eq!(cfg.consent_endpoint, None);
        assert!(cfg.auto_show);
        assert!(!cfg.use_external_css);
    }

    #[test]
    fn reads_data_attributes() {
        let el = MountElement::new("civic-chat")
            .with_attr("data-api-url", "/api/chat")
            .with_attr("data-consent-endpoint", "/api/consent")
            .with_attr("data-title", "Support")
            .with_attr("data-welcome-message", "Hi")
            .with_attr("data-lang", "de")
            .with_script_nonce("abc");
        let cfg = ConfigLayer::from_element(&el).resolve();
        assert_eq!(cfg.api_url, "/api/chat");
        assert_eq!(cfg.consent_endpoint.as_deref(), Some("/api/consent"));
        assert_eq!(cfg.title, "Support");
        assert_eq!(cfg.welcome_message, "Hi");
        assert_eq!(cfg.lang, "de");
        assert_eq!(cfg.nonce.as_deref(), Some("abc"));
    }

    #[test]
    fn precedence_is_override_then_remote_then_attribute() {
        let attrs = ConfigLayer::from_element(
            &MountElement::new("civic-chat")
                .with_attr("data-title", "from attribute")
                .with_attr("data-lang", "fr")
                .with_attr("data-api-url", "/attr"),
        );
        let remote = ConfigLayer::from_remote(json!({
            "title": "from remote",
            "apiUrl": "/remote",
            "features": { "typingIndicator": true }
        }));
        let overrides = ConfigLayer {
            title: Some("from caller".into()),
            ..ConfigLayer::default()
        };

        let cfg = overrides.over(remote).over(attrs).resolve();
        assert_eq!(cfg.title, "from caller");
        assert_eq!(cfg.api_url, "/remote");
        assert_eq!(cfg.lang, "fr");
        assert_eq!(cfg.welcome_message, DEFAULT_WELCOME);
    }

    #[test]
    fn empty_strings_fall_through() {
        let overrides = ConfigLayer {
            title: Some(String::new()),
            ..ConfigLayer::default()
        };
        let attrs = ConfigLayer {
            title: Some("Support".into()),
            ..ConfigLayer::default()
        };
        assert_eq!(overrides.over(attrs).resolve().title, "Support");
    }

    #[test]
    fn false_consent_endpoint_disables_consent() {
        let el = MountElement::new("c").with_attr("data-consent-endpoint", "false");
        assert_eq!(ConfigLayer::from_element(&el).resolve().consent_endpoint, None);
    }

    #[test]
    fn unusable_remote_config_is_empty() {
        assert_eq!(ConfigLayer::from_remote(json!([1, 2])), ConfigLayer::default());
        assert_eq!(
            ConfigLayer::from_remote(json!({ "title": 42 })),
            ConfigLayer::default()
        );
        let layer = ConfigLayer::from_remote(json!({ "useExternalCSS": true, "autoShow": false }));
        assert_eq!(layer.use_external_css, Some(true));
        assert_eq!(layer.auto_show, Some(false));
    }
}
