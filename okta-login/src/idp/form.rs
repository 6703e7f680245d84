use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::common::{FormFieldConfig, UserCredentials};

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("valid input regex"));

static FORM_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<form\b([^>]*)>").expect("valid form regex"));

/// Markup whose text is never part of the live form
static INERT_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?(?:-->|\z)|<script\b[^>]*>.*?(?:</script\s*>|\z)|<style\b[^>]*>.*?(?:</style\s*>|\z)",
    )
    .expect("valid inert markup regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid attribute regex")
});

/// What a login form field should be filled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Username,
    Password,
    /// Keep the value the page already carries (hidden fields, CSRF tokens)
    Passthrough,
}

/// Decides which login form fields receive the username and password
pub trait FieldClassifier: Send + Sync {
    fn classify(&self, field_name: &str) -> FieldRole;
}

/// Case-insensitive substring match on the field name. Username markers are
/// checked before password markers.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    username_markers: Vec<String>,
    password_markers: Vec<String>,
}

impl SubstringClassifier {
    pub fn new(username_markers: Vec<String>, password_markers: Vec<String>) -> Self {
        Self {
            username_markers: lowercase_all(username_markers),
            password_markers: lowercase_all(password_markers),
        }
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        FormFieldConfig::default().into()
    }
}

impl From<FormFieldConfig> for SubstringClassifier {
    fn from(config: FormFieldConfig) -> Self {
        Self::new(config.username_markers, config.password_markers)
    }
}

impl FieldClassifier for SubstringClassifier {
    fn classify(&self, field_name: &str) -> FieldRole {
        let name = field_name.to_lowercase();
        if self.username_markers.iter().any(|m| name.contains(m.as_str())) {
            FieldRole::Username
        } else if self.password_markers.iter().any(|m| name.contains(m.as_str())) {
            FieldRole::Password
        } else {
            FieldRole::Passthrough
        }
    }
}

fn lowercase_all(markers: Vec<String>) -> Vec<String> {
    markers.into_iter().map(|m| m.to_lowercase()).collect()
}

/// Input fields and form action scraped from an HTML page
#[derive(Debug, Clone, Default)]
pub struct HtmlForm {
    /// `(name, value)` pairs in document order; inputs without a name are skipped
    pub inputs: Vec<(String, String)>,
    /// Action of the last `<form>` that declares a non-empty one
    pub action: Option<String>,
}

impl HtmlForm {
    pub fn parse(html: &str) -> Self {
        let html = INERT_MARKUP.replace_all(html, "");

        let inputs = INPUT_TAG
            .captures_iter(&html)
            .filter_map(|cap| {
                let attrs = &cap[1];
                let name = attribute(attrs, "name")?;
                let value = attribute(attrs, "value").unwrap_or_default();
                Some((name, value))
            })
            .collect();

        let action = FORM_TAG
            .captures_iter(&html)
            .filter_map(|cap| attribute(&cap[1], "action"))
            .filter(|action| !action.is_empty())
            .last();

        Self { inputs, action }
    }

    /// Value of the first input with exactly this name
    pub fn input_value(&self, name: &str) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Build the login payload: username/password fields get the supplied
    /// credentials, everything else keeps its value. A repeated field name
    /// keeps its first position and takes the last value.
    pub fn login_payload(
        &self,
        credentials: &UserCredentials,
        classifier: &dyn FieldClassifier,
    ) -> Vec<(String, String)> {
        let mut payload: Vec<(String, String)> = Vec::with_capacity(self.inputs.len());

        for (name, value) in &self.inputs {
            let value = match classifier.classify(name) {
                FieldRole::Username => credentials.username.clone(),
                FieldRole::Password => credentials.password.clone(),
                FieldRole::Passthrough => value.clone(),
            };

            match payload.iter_mut().find(|(existing, _)| existing == name) {
                Some(entry) => entry.1 = value,
                None => payload.push((name.clone(), value)),
            }
        }

        payload
    }

    /// Where the login form is posted. A root relative action is resolved
    /// against the scheme and host of the entry URL, not the redirected URL.
    /// Any other relative action is joined to the page it was served from,
    /// and without an action the form goes back to that page.
    pub fn submit_target(&self, entry_url: &Url, resolved_url: &Url) -> Url {
        let Some(action) = self.action.as_deref() else {
            return resolved_url.clone();
        };

        if let Ok(absolute) = Url::parse(action) {
            if matches!(absolute.scheme(), "http" | "https") {
                return absolute;
            }
        }

        if !action.starts_with('/') || action.starts_with("//") {
            return resolved_url
                .join(action)
                .unwrap_or_else(|_| resolved_url.clone());
        }

        let mut origin = format!(
            "{}://{}",
            entry_url.scheme(),
            entry_url.host_str().unwrap_or_default()
        );
        if let Some(port) = entry_url.port() {
            origin.push_str(&format!(":{}", port));
        }

        Url::parse(&format!("{}{}", origin, action)).unwrap_or_else(|_| resolved_url.clone())
    }
}

/// Value of an HTML attribute inside a tag's attribute text, entity decoded
fn attribute(attrs: &str, wanted: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(attrs).find_map(|cap| {
        if !cap[1].eq_ignore_ascii_case(wanted) {
            return None;
        }
        let raw = cap
            .get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        Some(decode_entities(raw))
    })
}

/// Decode the character references that show up in attribute values. Text
/// that does not unescape cleanly, such as a bare `&`, is kept as written.
pub fn decode_entities(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
