use serde::{Deserialize, Serialize};

/// One complete question shown to the human. Serialized verbatim to the UI
/// via `GET /api/config`; field names follow the wire contract, not Rust
/// conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub field: FormField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub name: String,
    pub options: Vec<OptionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_other: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Radio,
    Checkbox,
}

/// An option is either a bare label or an object carrying extra context.
/// Label uniqueness is the caller's concern, not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionItem {
    Label(String),
    Detailed {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recommended: Option<bool>,
    },
}

impl OptionItem {
    pub fn label(&self) -> &str {
        match self {
            OptionItem::Label(label) => label,
            OptionItem::Detailed { label, .. } => label,
        }
    }
}

impl From<&str> for OptionItem {
    fn from(label: &str) -> Self {
        OptionItem::Label(label.to_string())
    }
}

/// The single value one interaction produces, either sent by the UI through
/// `POST /api/submit` or synthesized server-side as a skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormResponse {
    pub action: ResponseAction,
    #[serde(default)]
    pub data: ResponseData,
}

impl FormResponse {
    /// The skip result manufactured when no human action occurred.
    pub fn skipped() -> Self {
        Self {
            action: ResponseAction::Skip,
            data: ResponseData::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    Submit,
    Skip,
    RequestExplanation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selections: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(
        rename = "explainOption",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub explain_option: Option<String>,
}
