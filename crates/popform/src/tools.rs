//! Ready-made single-select and multi-select questions built on the form
//! session, with outputs flattened for programmatic callers.

use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::form::{FieldKind, FormConfig, FormField, FormResponse, OptionItem, ResponseAction};
use crate::session::{self, SessionError};

const DEFAULT_OTHER_LABEL: &str = "Other";
const DEFAULT_SUBMIT_LABEL: &str = "Submit";
const DEFAULT_SKIP_LABEL: &str = "Skip";

/// Parameters for a select question. The same shape drives both the
/// single-select and multi-select variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectInput {
    pub options: Vec<OptionItem>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allow_other: bool,
    #[serde(default)]
    pub other_label: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectInputError {
    #[error("a select question needs at least two options")]
    NotEnoughOptions,
    #[error("option labels must be non-empty")]
    EmptyOptionLabel,
}

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error(transparent)]
    Input(#[from] SelectInputError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

fn validated_field(input: &SelectInput, kind: FieldKind) -> Result<FormField, SelectInputError> {
    if input.options.len() < 2 {
        return Err(SelectInputError::NotEnoughOptions);
    }
    if input.options.iter().any(|option| option.label().trim().is_empty()) {
        return Err(SelectInputError::EmptyOptionLabel);
    }

    Ok(FormField {
        kind,
        name: "selection".to_string(),
        options: input.options.clone(),
        allow_other: input.allow_other.then_some(true),
        other_label: input.allow_other.then(|| {
            input
                .other_label
                .clone()
                .unwrap_or_else(|| DEFAULT_OTHER_LABEL.to_string())
        }),
    })
}

fn select_config(input: &SelectInput, kind: FieldKind) -> Result<FormConfig, SelectInputError> {
    Ok(FormConfig {
        title: input.title.clone(),
        description: input.description.clone(),
        field: validated_field(input, kind)?,
        submit_label: Some(DEFAULT_SUBMIT_LABEL.to_string()),
        skip_label: Some(DEFAULT_SKIP_LABEL.to_string()),
    })
}

pub fn single_select_config(input: &SelectInput) -> Result<FormConfig, SelectInputError> {
    select_config(input, FieldKind::Radio)
}

pub fn multi_select_config(input: &SelectInput) -> Result<FormConfig, SelectInputError> {
    select_config(input, FieldKind::Checkbox)
}

/// Flattened single-select result: the chosen label, or a skip, or a request
/// to explain one option before deciding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSelection {
    pub action: ResponseAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelection {
    pub action: ResponseAction,
    pub selections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_message: Option<String>,
}

fn trimmed_comments(comments: Option<String>) -> Option<String> {
    comments
        .map(|comments| comments.trim().to_string())
        .filter(|comments| !comments.is_empty())
}

fn explain_message(option: &str) -> String {
    format!("Could you please explain the option \"{option}\" in more detail before I make a decision?")
}

impl From<FormResponse> for SingleSelection {
    fn from(response: FormResponse) -> Self {
        let explain_option =
            (response.action == ResponseAction::RequestExplanation).then(|| {
                response.data.explain_option.clone().unwrap_or_default()
            });
        Self {
            action: response.action,
            selection: response.data.selection,
            comments: trimmed_comments(response.data.comments),
            explain_message: explain_option.as_deref().map(explain_message),
            explain_option,
        }
    }
}

impl From<FormResponse> for MultiSelection {
    fn from(response: FormResponse) -> Self {
        let explain_option =
            (response.action == ResponseAction::RequestExplanation).then(|| {
                response.data.explain_option.clone().unwrap_or_default()
            });
        Self {
            action: response.action,
            selections: response.data.selections.unwrap_or_default(),
            comments: trimmed_comments(response.data.comments),
            explain_message: explain_option.as_deref().map(explain_message),
            explain_option,
        }
    }
}

/// Asks the human to pick one option.
pub async fn ask_user(
    input: &SelectInput,
    config: &ServerConfig,
) -> Result<SingleSelection, AskError> {
    let form = single_select_config(input)?;
    let response = session::serve_form_and_await_response(form, config).await?;
    Ok(response.into())
}

/// Asks the human to pick any number of options.
pub async fn ask_user_multiple(
    input: &SelectInput,
    config: &ServerConfig,
) -> Result<MultiSelection, AskError> {
    let form = multi_select_config(input)?;
    let response = session::serve_form_and_await_response(form, config).await?;
    Ok(response.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::ResponseData;

    fn two_options() -> SelectInput {
        SelectInput {
            options: vec![OptionItem::from("A"), OptionItem::from("B")],
            title: Some("Pick".to_string()),
            description: None,
            allow_other: false,
            other_label: None,
        }
    }

    #[test]
    fn builders_validate_option_count_and_labels() {
        let mut input = two_options();
        input.options.truncate(1);
        assert_eq!(
            single_select_config(&input).unwrap_err(),
            SelectInputError::NotEnoughOptions
        );

        let mut input = two_options();
        input.options[1] = OptionItem::from("   ");
        assert_eq!(
            multi_select_config(&input).unwrap_err(),
            SelectInputError::EmptyOptionLabel
        );
    }

    #[test]
    fn single_select_builds_a_radio_form_with_default_labels() {
        let config = single_select_config(&two_options()).unwrap();
        assert_eq!(config.field.kind, FieldKind::Radio);
        assert_eq!(config.field.name, "selection");
        assert_eq!(config.submit_label.as_deref(), Some("Submit"));
        assert_eq!(config.skip_label.as_deref(), Some("Skip"));
        assert_eq!(config.field.allow_other, None);
    }

    #[test]
    fn allow_other_fills_in_the_default_label() {
        let mut input = two_options();
        input.allow_other = true;
        let config = multi_select_config(&input).unwrap();
        assert_eq!(config.field.kind, FieldKind::Checkbox);
        assert_eq!(config.field.allow_other, Some(true));
        assert_eq!(config.field.other_label.as_deref(), Some("Other"));

        input.other_label = Some("Something else".to_string());
        let config = multi_select_config(&input).unwrap();
        assert_eq!(config.field.other_label.as_deref(), Some("Something else"));
    }

    #[test]
    fn submit_response_flattens_to_a_selection() {
        let selection = SingleSelection::from(FormResponse {
            action: ResponseAction::Submit,
            data: ResponseData {
                selection: Some("B".to_string()),
                comments: Some("  because reasons  ".to_string()),
                ..ResponseData::default()
            },
        });
        assert_eq!(selection.action, ResponseAction::Submit);
        assert_eq!(selection.selection.as_deref(), Some("B"));
        assert_eq!(selection.comments.as_deref(), Some("because reasons"));
        assert_eq!(selection.explain_option, None);
    }

    #[test]
    fn skip_keeps_no_selection_and_blank_comments_disappear() {
        let selection = SingleSelection::from(FormResponse {
            action: ResponseAction::Skip,
            data: ResponseData {
                comments: Some("   ".to_string()),
                ..ResponseData::default()
            },
        });
        assert_eq!(selection.action, ResponseAction::Skip);
        assert_eq!(selection.selection, None);
        assert_eq!(selection.comments, None);
    }

    #[test]
    fn explanation_request_carries_the_prompt_message() {
        let selection = SingleSelection::from(FormResponse {
            action: ResponseAction::RequestExplanation,
            data: ResponseData {
                explain_option: Some("B".to_string()),
                ..ResponseData::default()
            },
        });
        assert_eq!(selection.explain_option.as_deref(), Some("B"));
        assert_eq!(
            selection.explain_message.as_deref(),
            Some("Could you please explain the option \"B\" in more detail before I make a decision?")
        );
    }

    #[test]
    fn multi_select_defaults_to_an_empty_selection_list() {
        let selection = MultiSelection::from(FormResponse {
            action: ResponseAction::Submit,
            data: ResponseData {
                selections: Some(vec!["A".to_string(), "B".to_string()]),
                ..ResponseData::default()
            },
        });
        assert_eq!(selection.selections, vec!["A", "B"]);

        let skipped = MultiSelection::from(FormResponse::skipped());
        assert!(skipped.selections.is_empty());
    }
}
