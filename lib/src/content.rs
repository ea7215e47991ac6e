//! The content model: a tagged union of payload shapes a commit can carry,
//! dispatched on a `content_type` discriminator, plus a validator and a
//! caller-extensible registry for custom variants.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TractError, TractResult};

/// Priority used by the annotation system and by each content type's
/// built-in default (§4.1 / §4.4 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Skip,
    Normal,
    Important,
    Pinned,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Skip => "skip",
            Priority::Normal => "normal",
            Priority::Important => "important",
            Priority::Pinned => "pinned",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = TractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Priority::Skip),
            "normal" => Ok(Priority::Normal),
            "important" => Ok(Priority::Important),
            "pinned" => Ok(Priority::Pinned),
            other => Err(TractError::ContentValidation {
                reason: format!("unknown priority {other:?}"),
            }),
        }
    }
}

/// A builtin content variant, after validation. Custom types (registered
/// per-session) fall through to `Custom`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    Instruction {
        text: String,
    },
    Dialogue {
        role: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    ToolIo {
        tool_name: String,
        direction: ToolDirection,
        payload: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    Reasoning {
        text: String,
    },
    Artifact {
        title: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
    },
    Output {
        text: String,
    },
    Freeform {
        payload: Map<String, Value>,
    },
    /// A custom content type registered via [`ContentRegistry::register`].
    /// The payload is kept verbatim (it already passed the caller's
    /// validator) alongside the discriminator that produced it.
    #[serde(untagged)]
    Custom {
        #[serde(rename = "content_type")]
        content_type: String,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolDirection {
    Call,
    Result,
}

impl Content {
    /// The `content_type` discriminator string, as stored on the commit row.
    pub fn content_type(&self) -> &str {
        match self {
            Content::Instruction { .. } => "instruction",
            Content::Dialogue { .. } => "dialogue",
            Content::ToolIo { .. } => "tool_io",
            Content::Reasoning { .. } => "reasoning",
            Content::Artifact { .. } => "artifact",
            Content::Output { .. } => "output",
            Content::Freeform { .. } => "freeform",
            Content::Custom { content_type, .. } => content_type,
        }
    }

    /// Canonical JSON payload, used both for content-hashing and for
    /// storage in the blob table.
    pub fn to_value(&self) -> TractResult<Value> {
        serde_json::to_value(self).map_err(|source| TractError::ContentValidation {
            reason: format!("failed to serialize content: {source}"),
        })
    }
}

/// Static hints describing a builtin content type's default role and
/// priority, used by the compiler and commit engine respectively.
#[derive(Debug, Clone, Copy)]
pub struct ContentTypeHint {
    pub default_role: &'static str,
    pub default_priority: Priority,
}

/// `content_type` -> hints, for every builtin variant (§4.1 table).
pub fn builtin_type_hints(content_type: &str) -> Option<ContentTypeHint> {
    Some(match content_type {
        "instruction" => ContentTypeHint {
            default_role: "system",
            default_priority: Priority::Pinned,
        },
        "dialogue" => ContentTypeHint {
            default_role: "user",
            default_priority: Priority::Normal,
        },
        "tool_io" => ContentTypeHint {
            default_role: "tool",
            default_priority: Priority::Normal,
        },
        "reasoning" => ContentTypeHint {
            default_role: "assistant",
            default_priority: Priority::Normal,
        },
        "artifact" => ContentTypeHint {
            default_role: "assistant",
            default_priority: Priority::Normal,
        },
        "output" => ContentTypeHint {
            default_role: "assistant",
            default_priority: Priority::Normal,
        },
        "freeform" => ContentTypeHint {
            default_role: "assistant",
            default_priority: Priority::Normal,
        },
        _ => return None,
    })
}

/// A caller-supplied validator for a custom content type: given the raw
/// payload map (with `content_type` already stripped), return `Ok(())` if
/// it conforms to the custom schema.
pub type CustomValidator = Arc<dyn Fn(&Map<String, Value>) -> Result<(), String> + Send + Sync>;

/// Per-session registry of custom content types, consulted by
/// [`validate_content`] when the discriminator doesn't match a builtin.
#[derive(Clone, Default)]
pub struct ContentRegistry {
    validators: HashMap<String, CustomValidator>,
    default_roles: HashMap<String, String>,
    default_priorities: HashMap<String, Priority>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom content type under `content_type`, with a
    /// validator, default role, and default priority.
    pub fn register(
        &mut self,
        content_type: impl Into<String>,
        default_role: impl Into<String>,
        default_priority: Priority,
        validator: CustomValidator,
    ) {
        let content_type = content_type.into();
        self.default_roles
            .insert(content_type.clone(), default_role.into());
        self.default_priorities
            .insert(content_type.clone(), default_priority);
        self.validators.insert(content_type, validator);
    }

    pub fn default_role(&self, content_type: &str) -> Option<&str> {
        self.default_roles.get(content_type).map(String::as_str)
    }

    pub fn default_priority(&self, content_type: &str) -> Option<Priority> {
        self.default_priorities.get(content_type).copied()
    }
}

/// Validate an untyped JSON value against its `content_type` discriminator,
/// dispatching to the builtin variant schema or, failing that, to a
/// registered custom validator.
pub fn validate_content(value: &Value, registry: &ContentRegistry) -> TractResult<Content> {
    let obj = value.as_object().ok_or_else(|| TractError::ContentValidation {
        reason: "content must be a JSON object".to_string(),
    })?;
    let content_type = obj
        .get("content_type")
        .and_then(Value::as_str)
        .ok_or_else(|| TractError::ContentValidation {
            reason: "content is missing a \"content_type\" field".to_string(),
        })?
        .to_string();

    if builtin_type_hints(&content_type).is_some() {
        return serde_json::from_value(value.clone()).map_err(|source| {
            TractError::ContentValidation {
                reason: format!("invalid {content_type} payload: {source}"),
            }
        });
    }

    let mut payload = obj.clone();
    payload.remove("content_type");

    if let Some(validator) = registry.validators.get(&content_type) {
        validator(&payload).map_err(|reason| TractError::ContentValidation { reason })?;
        return Ok(Content::Custom {
            content_type,
            payload,
        });
    }

    Err(TractError::ContentValidation {
        reason: format!("unknown content_type {content_type:?} and no custom validator registered"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_dialogue() {
        let registry = ContentRegistry::new();
        let v = json!({"content_type": "dialogue", "role": "user", "text": "hi"});
        let content = validate_content(&v, &registry).unwrap();
        assert_eq!(content.content_type(), "dialogue");
    }

    #[test]
    fn rejects_unknown_type() {
        let registry = ContentRegistry::new();
        let v = json!({"content_type": "nope"});
        assert!(validate_content(&v, &registry).is_err());
    }

    #[test]
    fn custom_type_round_trips() {
        let mut registry = ContentRegistry::new();
        registry.register(
            "trace_span",
            "assistant",
            Priority::Normal,
            Arc::new(|payload| {
                if payload.contains_key("span_id") {
                    Ok(())
                } else {
                    Err("missing span_id".to_string())
                }
            }),
        );
        let v = json!({"content_type": "trace_span", "span_id": "abc"});
        let content = validate_content(&v, &registry).unwrap();
        assert_eq!(content.content_type(), "trace_span");
    }
}
