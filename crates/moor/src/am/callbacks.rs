//! Authentication-tree callbacks.
//!
//! A tree that needs more input from the authenticating thing returns a
//! list of callbacks; each carries read-only `output` entries (prompts,
//! challenges) and writable `input` slots for the answers. The wire shape
//! mirrors AM's JSON exactly; [`CallbackKind`] is the typed view this
//! library resolves against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output entry id marking a proof-of-possession challenge callback.
pub const POP_CHALLENGE_ID: &str = "jwt-pop-challenge";

/// A single credential-collection request within an exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Callback {
    /// Callback type name, e.g. `NameCallback`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Read-only entries supplied by the server (prompts, ids, challenges).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<CallbackEntry>,

    /// Writable slots the client fills with answers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<CallbackEntry>,
}

/// A named value slot within a callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackEntry {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Typed view over the callback kinds this library can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackKind {
    /// Username prompt; answered with the thing's name.
    Name,
    /// Secret prompt; answered with the thing's secret.
    Password,
    /// Hidden-value challenge answered with a signed proof-of-possession
    /// token over the supplied challenge.
    PopChallenge { challenge: String },
    /// Anything else. A resolving session fails rather than guess.
    Unknown,
}

impl Callback {
    /// Construct a username callback, as a server would send it.
    pub fn name(prompt: impl Into<String>) -> Self {
        Self {
            kind: "NameCallback".to_string(),
            output: vec![CallbackEntry {
                name: "prompt".to_string(),
                value: Value::String(prompt.into()),
            }],
            input: vec![CallbackEntry {
                name: "IDToken1".to_string(),
                value: Value::String(String::new()),
            }],
        }
    }

    /// Construct a password callback, as a server would send it.
    pub fn password(prompt: impl Into<String>) -> Self {
        Self {
            kind: "PasswordCallback".to_string(),
            output: vec![CallbackEntry {
                name: "prompt".to_string(),
                value: Value::String(prompt.into()),
            }],
            input: vec![CallbackEntry {
                name: "IDToken1".to_string(),
                value: Value::String(String::new()),
            }],
        }
    }

    /// Construct a proof-of-possession challenge callback, as a server
    /// would send it.
    pub fn pop_challenge(challenge: impl Into<String>) -> Self {
        Self {
            kind: "HiddenValueCallback".to_string(),
            output: vec![
                CallbackEntry {
                    name: "value".to_string(),
                    value: Value::String(challenge.into()),
                },
                CallbackEntry {
                    name: "id".to_string(),
                    value: Value::String(POP_CHALLENGE_ID.to_string()),
                },
            ],
            input: vec![CallbackEntry {
                name: "IDToken1".to_string(),
                value: Value::String(String::new()),
            }],
        }
    }

    /// Classify this callback into the typed view.
    pub fn classify(&self) -> CallbackKind {
        match self.kind.as_str() {
            "NameCallback" => CallbackKind::Name,
            "PasswordCallback" => CallbackKind::Password,
            "HiddenValueCallback" if self.output_str("id") == Some(POP_CHALLENGE_ID) => {
                match self.output_str("value") {
                    Some(challenge) => CallbackKind::PopChallenge {
                        challenge: challenge.to_string(),
                    },
                    None => CallbackKind::Unknown,
                }
            }
            _ => CallbackKind::Unknown,
        }
    }

    /// Fill the first input slot with an answer.
    ///
    /// Returns false if the callback has no input slot to fill.
    pub fn fill(&mut self, value: impl Into<Value>) -> bool {
        match self.input.first_mut() {
            Some(slot) => {
                slot.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Returns the answer currently held in the first input slot.
    pub fn answer(&self) -> Option<&Value> {
        self.input.first().map(|slot| &slot.value)
    }

    fn output_str(&self, name: &str) -> Option<&str> {
        self.output
            .iter()
            .find(|entry| entry.name == name)
            .and_then(|entry| entry.value.as_str())
    }
}
