use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::{Value, json};

use crate::llm::provider::{ChatMessage, ToolDescriptor, ToolInvocation};
use crate::notify::{NotifyError, Notifier};

pub const RECORD_USER_DETAILS: &str = "record_user_details";
pub const RECORD_UNKNOWN_QUESTION: &str = "record_unknown_question";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    RecordUserDetails,
    RecordUnknownQuestion,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [Self::RecordUserDetails, Self::RecordUnknownQuestion];

    pub fn name(self) -> &'static str {
        match self {
            Self::RecordUserDetails => RECORD_USER_DETAILS,
            Self::RecordUnknownQuestion => RECORD_UNKNOWN_QUESTION,
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        match self {
            Self::RecordUserDetails => ToolDescriptor {
                name: RECORD_USER_DETAILS.to_string(),
                description: "Use this tool to record that a user is interested in being in touch and provided an email address".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "email": {
                            "type": "string",
                            "description": "The email address of this user"
                        },
                        "name": {
                            "type": "string",
                            "description": "The user's name, if they provided it"
                        },
                        "notes": {
                            "type": "string",
                            "description": "Any additional information about the conversation that's worth recording to give context"
                        }
                    },
                    "required": ["email"],
                    "additionalProperties": false
                }),
            },
            Self::RecordUnknownQuestion => ToolDescriptor {
                name: RECORD_UNKNOWN_QUESTION.to_string(),
                description: "Always use this tool to record any question that couldn't be answered as you didn't know the answer".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "question": {
                            "type": "string",
                            "description": "The question that couldn't be answered"
                        }
                    },
                    "required": ["question"],
                    "additionalProperties": false
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    UnknownTool(String),
    InvalidArguments { tool: String, message: String },
    Notification(NotifyError),
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
            Self::InvalidArguments { tool, message } => {
                write!(f, "invalid arguments for {tool}: {message}")
            }
            Self::Notification(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ToolError {}

impl From<NotifyError> for ToolError {
    fn from(err: NotifyError) -> Self {
        Self::Notification(err)
    }
}

/// Output of one dispatched invocation, sent back as a tool-role turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
}

impl ToolResult {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage::Tool {
            tool_call_id: self.tool_call_id,
            content: self.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDetails {
    pub email: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_notes")]
    pub notes: String,
}

fn default_name() -> String {
    "Name not provided".to_string()
}

fn default_notes() -> String {
    "not provided".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnknownQuestion {
    question: String,
}

pub async fn record_user_details<N: Notifier>(
    notifier: &N,
    details: &UserDetails,
) -> Result<Value, ToolError> {
    notifier
        .notify(&format!(
            "Recording {} with email {} and notes {}",
            details.name, details.email, details.notes
        ))
        .await?;
    Ok(recorded())
}

pub async fn record_unknown_question<N: Notifier>(
    notifier: &N,
    question: &str,
) -> Result<Value, ToolError> {
    notifier.notify(&format!("Recording {question}")).await?;
    Ok(recorded())
}

fn recorded() -> Value {
    json!({ "recorded": "ok" })
}

/// Name to tool lookup, built once and shared read-only by every turn.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolKind>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        Self {
            tools: ToolKind::ALL
                .into_iter()
                .map(|kind| (kind.name(), kind))
                .collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).copied()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|kind| kind.descriptor()).collect()
    }

    /// Always yields a result carrying the invocation id; failures become an
    /// `{"error": ...}` payload the model can read.
    pub async fn dispatch<N: Notifier + Sync>(
        &self,
        notifier: &N,
        invocation: &ToolInvocation,
    ) -> ToolResult {
        let content = match self.run(notifier, invocation).await {
            Ok(value) => value.to_string(),
            Err(err) => json!({ "error": err.to_string() }).to_string(),
        };

        ToolResult {
            tool_call_id: invocation.id.clone(),
            content,
        }
    }

    async fn run<N: Notifier + Sync>(
        &self,
        notifier: &N,
        invocation: &ToolInvocation,
    ) -> Result<Value, ToolError> {
        let Some(kind) = self.lookup(&invocation.name) else {
            return Err(ToolError::UnknownTool(invocation.name.clone()));
        };

        match kind {
            ToolKind::RecordUserDetails => {
                let details: UserDetails = parse_arguments(kind, &invocation.arguments)?;
                record_user_details(notifier, &details).await
            }
            ToolKind::RecordUnknownQuestion => {
                let args: UnknownQuestion = parse_arguments(kind, &invocation.arguments)?;
                record_unknown_question(notifier, &args.question).await
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(kind: ToolKind, raw: &str) -> Result<T, ToolError> {
    serde_json::from_str(raw).map_err(|err| ToolError::InvalidArguments {
        tool: kind.name().to_string(),
        message: err.to_string(),
    })
}
