mod pushover;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use pushover::PushoverNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    MissingCredentials,
    Transport(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => {
                write!(f, "notification credentials missing (PUSHOVER_TOKEN/PUSHOVER_USER)")
            }
            Self::Transport(msg) => write!(f, "notification transport error: {msg}"),
        }
    }
}

impl Error for NotifyError {}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// Fire-and-forget push channel used by the tools.
pub trait Notifier {
    fn notify(&self, text: &str) -> impl std::future::Future<Output = NotifyResult<()>> + Send;
}
