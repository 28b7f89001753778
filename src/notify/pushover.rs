use super::{NotifyError, NotifyResult, Notifier};
use crate::http::client::HttpClient;
use crate::trace::SessionTrace;

#[derive(Debug, Clone)]
pub struct PushoverNotifier {
    http: HttpClient,
    credentials: Option<Credentials>,
    base_url: String,
    trace: Option<SessionTrace>,
}

#[derive(Debug, Clone)]
struct Credentials {
    token: String,
    user: String,
}

impl PushoverNotifier {
    /// Builds a notifier even without credentials; `notify` then fails so the
    /// model sees the tool error instead of the process refusing to start.
    pub fn new(
        http: HttpClient,
        token: Option<String>,
        user: Option<String>,
        base_url: String,
    ) -> Self {
        let credentials = match (non_blank(token), non_blank(user)) {
            (Some(token), Some(user)) => Some(Credentials { token, user }),
            _ => None,
        };

        Self {
            http,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/1/messages.json", self.base_url)
    }
}

impl Notifier for PushoverNotifier {
    async fn notify(&self, text: &str) -> NotifyResult<()> {
        if let Some(trace) = &self.trace {
            trace.log_notification(text);
        }
        let Some(credentials) = &self.credentials else {
            return Err(NotifyError::MissingCredentials);
        };

        // The response body is not part of the contract; the trace keeps it.
        self.http
            .post_form(
                &self.endpoint(),
                &[
                    ("token", credentials.token.as_str()),
                    ("user", credentials.user.as_str()),
                    ("message", text),
                ],
            )
            .await
            .map(|_| ())
            .map_err(|err| NotifyError::Transport(err.to_string()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
