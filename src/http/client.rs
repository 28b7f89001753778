use super::debug::HttpDebugConfig;
use crate::trace::SessionTrace;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Outbound HTTP for the completion endpoint and the notifier. Every exchange
/// goes to the session trace with secrets masked; `--verbose` also dumps it to
/// stderr.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    sink: DumpSink,
    trace: Option<SessionTrace>,
}

#[derive(Clone)]
enum DumpSink {
    Stderr,
    #[cfg(test)]
    Memory(Arc<Mutex<Vec<String>>>),
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}

impl HttpResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            sink: DumpSink::Stderr,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// POSTs a JSON body, optionally with a bearer token.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let mut builder = self.inner.post(url).json(payload);
        if let Some(token) = bearer_token {
            builder = builder.bearer_auth(token);
        }
        let request = builder.build()?;

        let raw = serde_json::to_string(payload)
            .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"));
        let shown = self.debug.mask_json_body(&raw);
        self.send(request, &shown).await
    }

    /// POSTs an `application/x-www-form-urlencoded` body.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<HttpResponseData, reqwest::Error> {
        let request = self.inner.post(url).form(fields).build()?;
        let shown = self.debug.mask_form(fields);
        self.send(request, &shown).await
    }

    /// `shown` is the request body with secrets already masked.
    async fn send(&self, request: Request, shown: &str) -> Result<HttpResponseData, reqwest::Error> {
        if self.debug.enabled {
            let head = format!("{} {}", request.method(), request.url());
            self.dump(dump_lines(self.debug, '>', &head, request.headers(), shown));
        }
        if let Some(trace) = &self.trace {
            trace.log_http_request(
                request.method().as_str(),
                request.url().as_str(),
                &self.debug.mask_headers(request.headers()),
                shown,
            );
        }

        let response = match self.inner.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                if let Some(trace) = &self.trace {
                    trace.log_http_error(&err.to_string());
                }
                return Err(err);
            }
        };
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await?;

        let shown = self.debug.mask_json_body(&text);
        if self.debug.enabled {
            let head = format!("HTTP {status}");
            self.dump(dump_lines(self.debug, '<', &head, &headers, &shown));
        }
        if let Some(trace) = &self.trace {
            trace.log_http_response(status, &self.debug.mask_headers(&headers), &shown);
        }

        Ok(HttpResponseData { status, body: text })
    }

    fn dump(&self, lines: Vec<String>) {
        match &self.sink {
            DumpSink::Stderr => {
                let mut stderr = io::stderr().lock();
                for line in lines {
                    let _ = writeln!(stderr, "{line}");
                }
            }
            #[cfg(test)]
            DumpSink::Memory(buffer) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.extend(lines);
                }
            }
        }
    }

    #[cfg(test)]
    fn with_memory_sink(inner: Client, debug: HttpDebugConfig) -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let client = Self {
            sink: DumpSink::Memory(Arc::clone(&buffer)),
            ..Self::new(inner, debug)
        };
        (client, buffer)
    }
}

/// One request or response as `[http-debug]` lines: head, headers, a blank
/// separator, then the clipped body. `direction` is `>` out, `<` in.
fn dump_lines(
    debug: HttpDebugConfig,
    direction: char,
    head: &str,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    let prefix = format!("[http-debug] {direction}");
    let mut lines = vec![format!("{prefix} {head}")];
    for (name, value) in headers {
        let name = name.as_str();
        lines.push(format!("{prefix} {name}: {}", debug.mask_header(name, value)));
    }
    lines.push(prefix.clone());

    let body = debug.clip(body);
    if body.is_empty() {
        lines.push(format!("{prefix} <empty body>"));
    } else {
        lines.extend(body.lines().map(|line| format!("{prefix} {line}")));
    }
    lines
}
