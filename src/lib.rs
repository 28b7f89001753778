pub mod agent;
pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod notify;
pub mod profile;
pub mod trace;

use agent::ChatEngine;
use anyhow::Result;
use cli::{AppState, CliArgs, run_chat};
use config::AppConfig;
use http::client::HttpClient;
use http::debug::HttpDebugConfig;
use llm::openai::OpenAiProvider;
use notify::PushoverNotifier;
use profile::ProfileContext;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use trace::SessionTrace;

pub async fn run(args: CliArgs) -> Result<()> {
    let config = AppConfig::load_from(args.config.as_deref())?;
    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;
    let http = HttpClient::new(
        reqwest::Client::new(),
        HttpDebugConfig::from_verbose(args.verbose),
    )
    .with_trace(trace.clone());

    let mut startup_messages = Vec::new();
    let provider = match OpenAiProvider::new(
        http.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    ) {
        Ok(provider) => Some(provider),
        Err(err) => {
            startup_messages.push(format!("{err}; every answer will be an apology."));
            None
        }
    };

    let notifier = PushoverNotifier::new(
        http,
        config.pushover_token.clone(),
        config.pushover_user.clone(),
        config.pushover_base_url.clone(),
    )
    .with_trace(trace.clone());
    if !notifier.is_configured() {
        startup_messages
            .push("Pushover credentials missing; tool notifications will fail.".to_string());
    }

    trace.log_startup(&format!(
        "session {session_id} persona {} model {}",
        config.persona_name, config.openai_model
    ));
    for message in &startup_messages {
        trace.log_startup(message);
    }

    // Profile problems stay in the trace; the chat itself just runs without background.
    let load = ProfileContext::load(&config.profile_path, &config.summary_path);
    if let Some(warning) = &load.warning {
        trace.log_startup(warning);
    }

    let engine = ChatEngine::new(
        provider,
        notifier,
        load.context,
        config.persona_name.clone(),
        config.agent,
    )
    .with_trace(trace.clone());

    let state = AppState {
        session_id,
        model: config.openai_model.clone(),
        theme_config: config.theme.clone(),
        color: cli::color_enabled_from_env(),
        startup_messages,
        trace,
    };

    run_chat(Arc::new(engine), state).await
}

fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
