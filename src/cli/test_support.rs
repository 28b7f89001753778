use anyhow::{Result, bail};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::agent::{AgentConfig, ChatEngine};
use crate::cli::app::{AppState, ChatApp, UiRegions, layout_regions};
use crate::config::ThemeConfig;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, LlmResult,
    TokenUsage, ToolInvocation,
};
use crate::notify::{Notifier, NotifyResult};
use crate::profile::ProfileContext;
use crate::trace::SessionTrace;

const SETTLE_ATTEMPTS: usize = 500;

#[derive(Clone, Default)]
pub(crate) struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<LlmResult<CompletionResponse>>>>,
    seen_inputs: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(responses: Vec<LlmResult<CompletionResponse>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            seen_inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn seen(&self) -> Vec<CompletionRequest> {
        self.seen_inputs.lock().expect("lock").clone()
    }
}

impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        self.seen_inputs.lock().expect("lock").push(request);
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Transport("no scripted response".to_string())))
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> NotifyResult<()> {
        self.sent.lock().expect("lock").push(text.to_string());
        Ok(())
    }
}

pub(crate) fn answer(text: &str, total_tokens: u64) -> LlmResult<CompletionResponse> {
    Ok(CompletionResponse {
        finish_reason: FinishReason::Stop,
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
        usage: Some(TokenUsage {
            input_tokens: total_tokens / 2,
            output_tokens: total_tokens - total_tokens / 2,
            total_tokens,
        }),
    })
}

pub(crate) fn tool_call(id: &str, name: &str, arguments: &str) -> LlmResult<CompletionResponse> {
    Ok(CompletionResponse {
        finish_reason: FinishReason::ToolCalls,
        content: None,
        tool_calls: vec![ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
        usage: None,
    })
}

/// Drives a `ChatApp` on an in-memory terminal with scripted collaborators.
pub(crate) struct UiHarness {
    terminal: Terminal<TestBackend>,
    app: ChatApp<ScriptedProvider, RecordingNotifier>,
    area: Rect,
    provider: ScriptedProvider,
    notifier: RecordingNotifier,
    trace_path: PathBuf,
    _trace_dir: TempDir,
}

impl UiHarness {
    pub(crate) fn new(
        width: u16,
        height: u16,
        responses: Vec<LlmResult<CompletionResponse>>,
    ) -> Result<Self> {
        Self::with_startup_messages(width, height, responses, Vec::new())
    }

    pub(crate) fn with_startup_messages(
        width: u16,
        height: u16,
        responses: Vec<LlmResult<CompletionResponse>>,
        startup_messages: Vec<String>,
    ) -> Result<Self> {
        let trace_dir = tempfile::tempdir()?;
        let trace = SessionTrace::create_in_dir("ui-test", trace_dir.path())?;
        let trace_path = trace.file_path().to_path_buf();

        let provider = ScriptedProvider::new(responses);
        let notifier = RecordingNotifier::default();
        let context = ProfileContext {
            summary: "Backend engineer with a taste for compilers.".to_string(),
            profile: "Experience: Acme Corp, 2019-present.".to_string(),
        };
        let engine = ChatEngine::new(
            provider.clone(),
            notifier.clone(),
            context,
            "Alex Morgan",
            AgentConfig::default(),
        )
        .with_trace(trace.clone());

        let state = AppState {
            session_id: "ui-test".to_string(),
            model: "gpt-test".to_string(),
            theme_config: ThemeConfig::default(),
            color: false,
            startup_messages,
            trace,
        };

        let mut harness = Self {
            terminal: Terminal::new(TestBackend::new(width, height))?,
            app: ChatApp::new(Arc::new(engine), state),
            area: Rect::new(0, 0, width, height),
            provider,
            notifier,
            trace_path,
            _trace_dir: trace_dir,
        };
        harness.render()?;
        Ok(harness)
    }

    pub(crate) fn app(&self) -> &ChatApp<ScriptedProvider, RecordingNotifier> {
        &self.app
    }

    pub(crate) fn provider(&self) -> &ScriptedProvider {
        &self.provider
    }

    pub(crate) fn notifications(&self) -> Vec<String> {
        self.notifier.sent()
    }

    pub(crate) fn trace_contents(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.trace_path)?)
    }

    pub(crate) async fn send_key(&mut self, key: KeyEvent) -> Result<()> {
        self.app.handle_key(key);
        self.settle().await?;
        self.render()
    }

    pub(crate) async fn type_text(&mut self, text: &str) -> Result<()> {
        for ch in text.chars() {
            self.send_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE))
                .await?;
        }
        Ok(())
    }

    pub(crate) async fn submit_line(&mut self, line: &str) -> Result<()> {
        self.type_text(line).await?;
        self.send_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
            .await
    }

    pub(crate) async fn press(&mut self, code: KeyCode) -> Result<()> {
        self.send_key(KeyEvent::new(code, KeyModifiers::NONE)).await
    }

    pub(crate) async fn press_ctrl(&mut self, ch: char) -> Result<()> {
        self.send_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
            .await
    }

    /// Waits for the in-flight turn, if any, to deliver its final update.
    async fn settle(&mut self) -> Result<()> {
        for _ in 0..SETTLE_ATTEMPTS {
            self.app.drain_updates();
            if !self.app.is_busy() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        bail!("chat turn did not finish")
    }

    pub(crate) fn render(&mut self) -> Result<()> {
        self.terminal.draw(|frame| self.app.draw(frame))?;
        Ok(())
    }

    pub(crate) fn regions(&self) -> UiRegions {
        layout_regions(self.area)
    }

    pub(crate) fn buffer_lines(&self) -> Vec<String> {
        let buffer = self.terminal.backend().buffer();
        (0..self.area.height)
            .map(|y| {
                (0..self.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }

    pub(crate) fn region_text(&self, area: Rect) -> String {
        self.buffer_lines()
            .iter()
            .skip(usize::from(area.y))
            .take(usize::from(area.height))
            .map(|line| {
                line.chars()
                    .skip(usize::from(area.x))
                    .take(usize::from(area.width))
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn timeline_text(&self) -> String {
        self.region_text(self.regions().timeline)
    }

    pub(crate) fn input_text(&self) -> String {
        self.region_text(self.regions().input)
    }

    pub(crate) fn status_text(&self) -> String {
        self.region_text(self.regions().status)
    }
}

mod tests {
    use super::{UiHarness, answer, tool_call};
    use crate::agent::ENDPOINT_ERROR_REPLY;
    use crate::llm::provider::{ChatMessage, LlmError};
    use anyhow::Result;
    use crossterm::event::KeyCode;

    #[tokio::test]
    async fn startup_shows_welcome_prompt_and_status() -> Result<()> {
        let harness = UiHarness::with_startup_messages(
            100,
            12,
            Vec::new(),
            vec!["missing OPENAI_API_KEY; every answer will be an apology.".to_string()],
        )?;

        let timeline = harness.timeline_text();
        assert!(timeline.starts_with(
            "Hi! I'm Alex Morgan. Ask me anything about my career, background, or experience."
        ));
        assert!(timeline.contains("missing OPENAI_API_KEY"));
        assert_eq!(harness.input_text(), "you>");
        assert_eq!(
            harness.status_text(),
            " Alex Morgan | gpt-test | steps: off | ready"
        );
        Ok(())
    }

    #[tokio::test]
    async fn submitted_message_renders_answer_and_extends_history() -> Result<()> {
        let mut harness = UiHarness::new(
            100,
            12,
            vec![answer("Rust, Python and a little Go.", 42)],
        )?;

        harness.submit_line("What languages do you know?").await?;

        insta::assert_snapshot!(harness.timeline_text().trim_end(), @r"
        Hi! I'm Alex Morgan. Ask me anything about my career, background, or experience.
        you> What languages do you know?
        Rust, Python and a little Go.
          Tokens (turn): 42
        ");
        assert_eq!(harness.input_text(), "you>");
        assert_eq!(
            harness.app().conversation(),
            &[
                ChatMessage::user("What languages do you know?"),
                ChatMessage::assistant("Rust, Python and a little Go."),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn second_turn_sends_previous_exchange_as_history() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, vec![answer("Hello!", 5), answer("Acme.", 5)])?;

        harness.submit_line("Hi").await?;
        harness.submit_line("Where do you work?").await?;

        let seen = harness.provider().seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            &seen[1].messages[1..],
            &[
                ChatMessage::user("Hi"),
                ChatMessage::assistant("Hello!"),
                ChatMessage::user("Where do you work?"),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn reset_forgets_the_conversation() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, vec![answer("Hello!", 5), answer("Hi again.", 5)])?;

        harness.submit_line("Hi").await?;
        harness.submit_line("/reset").await?;
        assert!(harness.timeline_text().contains("Conversation history cleared."));
        harness.submit_line("Remember me?").await?;

        let seen = harness.provider().seen();
        assert_eq!(seen[1].messages.len(), 2);
        assert_eq!(seen[1].messages[1], ChatMessage::user("Remember me?"));
        Ok(())
    }

    #[tokio::test]
    async fn tool_steps_render_when_enabled() -> Result<()> {
        let mut harness = UiHarness::new(
            120,
            16,
            vec![
                tool_call(
                    "call_1",
                    "record_user_details",
                    r#"{"email":"sam@example.com","name":"Sam"}"#,
                ),
                answer("Thanks Sam, I'll be in touch.", 30),
            ],
        )?;

        harness.press_ctrl('t').await?;
        assert!(harness.status_text().contains("steps: on"));
        harness
            .submit_line("I'm Sam, reach me at sam@example.com")
            .await?;

        let timeline = harness.timeline_text();
        assert!(timeline.contains("Thinking..."));
        assert!(timeline.contains(
            r#"-> record_user_details {"email":"sam@example.com","name":"Sam"}"#
        ));
        assert!(timeline.contains(r#"<- record_user_details {"recorded":"ok"}"#));
        assert!(timeline.contains("Thanks Sam, I'll be in touch."));
        assert_eq!(
            harness.notifications(),
            vec![
                "Recording Sam with email sam@example.com and notes not provided".to_string()
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn tool_steps_stay_hidden_by_default() -> Result<()> {
        let mut harness = UiHarness::new(
            120,
            16,
            vec![
                tool_call(
                    "call_1",
                    "record_unknown_question",
                    r#"{"question":"Favourite chess opening?"}"#,
                ),
                answer("I'm not sure, I've noted the question.", 20),
            ],
        )?;

        harness.submit_line("Favourite chess opening?").await?;

        let timeline = harness.timeline_text();
        assert!(!timeline.contains("record_unknown_question"));
        assert!(!timeline.contains("Thinking..."));
        assert!(timeline.contains("I'm not sure, I've noted the question."));
        Ok(())
    }

    #[tokio::test]
    async fn endpoint_failure_renders_apology() -> Result<()> {
        let mut harness = UiHarness::new(
            100,
            12,
            vec![Err(LlmError::Transport("connection refused".to_string()))],
        )?;

        harness.submit_line("Hello?").await?;

        assert!(harness.timeline_text().contains(ENDPOINT_ERROR_REPLY));
        assert!(harness.status_text().ends_with("ready"));
        Ok(())
    }

    #[tokio::test]
    async fn help_and_unknown_commands_render_in_timeline() -> Result<()> {
        let mut harness = UiHarness::new(100, 20, Vec::new())?;

        harness.submit_line("/help").await?;
        harness.submit_line("/bogus").await?;

        let timeline = harness.timeline_text();
        assert!(timeline.contains("you> /help"));
        assert!(timeline.contains("/steps [on|off]  Show or hide tool steps"));
        assert!(timeline.contains("unknown command '/bogus'. Try /help"));
        assert!(harness.provider().seen().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn steps_command_toggles_and_reports() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, Vec::new())?;

        harness.submit_line("/steps").await?;
        assert!(harness.timeline_text().contains("steps: on"));
        assert!(harness.status_text().contains("steps: on"));

        harness.submit_line("/steps off").await?;
        assert!(harness.status_text().contains("steps: off"));
        Ok(())
    }

    #[tokio::test]
    async fn clear_empties_timeline_back_to_welcome() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, vec![answer("Hello!", 5)])?;

        harness.submit_line("Hi").await?;
        harness.submit_line("/clear").await?;

        assert_eq!(
            harness.timeline_text().trim_end(),
            "Hi! I'm Alex Morgan. Ask me anything about my career, background, or experience."
        );
        assert_eq!(harness.app().conversation().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn up_and_down_walk_input_history() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, vec![answer("Hello!", 5)])?;

        harness.submit_line("Hi").await?;
        harness.submit_line("/trace").await?;

        harness.press(KeyCode::Up).await?;
        assert_eq!(harness.input_text(), "you> /trace");
        harness.press(KeyCode::Up).await?;
        assert_eq!(harness.input_text(), "you> Hi");
        harness.press(KeyCode::Up).await?;
        assert_eq!(harness.input_text(), "you> Hi");
        harness.press(KeyCode::Down).await?;
        assert_eq!(harness.input_text(), "you> /trace");
        harness.press(KeyCode::Down).await?;
        assert_eq!(harness.input_text(), "you>");
        Ok(())
    }

    #[tokio::test]
    async fn backspace_edits_input() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, Vec::new())?;

        harness.type_text("Hellp").await?;
        harness.press(KeyCode::Backspace).await?;
        harness.type_text("o").await?;
        assert_eq!(harness.input_text(), "you> Hello");
        Ok(())
    }

    #[tokio::test]
    async fn quit_words_and_ctrl_c_end_the_session() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, Vec::new())?;
        harness.submit_line("EXIT").await?;
        assert!(harness.app().should_quit());

        let mut harness = UiHarness::new(100, 12, Vec::new())?;
        harness.press_ctrl('c').await?;
        assert!(harness.app().should_quit());
        Ok(())
    }

    #[tokio::test]
    async fn shell_commands_and_output_are_traced() -> Result<()> {
        let mut harness = UiHarness::new(100, 12, Vec::new())?;

        harness.submit_line("/history").await?;

        let trace = harness.trace_contents()?;
        assert!(trace.contains("[shell.cmd  ] /history"));
        assert!(trace.contains("[shell.out  ]    1  /history"));
        Ok(())
    }

    #[tokio::test]
    async fn trace_command_shows_session_and_file() -> Result<()> {
        let mut harness = UiHarness::new(120, 12, Vec::new())?;

        harness.submit_line("/trace").await?;

        let timeline = harness.timeline_text();
        assert!(timeline.contains("session: ui-test"));
        assert!(timeline.contains(&format!("trace: {}", harness.trace_path.display())));
        Ok(())
    }

    #[tokio::test]
    async fn word_wrapped_answer_keeps_its_tail_in_view() -> Result<()> {
        let reply = "aaaa bbbbbbbbbbbbbbbbb cccc ddddddddddddddddd eeee fffffffffffffffff END";
        let mut harness = UiHarness::new(20, 8, vec![answer(reply, 5)])?;

        harness.submit_line("hi").await?;

        let timeline = harness.timeline_text();
        assert!(timeline.contains("fffffffffffffffff"));
        assert!(timeline.contains("END"));
        assert!(timeline.contains("Tokens (turn): 5"));
        Ok(())
    }

    #[tokio::test]
    async fn long_timeline_scrolls_with_page_keys() -> Result<()> {
        let mut harness = UiHarness::new(100, 8, Vec::new())?;

        harness.submit_line("/help").await?;
        assert!(harness.timeline_text().contains("Type quit or exit to leave."));

        harness.press(KeyCode::PageUp).await?;
        let scrolled = harness.timeline_text();
        assert!(scrolled.starts_with("Hi! I'm Alex Morgan."));
        assert!(!scrolled.contains("Type quit or exit to leave."));

        harness.press(KeyCode::PageDown).await?;
        assert!(harness.timeline_text().contains("Type quit or exit to leave."));
        Ok(())
    }
}
