use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::{DefaultTerminal, Frame};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::agent::{AgentProgressEvent, ChatEngine, ChatReply};
use crate::cli::commands::{Command, HELP_TEXT, is_command_line, parse_command};
use crate::cli::theme::Theme;
use crate::cli::timeline::{OutputKind, StepEvent, Timeline, TurnState, USER_PROMPT};
use crate::config::{ThemeConfig, ThemeToken};
use crate::llm::provider::{ChatMessage, LlmProvider};
use crate::notify::Notifier;
use crate::trace::SessionTrace;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const PAGE_SCROLL: u16 = 10;

/// Everything the shell needs besides the engine itself.
pub struct AppState {
    pub session_id: String,
    pub model: String,
    pub theme_config: ThemeConfig,
    pub color: bool,
    pub startup_messages: Vec<String>,
    pub trace: SessionTrace,
}

pub fn welcome_message(persona: &str) -> String {
    format!("Hi! I'm {persona}. Ask me anything about my career, background, or experience.")
}

pub async fn run_chat<P, N>(engine: Arc<ChatEngine<P, N>>, state: AppState) -> Result<()>
where
    P: LlmProvider + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let mut app = ChatApp::new(engine, state);
    let mut terminal = ratatui::try_init()?;
    let result = event_loop(&mut terminal, &mut app).await;
    ratatui::try_restore()?;
    result
}

async fn event_loop<P, N>(terminal: &mut DefaultTerminal, app: &mut ChatApp<P, N>) -> Result<()>
where
    P: LlmProvider + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    while !app.should_quit() {
        app.drain_updates();
        terminal.draw(|frame| app.draw(frame))?;

        // Short poll so a finished turn repaints without waiting for a key.
        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        } else {
            tokio::task::yield_now().await;
        }
    }

    Ok(())
}

pub(crate) enum TurnUpdate {
    Progress {
        turn: usize,
        event: AgentProgressEvent,
    },
    Finished {
        turn: usize,
        message: String,
        reply: ChatReply,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UiRegions {
    pub(crate) timeline: Rect,
    pub(crate) input: Rect,
    pub(crate) status: Rect,
}

pub(crate) fn layout_regions(area: Rect) -> UiRegions {
    let [timeline, input, status] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);
    UiRegions {
        timeline,
        input,
        status,
    }
}

pub(crate) struct ChatApp<P, N> {
    engine: Arc<ChatEngine<P, N>>,
    state: AppState,
    theme: Theme,
    welcome: String,
    timeline: Timeline,
    conversation: Vec<ChatMessage>,
    input: String,
    input_history: Vec<String>,
    history_cursor: Option<usize>,
    show_steps: bool,
    scroll_back: u16,
    in_flight: Option<usize>,
    updates_tx: UnboundedSender<TurnUpdate>,
    updates_rx: UnboundedReceiver<TurnUpdate>,
    should_quit: bool,
}

impl<P, N> ChatApp<P, N>
where
    P: LlmProvider + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub(crate) fn new(engine: Arc<ChatEngine<P, N>>, state: AppState) -> Self {
        let (updates_tx, updates_rx) = unbounded_channel();
        let theme = Theme::from_config(state.color, &state.theme_config);
        let welcome = welcome_message(engine.persona());

        let mut timeline = Timeline::new();
        timeline.push_output(OutputKind::SystemInfo, &welcome);
        for message in &state.startup_messages {
            timeline.push_output(OutputKind::SystemError, message);
        }

        Self {
            engine,
            state,
            theme,
            welcome,
            timeline,
            conversation: Vec::new(),
            input: String::new(),
            input_history: Vec::new(),
            history_cursor: None,
            show_steps: false,
            scroll_back: 0,
            in_flight: None,
            updates_tx,
            updates_rx,
            should_quit: false,
        }
    }

    pub(crate) fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    #[cfg(test)]
    pub(crate) fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => self.should_quit = true,
            KeyCode::Char('t') if ctrl => self.show_steps = !self.show_steps,
            KeyCode::Char(ch) if !ctrl => {
                self.input.push(ch);
                self.history_cursor = None;
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Enter => self.submit(),
            KeyCode::Up => self.recall_previous(),
            KeyCode::Down => self.recall_next(),
            KeyCode::PageUp => self.scroll_back = self.scroll_back.saturating_add(PAGE_SCROLL),
            KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(PAGE_SCROLL),
            _ => {}
        }
    }

    pub(crate) fn drain_updates(&mut self) {
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply_update(update);
        }
    }

    pub(crate) fn draw(&mut self, frame: &mut Frame) {
        let regions = layout_regions(frame.area());

        let lines = self
            .timeline
            .render_lines(&self.theme, self.show_steps, &self.welcome);
        let timeline = Paragraph::new(lines).wrap(Wrap { trim: false });
        // Word-wrapped rows, as the renderer lays them out.
        let rows =
            u16::try_from(timeline.line_count(regions.timeline.width)).unwrap_or(u16::MAX);
        let max_scroll = rows.saturating_sub(regions.timeline.height);
        self.scroll_back = self.scroll_back.min(max_scroll);
        frame.render_widget(
            timeline.scroll((max_scroll - self.scroll_back, 0)),
            regions.timeline,
        );

        let input_line = Line::from(vec![
            Span::styled(USER_PROMPT, self.theme.style(ThemeToken::UserPrompt)),
            Span::styled(self.input.clone(), self.theme.style(ThemeToken::UserInput)),
        ]);
        let cursor_offset = u16::try_from(input_line.width()).unwrap_or(u16::MAX);
        frame.render_widget(
            Paragraph::new(input_line).style(self.theme.style(ThemeToken::InputBlock)),
            regions.input,
        );
        let max_x = regions.input.right().saturating_sub(1);
        frame.set_cursor_position(Position::new(
            regions.input.x.saturating_add(cursor_offset).min(max_x),
            regions.input.y,
        ));

        frame.render_widget(
            Paragraph::new(self.status_text()).style(self.theme.style(ThemeToken::Status)),
            regions.status,
        );
    }

    fn status_text(&self) -> String {
        let steps = if self.show_steps { "on" } else { "off" };
        let activity = if self.is_busy() { "answering..." } else { "ready" };
        format!(
            " {} | {} | steps: {steps} | {activity}",
            self.engine.persona(),
            self.state.model
        )
    }

    fn submit(&mut self) {
        let raw = std::mem::take(&mut self.input);
        let line = raw.trim();
        self.history_cursor = None;
        if line.is_empty() {
            return;
        }

        self.input_history.push(line.to_string());
        self.scroll_back = 0;

        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            self.should_quit = true;
            return;
        }

        if is_command_line(line) {
            self.run_command(line);
        } else {
            self.start_turn(line);
        }
    }

    fn recall_previous(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let index = match self.history_cursor {
            Some(index) => index.saturating_sub(1),
            None => self.input_history.len() - 1,
        };
        self.history_cursor = Some(index);
        self.input = self.input_history[index].clone();
    }

    fn recall_next(&mut self) {
        let Some(index) = self.history_cursor else {
            return;
        };
        if index + 1 < self.input_history.len() {
            self.history_cursor = Some(index + 1);
            self.input = self.input_history[index + 1].clone();
        } else {
            self.history_cursor = None;
            self.input.clear();
        }
    }

    fn run_command(&mut self, line: &str) {
        self.timeline.push_user_command(line);
        self.state.trace.log_command(line);

        match parse_command(line) {
            Ok(command) => self.apply_command(command),
            Err(err) => self.emit(OutputKind::SystemError, err.message()),
        }
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::Help => self.emit(OutputKind::SystemInfo, HELP_TEXT),
            Command::Clear if self.is_busy() => self.emit(
                OutputKind::SystemError,
                "Wait for the current answer before clearing.",
            ),
            Command::Clear => self.timeline.clear(),
            Command::Reset if self.is_busy() => self.emit(
                OutputKind::SystemError,
                "Wait for the current answer before resetting.",
            ),
            Command::Reset => {
                self.conversation.clear();
                self.emit(OutputKind::SystemInfo, "Conversation history cleared.");
            }
            Command::History(limit) => {
                let text = format_history(&self.input_history, limit);
                self.emit(OutputKind::SystemInfo, &text);
            }
            Command::Trace => {
                let text = format!(
                    "session: {}\ntrace: {}",
                    self.state.session_id,
                    self.state.trace.file_path().display()
                );
                self.emit(OutputKind::SystemInfo, &text);
            }
            Command::Steps(setting) => {
                self.show_steps = setting.unwrap_or(!self.show_steps);
                let text = format!("steps: {}", if self.show_steps { "on" } else { "off" });
                self.emit(OutputKind::SystemInfo, &text);
            }
        }
    }

    fn emit(&mut self, kind: OutputKind, text: &str) {
        self.timeline.push_output(kind, text);
        self.state.trace.log_shell_output(text);
    }

    fn start_turn(&mut self, line: &str) {
        if self.is_busy() {
            self.emit(
                OutputKind::SystemError,
                "Still answering your previous message. Please wait.",
            );
            return;
        }

        let turn = self.timeline.push_chat_turn(line.to_string());
        self.in_flight = Some(turn);

        let engine = Arc::clone(&self.engine);
        let history = self.conversation.clone();
        let updates = self.updates_tx.clone();
        let message = line.to_string();
        tokio::spawn(async move {
            let progress = updates.clone();
            let reply = engine
                .chat_with_events(&message, &history, &mut |event| {
                    let _ = progress.send(TurnUpdate::Progress { turn, event });
                })
                .await;
            let _ = updates.send(TurnUpdate::Finished {
                turn,
                message,
                reply,
            });
        });
    }

    fn apply_update(&mut self, update: TurnUpdate) {
        match update {
            TurnUpdate::Progress { turn, event } => {
                let step = match event {
                    AgentProgressEvent::ToolRequest {
                        name, arguments, ..
                    } => StepEvent::ToolRequest {
                        text: format!("-> {name} {arguments}"),
                    },
                    AgentProgressEvent::ToolResult { name, content, .. } => {
                        StepEvent::ToolResult {
                            text: format!("<- {name} {content}"),
                        }
                    }
                    AgentProgressEvent::RoundStarted { .. }
                    | AgentProgressEvent::ModelResponse { .. } => return,
                };
                if let Some(chat_turn) = self.timeline.chat_turn_mut(turn) {
                    chat_turn.steps.push(step);
                }
            }
            TurnUpdate::Finished {
                turn,
                message,
                reply,
            } => {
                if self.in_flight == Some(turn) {
                    self.in_flight = None;
                }
                if let Some(chat_turn) = self.timeline.chat_turn_mut(turn) {
                    chat_turn.usage = Some(reply.usage);
                    chat_turn.state = if reply.degraded {
                        TurnState::Degraded(reply.text.clone())
                    } else {
                        TurnState::Answered(reply.text.clone())
                    };
                }
                self.conversation.push(ChatMessage::user(message));
                self.conversation.push(ChatMessage::assistant(reply.text));
            }
        }
    }
}

fn format_history(entries: &[String], limit: Option<usize>) -> String {
    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
    entries
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(index, entry)| format!("{:>4}  {entry}", index + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
