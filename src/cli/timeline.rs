use crate::cli::theme::Theme;
use crate::config::ThemeToken;
use crate::llm::provider::TokenUsage;
use ratatui::text::{Line, Span};

pub(crate) const USER_PROMPT: &str = "you> ";
const STEP_PADDING: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputKind {
    SystemInfo,
    SystemError,
}

#[derive(Debug, Clone)]
pub(crate) enum TimelineEntry {
    UserCommand(String),
    OutputLine { kind: OutputKind, text: String },
    ChatTurn(ChatTurn),
}

/// One user message and everything the engine produced for it.
#[derive(Debug, Clone)]
pub(crate) struct ChatTurn {
    pub(crate) prompt: String,
    pub(crate) steps: Vec<StepEvent>,
    pub(crate) state: TurnState,
    pub(crate) usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TurnState {
    InFlight,
    Answered(String),
    Degraded(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepEvent {
    ToolRequest { text: String },
    ToolResult { text: String },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_output(&mut self, kind: OutputKind, text: &str) {
        for line in split_output_lines(text) {
            self.entries.push(TimelineEntry::OutputLine {
                kind,
                text: line.to_string(),
            });
        }
    }

    pub(crate) fn push_user_command(&mut self, text: &str) {
        self.entries
            .push(TimelineEntry::UserCommand(text.to_string()));
    }

    pub(crate) fn push_chat_turn(&mut self, prompt: String) -> usize {
        let index = self.entries.len();
        self.entries.push(TimelineEntry::ChatTurn(ChatTurn {
            prompt,
            steps: Vec::new(),
            state: TurnState::InFlight,
            usage: None,
        }));
        index
    }

    pub(crate) fn chat_turn_mut(&mut self, index: usize) -> Option<&mut ChatTurn> {
        match self.entries.get_mut(index) {
            Some(TimelineEntry::ChatTurn(turn)) => Some(turn),
            _ => None,
        }
    }

    pub(crate) fn render_lines(
        &self,
        theme: &Theme,
        show_steps: bool,
        welcome: &str,
    ) -> Vec<Line<'static>> {
        if self.entries.is_empty() {
            return vec![Line::from(Span::styled(
                welcome.to_string(),
                theme.style(ThemeToken::SystemInfo),
            ))];
        }

        let context = RenderContext { theme, show_steps };
        let mut lines = Vec::new();
        for entry in &self.entries {
            widget_for_entry(entry).render(&context, &mut lines);
        }

        lines
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

trait TimelineWidget {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>);
}

struct RenderContext<'a> {
    theme: &'a Theme,
    show_steps: bool,
}

impl RenderContext<'_> {
    fn prompt_line(&self, text: &str) -> Line<'static> {
        Line::from(vec![
            Span::styled(USER_PROMPT, self.theme.style(ThemeToken::UserPrompt)),
            Span::styled(text.to_string(), self.theme.style(ThemeToken::UserInput)),
        ])
    }

    fn styled_lines(&self, text: &str, token: ThemeToken, lines: &mut Vec<Line<'static>>) {
        for line in split_output_lines(text) {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                self.theme.style(token),
            )));
        }
    }
}

struct CommandWidget<'a> {
    text: &'a str,
}

impl TimelineWidget for CommandWidget<'_> {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>) {
        lines.push(context.prompt_line(self.text));
    }
}

struct OutputLineWidget<'a> {
    kind: OutputKind,
    text: &'a str,
}

impl TimelineWidget for OutputLineWidget<'_> {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>) {
        let token = match self.kind {
            OutputKind::SystemInfo => ThemeToken::SystemInfo,
            OutputKind::SystemError => ThemeToken::SystemError,
        };
        lines.push(Line::from(Span::styled(
            self.text.to_string(),
            context.theme.style(token),
        )));
    }
}

struct ChatTurnWidget<'a> {
    turn: &'a ChatTurn,
}

impl TimelineWidget for ChatTurnWidget<'_> {
    fn render(&self, context: &RenderContext<'_>, lines: &mut Vec<Line<'static>>) {
        lines.push(context.prompt_line(&self.turn.prompt));

        if context.show_steps {
            lines.push(Line::from(""));
            lines.push(thinking_line(context));
            for step in &self.turn.steps {
                let (text, token) = match step {
                    StepEvent::ToolRequest { text } => (text, ThemeToken::ToolRequest),
                    StepEvent::ToolResult { text } => (text, ThemeToken::ToolResult),
                };
                lines.push(Line::from(Span::styled(
                    format!("{STEP_PADDING}{text}"),
                    context.theme.style(token),
                )));
            }
            lines.push(Line::from(""));
        } else if self.turn.state == TurnState::InFlight {
            lines.push(thinking_line(context));
        }

        match &self.turn.state {
            TurnState::InFlight => {}
            TurnState::Answered(text) => {
                context.styled_lines(text, ThemeToken::AssistantText, lines);
                render_turn_token_total(context, lines, self.turn.usage.as_ref());
            }
            TurnState::Degraded(text) => {
                context.styled_lines(text, ThemeToken::SystemError, lines);
                render_turn_token_total(context, lines, self.turn.usage.as_ref());
            }
        }
    }
}

fn thinking_line(context: &RenderContext<'_>) -> Line<'static> {
    Line::from(vec![
        Span::raw(STEP_PADDING),
        Span::styled(
            "Thinking...",
            context.theme.style(ThemeToken::AssistantWaiting),
        ),
    ])
}

fn render_turn_token_total(
    context: &RenderContext<'_>,
    lines: &mut Vec<Line<'static>>,
    usage: Option<&TokenUsage>,
) {
    let Some(usage) = usage else {
        return;
    };
    if usage.is_zero() {
        return;
    }

    let total_text = if usage.total_tokens == 0 {
        "?".to_string()
    } else {
        usage.total_tokens.to_string()
    };
    lines.push(Line::from(Span::styled(
        format!("{STEP_PADDING}Tokens (turn): {total_text}"),
        context.theme.style(ThemeToken::SystemInfo),
    )));
}

fn widget_for_entry(entry: &TimelineEntry) -> Box<dyn TimelineWidget + '_> {
    match entry {
        TimelineEntry::UserCommand(text) => Box::new(CommandWidget { text }),
        TimelineEntry::OutputLine { kind, text } => {
            Box::new(OutputLineWidget { kind: *kind, text })
        }
        TimelineEntry::ChatTurn(turn) => Box::new(ChatTurnWidget { turn }),
    }
}

fn split_output_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }

    text.lines().collect()
}
