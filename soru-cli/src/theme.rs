use ratatui::style::{Color, Modifier, Style};

// ── Slate: cool blue-grey backgrounds ───────────────────────────────
pub const SLATE: Color = Color::Rgb(15, 17, 26);
pub const SLATE_RAISED: Color = Color::Rgb(24, 27, 40);
pub const SLATE_PANEL: Color = Color::Rgb(32, 36, 52);

// ── Ash: structural greys ──────────────────────────────────────────
pub const ASH: Color = Color::Rgb(52, 56, 72);
pub const ASH_MID: Color = Color::Rgb(86, 90, 110);
pub const ASH_TEXT: Color = Color::Rgb(112, 116, 136);

// ── Chalk: text hierarchy ──────────────────────────────────────────
pub const CHALK_DIM: Color = Color::Rgb(140, 146, 168);
pub const CHALK_MID: Color = Color::Rgb(200, 204, 220);
pub const CHALK: Color = Color::Rgb(232, 234, 244);

// ── Accent colors ──────────────────────────────────────────────────
pub const VIOLET: Color = Color::Rgb(167, 139, 250);
pub const AMBER: Color = Color::Rgb(252, 211, 77);
pub const SKY: Color = Color::Rgb(125, 211, 252);
pub const TEAL: Color = Color::Rgb(94, 234, 212);
pub const GREEN: Color = Color::Rgb(134, 239, 172);
pub const ERROR: Color = Color::Rgb(248, 113, 113);

/// Answer buttons A–E, in order.
pub const ANSWER_COLORS: [Color; 5] = [
    Color::Rgb(14, 165, 233),
    Color::Rgb(16, 185, 129),
    Color::Rgb(245, 158, 11),
    Color::Rgb(244, 63, 94),
    Color::Rgb(139, 92, 246),
];

// ── Character constants ────────────────────────────────────────────
pub const PROMPT_CHAR: &str = "❯";
pub const STATUS_SEP: &str = " · ";
pub const PASSWORD_MASK: char = '•';

// ── Style helpers ──────────────────────────────────────────────────

/// Violet bold `❯` prompt character
pub fn prompt() -> Style {
    Style::default().fg(VIOLET).add_modifier(Modifier::BOLD)
}

/// Text typed into the input box
pub fn user_input() -> Style {
    Style::default().fg(CHALK_MID)
}

/// Greyed-out placeholder inside an empty input
pub fn placeholder() -> Style {
    Style::default().fg(ASH_MID).add_modifier(Modifier::ITALIC)
}

/// Body text of solution sections and chat replies
pub fn body() -> Style {
    Style::default().fg(CHALK)
}

/// `**…**` emphasis, patched over the surrounding style
pub fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

/// Typeset math
pub fn math() -> Style {
    Style::default().fg(SKY)
}

/// Math that could not be typeset, shown raw
pub fn math_fallback() -> Style {
    Style::default().fg(ASH_TEXT).add_modifier(Modifier::ITALIC)
}

/// `### … ###` headings inside a solution body
pub fn fragment_heading() -> Style {
    Style::default().fg(VIOLET).add_modifier(Modifier::BOLD)
}

/// Leading icon of a paragraph
pub fn icon() -> Style {
    Style::default().fg(AMBER)
}

/// Section titles ("Çözüm Adımları:" etc.) in their accent color
pub fn section_title(accent: Color) -> Style {
    Style::default().fg(accent).add_modifier(Modifier::BOLD)
}

/// Final answer line
pub fn final_answer() -> Style {
    Style::default().fg(GREEN).add_modifier(Modifier::BOLD)
}

pub fn success() -> Style {
    Style::default().fg(GREEN)
}

pub fn error() -> Style {
    Style::default().fg(ERROR)
}

/// Dimmed explanatory text
pub fn system_message() -> Style {
    Style::default().fg(ASH_TEXT)
}

/// Step headings ("1. Adım: …")
pub fn step_title() -> Style {
    Style::default().fg(CHALK_MID).add_modifier(Modifier::BOLD)
}

/// Unfocused choice (subject / answer button)
pub fn choice() -> Style {
    Style::default().fg(CHALK_DIM).bg(SLATE_PANEL)
}

/// Choice under the cursor
pub fn choice_cursor() -> Style {
    Style::default()
        .fg(SLATE)
        .bg(CHALK_MID)
        .add_modifier(Modifier::BOLD)
}

/// Committed choice
pub fn choice_selected() -> Style {
    Style::default()
        .fg(SLATE)
        .bg(VIOLET)
        .add_modifier(Modifier::BOLD)
}

/// Answer button A–E
pub fn answer_button(index: usize) -> Style {
    let bg = ANSWER_COLORS[index % ANSWER_COLORS.len()];
    Style::default()
        .fg(Color::White)
        .bg(bg)
        .add_modifier(Modifier::BOLD)
}

/// Student turns in the teacher chat
pub fn chat_user() -> Style {
    Style::default().fg(VIOLET).add_modifier(Modifier::BOLD)
}

/// Teacher turns in the teacher chat
pub fn chat_model() -> Style {
    Style::default().fg(TEAL).add_modifier(Modifier::BOLD)
}

/// Help bar key labels
pub fn help_key() -> Style {
    Style::default().fg(VIOLET).add_modifier(Modifier::BOLD)
}

/// Help bar descriptions
pub fn help_desc() -> Style {
    Style::default().fg(ASH_MID)
}

/// Input area border
pub fn input_border() -> Style {
    Style::default().fg(ASH)
}

/// Focused input border
pub fn input_border_focused() -> Style {
    Style::default().fg(VIOLET)
}

/// Disabled input (chat while a reply is pending)
pub fn input_disabled() -> Style {
    Style::default().fg(ASH_MID)
}

/// Spinner character
pub fn spinner() -> Style {
    Style::default().fg(VIOLET)
}

/// "soru" title in status bar
pub fn app_title() -> Style {
    Style::default().fg(VIOLET).add_modifier(Modifier::BOLD)
}

/// Model name in status bar
pub fn model_name() -> Style {
    Style::default().fg(CHALK_DIM)
}

/// Status bar separator ( · )
pub fn status_separator() -> Style {
    Style::default().fg(ASH_MID)
}

/// Status text next to spinner
pub fn status_text() -> Style {
    Style::default().fg(ASH_TEXT)
}

/// Status bar and help bar background
pub fn bar_bg() -> Style {
    Style::default().bg(SLATE_RAISED)
}

/// Main area background
pub fn page_bg() -> Style {
    Style::default().bg(SLATE)
}

/// Panels (feedback bar, correction prompt, chat box)
pub fn panel() -> Style {
    Style::default().bg(SLATE_PANEL)
}

/// Scroll indicator in status bar
pub fn scroll_indicator() -> Style {
    Style::default().fg(AMBER).add_modifier(Modifier::BOLD)
}

/// Image attachment badge
pub fn image_attachment() -> Style {
    Style::default().fg(AMBER)
}
