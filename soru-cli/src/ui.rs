use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap},
};
use soru::auth::PASSWORD_HELP;
use soru::workflow::{Feedback, LOADING_MESSAGE};
use soru::{ChatRole, SessionState, SolvePhase, Subject};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{ANSWER_SLOTS, App, AuthMode, Focus, InputMode, NoticeKind, SUBJECT_COLUMNS};
use crate::command::COMMANDS;
use crate::fragments::Tone;
use crate::theme;
use crate::util::{format_bytes, format_duration_ms, spinner_frame};

const DONT_KNOW: &str = "Cevabı Bilmiyorum / Şık Yok";
pub const SIMPLIFIED_TITLE: &str = "🤔 Soruyu Basitleştirelim!";
pub const STEPS_TITLE: &str = "🚀 Çözüm Adımları:";
pub const FINAL_ANSWER_TITLE: &str = "🎉 Nihai Cevap: ";
pub const RECOMMENDATIONS_TITLE: &str = "📚 Berkant Hoca'dan Tavsiyeler!";

pub fn solution_title(subject: Subject) -> String {
    format!("💡 {subject} Sorusu Çözümü")
}
const AUTH_HEADER_ROWS: u16 = 5;

pub fn draw(frame: &mut Frame, app: &App) {
    // Paint the whole frame so no terminal background bleeds through
    frame.render_widget(Block::default().style(theme::page_bg()), frame.area());

    let input_h = if app.session.is_approved() { 3 } else { 0 };
    let chunks = Layout::vertical([
        Constraint::Length(1),       // status bar
        Constraint::Min(3),          // page
        Constraint::Length(input_h), // input (solver page only)
        Constraint::Length(1),       // help bar
    ])
    .split(frame.area());

    draw_status_bar(frame, app, chunks[0]);
    match &app.session {
        SessionState::Loading => draw_loading(frame, app, chunks[1]),
        SessionState::LoggedOut => draw_auth(frame, app, chunks[1]),
        SessionState::Unapproved(identity) => {
            draw_unapproved(frame, identity.display_name(), chunks[1])
        }
        SessionState::Approved(_) => {
            draw_solver(frame, app, chunks[1]);
            draw_input(frame, app, chunks[2]);
        }
    }
    draw_help_bar(frame, app, chunks[3]);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" soru", theme::app_title()),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(app.model.clone(), theme::model_name()),
    ];
    let who = if app.offline {
        Some("çevrimdışı".to_string())
    } else {
        app.session.identity().map(|i| i.display_name().to_string())
    };
    if let Some(who) = who {
        spans.push(Span::styled(theme::STATUS_SEP, theme::status_separator()));
        spans.push(Span::styled(who, theme::status_text()));
    }

    let right = if let Some(started) = app.solve_started {
        Some(Span::styled(
            format!(
                "{} {} ",
                spinner_frame(app.tick),
                format_duration_ms(started.elapsed().as_millis() as u64)
            ),
            theme::spinner(),
        ))
    } else if !app.follow_tail && app.scroll > 0 && app.session.is_approved() {
        Some(Span::styled(" KAYDIRMA ", theme::scroll_indicator()))
    } else {
        None
    };
    if let Some(right) = right {
        let left_width: usize = spans.iter().map(|s| s.content.width()).sum();
        let pad = (area.width as usize).saturating_sub(left_width + right.content.width());
        spans.push(Span::raw(" ".repeat(pad)));
        spans.push(right);
    }

    let bar = Paragraph::new(Line::from(spans)).style(theme::bar_bg());
    frame.render_widget(bar, area);
}

/// A `width` × `height` box centered in `area`, clipped to it.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn card(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme::input_border())
        .title(Span::styled(format!(" {title} "), theme::app_title()))
        .style(theme::panel())
}

fn draw_loading(frame: &mut Frame, app: &App, area: Rect) {
    let rect = centered(area, 40, 3);
    let line = Line::from(vec![
        Span::styled(spinner_frame(app.tick), theme::spinner()),
        Span::styled(" Oturum kontrol ediliyor...", theme::status_text()),
    ]);
    frame.render_widget(Paragraph::new(vec![Line::default(), line]).centered(), rect);
}

// ── Sign-in / sign-up ───────────────────────────────────────────────

fn draw_auth(frame: &mut Frame, app: &App, area: Rect) {
    let auth = &app.auth;
    let fields = auth.fields();
    let (mode_title, submit, switch) = match auth.mode {
        AuthMode::Login => ("Giriş Yap", "Giriş Yap", "Hesabınız yok mu? Kayıt Olun"),
        AuthMode::Signup => ("Hesap Oluştur", "Hesap Oluştur", "Zaten hesabınız var mı? Giriş Yapın"),
    };

    let mut lines = vec![
        Line::from(Span::styled("Soru Çözücü", theme::app_title())),
        Line::from(Span::styled(
            "Soru Çözücü evrenine hoş geldiniz!",
            theme::system_message(),
        )),
        Line::default(),
        Line::from(Span::styled(mode_title, theme::step_title())),
        Line::default(),
    ];
    for (i, (placeholder, secret)) in fields.iter().enumerate() {
        let focused = i == auth.field;
        let value = auth.value(i);
        let marker = if focused {
            Span::styled(format!("{} ", theme::PROMPT_CHAR), theme::prompt())
        } else {
            Span::raw("  ")
        };
        let content = if value.is_empty() {
            Span::styled(placeholder.to_string(), theme::placeholder())
        } else if *secret {
            Span::styled(
                theme::PASSWORD_MASK.to_string().repeat(value.chars().count()),
                theme::user_input(),
            )
        } else {
            Span::styled(value.to_string(), theme::user_input())
        };
        lines.push(Line::from(vec![marker, content]));
    }
    lines.push(Line::default());

    if auth.busy {
        lines.push(Line::from(vec![
            Span::styled(spinner_frame(app.tick), theme::spinner()),
            Span::styled(" İşleniyor...", theme::status_text()),
        ]));
    } else if let Some(error) = &auth.error {
        lines.push(Line::from(Span::styled(error.clone(), theme::error())));
    }
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled("Enter", theme::help_key()),
        Span::styled(format!(" {submit}   "), theme::help_desc()),
        Span::styled("F2", theme::help_key()),
        Span::styled(format!(" {switch}"), theme::help_desc()),
    ]));
    if auth.mode == AuthMode::Login {
        lines.push(Line::from(vec![
            Span::styled("F1", theme::help_key()),
            Span::styled(" Şifrenizi mi unuttunuz?", theme::help_desc()),
        ]));
    }
    if auth.show_password_help {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Şifre Yardımı", theme::step_title())));
        lines.push(Line::from(Span::styled(PASSWORD_HELP, theme::body())));
    }

    let height = lines.len() as u16 + 4;
    let rect = centered(area, 64, height);
    frame.render_widget(Clear, rect);
    let block = card("Soru Çözücü").padding(Padding::horizontal(1));
    let inner = block.inner(rect);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        rect,
    );

    if !auth.busy {
        let value_width = if fields.get(auth.field).is_some_and(|(_, secret)| *secret) {
            auth.value(auth.field).chars().count()
        } else {
            auth.value(auth.field).width()
        };
        let x = inner.x + 2 + value_width as u16;
        let y = inner.y + AUTH_HEADER_ROWS + auth.field as u16;
        if x < inner.right() && y < inner.bottom() {
            frame.set_cursor_position((x, y));
        }
    }
}

fn draw_unapproved(frame: &mut Frame, who: &str, area: Rect) {
    let lines = vec![
        Line::from(Span::styled("⏳ Onay Bekleniyor", theme::section_title(theme::AMBER))),
        Line::default(),
        Line::from(Span::styled(
            "Hesabınız başarıyla oluşturuldu. Uygulamayı kullanabilmek için yöneticinin hesabınızı onaylaması gerekmektedir.",
            theme::body(),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Lütfen daha sonra tekrar deneyin.",
            theme::system_message(),
        )),
        Line::from(Span::styled(who.to_string(), theme::model_name())),
        Line::default(),
        Line::from(vec![
            Span::styled("Enter", theme::help_key()),
            Span::styled(" Çıkış Yap", theme::help_desc()),
        ]),
    ];
    let rect = centered(area, 64, 14);
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines)
            .block(card("Soru Çözücü").padding(Padding::horizontal(1)))
            .wrap(Wrap { trim: false }),
        rect,
    );
}

// ── Solver page ─────────────────────────────────────────────────────

fn draw_solver(frame: &mut Frame, app: &App, area: Rect) {
    let inner = Rect {
        x: area.x + 1,
        width: area.width.saturating_sub(2),
        ..area
    };
    let lines = solver_lines(app);
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });

    let total = paragraph.line_count(inner.width);
    let max = total.saturating_sub(inner.height as usize).min(u16::MAX as usize) as u16;
    app.max_scroll.set(max);
    let offset = if app.follow_tail {
        max
    } else {
        app.scroll.min(max)
    };

    frame.render_widget(paragraph.scroll((offset, 0)), inner);
}

fn step(title: &str) -> Line<'static> {
    Line::from(Span::styled(title.to_string(), theme::step_title()))
}

fn solver_lines(app: &App) -> Vec<Line<'static>> {
    let wf = &app.workflow;
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Soru Çözücü", theme::app_title()),
            Span::styled("  Her Soru, Yeni Bir Keşif", theme::system_message()),
        ]),
        Line::default(),
        step("1. Adım: Fotoğraf Yükle"),
    ];

    match wf.image() {
        Some(image) => lines.push(Line::from(vec![
            Span::styled(
                format!(
                    "📷 {} · {} · {}",
                    app.image_label.as_deref().unwrap_or("resim"),
                    format_bytes(image.len()),
                    image.mime_type()
                ),
                theme::image_attachment(),
            ),
            Span::styled("   /new", theme::help_key()),
            Span::styled(" Yeni Soru Yükle", theme::help_desc()),
        ])),
        None => lines.push(Line::from(Span::styled(
            "Resim dosyasının yolunu aşağıya yazıp Enter'a basın ya da Ctrl+V ile panodan yapıştırın.",
            theme::system_message(),
        ))),
    }
    lines.push(Line::default());

    if app.choices_open() {
        push_subject_grid(app, &mut lines);
        if let Some(subject) = wf.subject() {
            push_answer_row(app, subject, &mut lines);
        }
    }

    match wf.phase() {
        SolvePhase::Loading { .. } => {
            lines.push(Line::from(vec![
                Span::styled(spinner_frame(app.tick), theme::spinner()),
                Span::styled(format!(" {LOADING_MESSAGE}"), theme::status_text()),
            ]));
        }
        SolvePhase::Failed { message, .. } => {
            lines.push(Line::from(Span::styled(format!("⚠ {message}"), theme::error())));
            lines.push(Line::from(vec![
                Span::styled("Enter", theme::help_key()),
                Span::styled(" tekrar dene  ", theme::help_desc()),
                Span::styled("/new", theme::help_key()),
                Span::styled(" yeni soru", theme::help_desc()),
            ]));
        }
        SolvePhase::Solved {
            subject,
            solution,
            feedback,
            ..
        } => {
            push_solution(app, *subject, solution, &mut lines);
            push_feedback(feedback, &mut lines);
            push_chat(app, &mut lines);
        }
        _ => {}
    }

    if app.show_help {
        lines.push(Line::default());
        lines.push(step("Komutlar"));
        for (cmd, desc) in COMMANDS {
            lines.push(Line::from(vec![
                Span::styled(format!("  {cmd:<14}"), theme::help_key()),
                Span::styled(desc.to_string(), theme::help_desc()),
            ]));
        }
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<14}", "PgUp/PgDn"), theme::help_key()),
            Span::styled("Sayfayı kaydır", theme::help_desc()),
        ]));
    }

    if let Some(notice) = &app.notice {
        let style = match notice.kind {
            NoticeKind::Info => theme::system_message(),
            NoticeKind::Success => theme::success(),
            NoticeKind::Error => theme::error(),
        };
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(notice.text.clone(), style)));
    }
    lines
}

fn push_subject_grid(app: &App, lines: &mut Vec<Line<'static>>) {
    let selected = app.workflow.subject();
    lines.push(step("2. Adım: Dersi Seç"));
    for (row, chunk) in Subject::ALL.chunks(SUBJECT_COLUMNS).enumerate() {
        let mut spans = Vec::new();
        for (col, subject) in chunk.iter().enumerate() {
            let index = row * SUBJECT_COLUMNS + col;
            let style = if app.focus == Focus::Subject && app.subject_cursor == index {
                theme::choice_cursor()
            } else if selected == Some(*subject) {
                theme::choice_selected()
            } else {
                theme::choice()
            };
            spans.push(Span::styled(format!(" {:^10} ", subject.name()), style));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::default());
}

fn push_answer_row(app: &App, subject: Subject, lines: &mut Vec<Line<'static>>) {
    lines.push(step("3. Adım: Cevabı Seç ve Çözümü Başlat"));
    lines.push(Line::from(vec![
        Span::styled("Seçilen Ders: ", theme::system_message()),
        Span::styled(subject.name(), theme::section_title(theme::VIOLET)),
    ]));
    let mut spans = Vec::new();
    for slot in 0..ANSWER_SLOTS {
        let on_cursor = app.focus == Focus::Answer && app.answer_cursor == slot;
        let (label, style) = match App::answer_at(slot).prompt_label() {
            letter if slot < ANSWER_SLOTS - 1 => (format!("  {letter}  "), theme::answer_button(slot)),
            _ => (format!(" {DONT_KNOW} "), theme::choice()),
        };
        let style = if on_cursor {
            style.add_modifier(Modifier::REVERSED)
        } else {
            style
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }
    lines.push(Line::from(spans));
    lines.push(Line::default());
}

fn push_section(
    app: &App,
    title: &str,
    accent: Color,
    text: &str,
    lines: &mut Vec<Line<'static>>,
) {
    lines.push(Line::from(Span::styled(title.to_string(), theme::section_title(accent))));
    lines.extend(app.cache.lines(text, Tone::Body));
    lines.push(Line::default());
}

fn push_solution(
    app: &App,
    subject: Subject,
    solution: &soru::Solution,
    lines: &mut Vec<Line<'static>>,
) {
    lines.push(Line::from(Span::styled(
        solution_title(subject),
        theme::section_title(theme::VIOLET),
    )));
    lines.push(Line::default());
    push_section(app, SIMPLIFIED_TITLE, theme::AMBER, &solution.simplified_question, lines);
    push_section(app, STEPS_TITLE, theme::SKY, &solution.solution_steps, lines);

    let mut answer = vec![Span::styled(FINAL_ANSWER_TITLE, theme::section_title(theme::GREEN))];
    for line in app.cache.lines(&solution.final_answer, Tone::FinalAnswer) {
        answer.extend(line.spans);
    }
    lines.push(Line::from(answer));
    lines.push(Line::default());

    push_section(app, RECOMMENDATIONS_TITLE, theme::TEAL, &solution.recommendations, lines);

    if let Some(ms) = app.last_solve_ms {
        lines.push(Line::from(Span::styled(
            format!("Çözüldü{}{}", theme::STATUS_SEP, format_duration_ms(ms)),
            theme::system_message(),
        )));
    }
}

fn push_feedback(feedback: &Feedback, lines: &mut Vec<Line<'static>>) {
    match feedback {
        Feedback::Offered => {
            lines.push(Line::default());
            lines.push(Line::from(vec![
                Span::styled("Çözüm Faydalı Oldu mu?  ", theme::step_title()),
                Span::styled("F2", theme::help_key()),
                Span::styled(" 👍 Beğendim   ", theme::success()),
                Span::styled("F3", theme::help_key()),
                Span::styled(" 👎 Hatalı/Eksik", theme::error()),
            ]));
        }
        Feedback::Correcting => {
            lines.push(Line::default());
            lines.push(step("Çözümü Geliştirmeme Yardım Et"));
            lines.push(Line::from(Span::styled(
                "Lütfen gözden kaçırdığım veya yanlış yorumladığım noktayı yaz. Geri bildiriminle soruyu yeniden çözeceğim.",
                theme::system_message(),
            )));
            lines.push(Line::from(vec![
                Span::styled("Enter", theme::help_key()),
                Span::styled(" Gönder ve Yeniden Çöz   ", theme::help_desc()),
                Span::styled("Esc", theme::help_key()),
                Span::styled(" Vazgeç", theme::help_desc()),
            ]));
        }
        Feedback::Liked { .. } => {}
    }
}

fn push_chat(app: &App, lines: &mut Vec<Line<'static>>) {
    let Some(chat) = app.workflow.chat() else {
        return;
    };
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled("👩‍🏫 Öğretmene Sor", theme::step_title()),
        Span::styled("  Aklına Takılan Bir Yer Mi Var?", theme::system_message()),
    ]));
    for turn in chat.turns() {
        let (label, style) = match turn.role {
            ChatRole::User => ("Sen", theme::chat_user()),
            ChatRole::Model => ("Öğretmen", theme::chat_model()),
        };
        lines.push(Line::from(Span::styled(label, style)));
        for line in app.cache.lines(&turn.content, Tone::Chat) {
            let mut spans = vec![Span::raw("  ")];
            spans.extend(line.spans);
            lines.push(Line::from(spans));
        }
    }
    if chat.is_pending() {
        lines.push(Line::from(vec![
            Span::styled(spinner_frame(app.tick), theme::spinner()),
            Span::styled(" Öğretmen yazıyor...", theme::status_text()),
        ]));
    }
}

// ── Input ───────────────────────────────────────────────────────────

/// Slice of `input` that fits `width` columns with the cursor visible.
/// Returns the text and the cursor column within it.
fn input_window(input: &str, cursor: usize, width: usize) -> (String, usize) {
    let mut start = 0;
    while input[start..cursor].width() >= width.max(1) {
        start += input[start..].chars().next().map_or(1, char::len_utf8);
    }
    let mut shown = String::new();
    let mut used = 0;
    for c in input[start..].chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        shown.push(c);
        used += w;
    }
    (shown, input[start..cursor].width())
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let mode = app.input_mode();
    let (title, placeholder) = match mode {
        InputMode::ImagePath => (
            " Resim yolu ",
            "örn. ~/Masaüstü/soru.jpg  (Ctrl+V: panodan yapıştır)",
        ),
        InputMode::Chat => (" Öğretmene Sor ", "Bu soruyla ilgili merak ettiklerini yaz..."),
        InputMode::ChatPending => (" Öğretmene Sor · yanıt bekleniyor ", ""),
        InputMode::Correction => (
            " Düzeltme ",
            "Örn: Analizde üçgenin ikizkenar olduğunu belirtmemişsin...",
        ),
        InputMode::Waiting => (" Bekleyin ", ""),
    };
    let focused = app.focus == Focus::Input;
    let disabled = matches!(mode, InputMode::Waiting | InputMode::ChatPending);
    let border = if focused && !disabled {
        theme::input_border_focused()
    } else {
        theme::input_border()
    };
    let block = Block::default()
        .borders(Borders::TOP | Borders::BOTTOM)
        .border_style(border)
        .title(Span::styled(title, border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let prefix = format!("{} ", theme::PROMPT_CHAR);
    let room = (inner.width as usize).saturating_sub(prefix.width());
    let (shown, cursor_col) = input_window(&app.input, app.cursor_pos, room);
    let text = if app.input.is_empty() {
        Span::styled(placeholder, theme::placeholder())
    } else if disabled {
        Span::styled(shown, theme::input_disabled())
    } else {
        Span::styled(shown, theme::user_input())
    };
    let line = Line::from(vec![Span::styled(prefix.clone(), theme::prompt()), text]);
    frame.render_widget(Paragraph::new(line), inner);

    if focused && inner.height > 0 {
        let x = inner.x + (prefix.width() + cursor_col) as u16;
        if x < inner.right() {
            frame.set_cursor_position((x, inner.y));
        }
    }
}

// ── Help bar ────────────────────────────────────────────────────────

fn key_hints(pairs: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for (key, desc) in pairs {
        spans.push(Span::styled(*key, theme::help_key()));
        spans.push(Span::styled(format!(" {desc}  "), theme::help_desc()));
    }
    Line::from(spans)
}

fn draw_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hints: &[(&str, &str)] = match &app.session {
        SessionState::Loading => &[("^C", "çık")],
        SessionState::LoggedOut => &[
            ("Tab", "alan"),
            ("Enter", "gönder"),
            ("F2", "giriş/kayıt"),
            ("F1", "şifre yardımı"),
            ("^C", "çık"),
        ],
        SessionState::Unapproved(_) => &[("Enter", "çıkış yap"), ("^C", "çık")],
        SessionState::Approved(_) => match (app.focus, app.input_mode()) {
            (Focus::Subject, _) => &[
                ("←/→", "ders"),
                ("Enter", "seç"),
                ("Tab", "cevap"),
                ("Esc", "resim yolu"),
                ("^C", "çık"),
            ],
            (Focus::Answer, _) => &[
                ("A-E", "cevap"),
                ("?", "bilmiyorum"),
                ("Enter", "başlat"),
                ("Esc", "ders"),
                ("^C", "çık"),
            ],
            (Focus::Input, InputMode::ImagePath) => &[
                ("Enter", "yükle"),
                ("^V", "yapıştır"),
                ("Tab", "ders"),
                ("/help", "komutlar"),
                ("^C", "çık"),
            ],
            (Focus::Input, InputMode::Chat | InputMode::ChatPending) => &[
                ("Enter", "sor"),
                ("F2", "beğen"),
                ("F3", "hatalı"),
                ("PgUp/PgDn", "kaydır"),
                ("/new", "yeni soru"),
            ],
            (Focus::Input, InputMode::Correction) => {
                &[("Enter", "gönder ve yeniden çöz"), ("Esc", "vazgeç")]
            }
            (Focus::Input, InputMode::Waiting) => &[("PgUp/PgDn", "kaydır"), ("^C", "çık")],
        },
    };
    let bar = Paragraph::new(key_hints(hints)).style(theme::bar_bg());
    frame.render_widget(bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};
    use soru::{Identity, ImageHandle, Solution};

    fn screen(app: &mut App, width: u16, height: u16) -> String {
        app.prepare_render();
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    // ── input window ──

    #[test]
    fn input_window_fits_short_text() {
        assert_eq!(input_window("abc", 3, 10), ("abc".to_string(), 3));
    }

    #[test]
    fn input_window_scrolls_to_cursor() {
        let (shown, col) = input_window("abcdefghij", 10, 4);
        assert_eq!(shown, "hij");
        assert_eq!(col, 3);
    }

    #[test]
    fn input_window_zero_width() {
        let (shown, col) = input_window("abc", 2, 0);
        assert_eq!(shown, "");
        assert_eq!(col, 0);
    }

    // ── pages ──

    #[test]
    fn unapproved_page() {
        let mut app = App::new("m".into(), false, None);
        app.set_session(SessionState::Unapproved(Identity::new("u").with_email("a@b.c")));
        let out = screen(&mut app, 80, 24);
        assert!(out.contains("Onay Bekleniyor"));
        assert!(out.contains("Çıkış Yap"));
    }

    #[test]
    fn login_page_masks_password() {
        let mut app = App::new("m".into(), false, None);
        app.set_session(SessionState::LoggedOut);
        app.auth.login.email = "ali@okul".into();
        app.auth.login.password = "gizli".into();
        let out = screen(&mut app, 80, 30);
        assert!(out.contains("ali@okul"));
        assert!(out.contains("•••••"));
        assert!(!out.contains("gizli"));
    }

    #[test]
    fn solved_page_shows_sections() {
        let mut app = App::new("m".into(), false, None);
        app.set_session(SessionState::Approved(Identity::new("u")));
        app.image_loaded(ImageHandle::new(vec![0; 2048], "image/png"), "soru.png".into());
        app.workflow.select_subject(Subject::Matematik).unwrap();
        let ticket = app.workflow.begin_solve(soru::AnswerChoice::A).unwrap();
        app.solve_finished(
            ticket.epoch,
            Ok(Solution {
                simplified_question: "🎯 $x^2=4$".into(),
                solution_steps: "✅ $x=2$".into(),
                final_answer: "$x=2$".into(),
                recommendations: "💡 Kareleri ezberle".into(),
            }),
            900,
        );
        let out = screen(&mut app, 100, 60);
        assert!(out.contains("Matematik Sorusu Çözümü"));
        assert!(out.contains("x²=4"));
        assert!(out.contains("Nihai Cevap"));
        assert!(out.contains("Çözüm Faydalı Oldu mu?"));
    }
}
