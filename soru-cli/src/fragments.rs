use std::collections::HashMap;

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use soru::render::{self, InlineSpan, RenderFragment};

use crate::math::{MathTypesetter, Typeset};
use crate::theme;

const BLOCK_MATH_INDENT: &str = "    ";

/// Base styling for a piece of rendered text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tone {
    /// Solution sections
    Body,
    /// The final-answer field, typeset as one math span
    FinalAnswer,
    /// Chat turns (flat text)
    Chat,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Tone::Body | Tone::Chat => theme::body(),
            Tone::FinalAnswer => theme::final_answer(),
        }
    }
}

/// Turns parsed fragments into styled terminal lines.
struct LineBuilder<'a> {
    math: &'a MathTypesetter,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
}

impl<'a> LineBuilder<'a> {
    fn new(math: &'a MathTypesetter) -> Self {
        Self {
            math,
            lines: Vec::new(),
            current: Vec::new(),
        }
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn math_span(&self, source: &str, style: Style) -> Span<'static> {
        match self.math.typeset(source, false) {
            Typeset::Rendered(text) => Span::styled(text, style.patch(theme::math())),
            Typeset::Fallback(raw) => Span::styled(format!("${raw}$"), theme::math_fallback()),
        }
    }

    fn push_spans(&mut self, spans: &[InlineSpan], style: Style) {
        for span in spans {
            match span {
                InlineSpan::PlainText(text) => {
                    self.current.push(Span::styled(text.clone(), style));
                }
                InlineSpan::Bold(text) => {
                    self.current
                        .push(Span::styled(text.clone(), style.patch(theme::bold())));
                }
                InlineSpan::InlineMath(source) => {
                    let span = self.math_span(source, style);
                    self.current.push(span);
                }
                InlineSpan::BlockMath(source) => {
                    // Display math always gets its own lines.
                    self.flush_line();
                    let typeset = self.math.typeset(source, true);
                    let (text, math_style) = if typeset.is_fallback() {
                        (format!("$${}$$", typeset.text()), theme::math_fallback())
                    } else {
                        (typeset.text().to_string(), theme::math())
                    };
                    for line in text.lines() {
                        self.lines.push(Line::from(vec![
                            Span::raw(BLOCK_MATH_INDENT),
                            Span::styled(line.trim().to_string(), math_style),
                        ]));
                    }
                }
            }
        }
    }

    fn push_fragment(&mut self, fragment: &RenderFragment, style: Style) {
        match fragment {
            RenderFragment::Heading { spans, .. } => {
                self.flush_line();
                if !self.lines.is_empty() {
                    self.lines.push(Line::default());
                }
                self.current
                    .push(Span::styled("▍ ", theme::fragment_heading()));
                self.push_spans(spans, theme::fragment_heading());
                self.flush_line();
            }
            RenderFragment::Paragraph { icon, spans } => {
                if let Some(icon) = icon {
                    self.current
                        .push(Span::styled(format!("{icon} "), theme::icon()));
                }
                self.push_spans(spans, style);
                self.flush_line();
            }
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        self.lines
    }
}

pub fn render_fragments(
    fragments: &[RenderFragment],
    tone: Tone,
    math: &MathTypesetter,
) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::new(math);
    for fragment in fragments {
        builder.push_fragment(fragment, tone.style());
    }
    builder.finish()
}

/// Parse and render one stored text. The final answer is never segmented.
pub fn render_text(text: &str, tone: Tone, math: &MathTypesetter) -> Vec<Line<'static>> {
    let fragments = match tone {
        Tone::FinalAnswer => vec![RenderFragment::Paragraph {
            icon: None,
            spans: vec![render::final_answer_math(text)],
        }],
        Tone::Body | Tone::Chat => render::parse(text),
    };
    render_fragments(&fragments, tone, math)
}

/// Lines flattened to plain strings, for headless output.
pub fn plain_lines(lines: &[Line<'_>]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect()
}

/// Rendered lines keyed by (tone, source text). Cleared whenever the
/// question changes.
#[derive(Default)]
pub struct RenderCache {
    math: MathTypesetter,
    entries: HashMap<(Tone, String), Vec<Line<'static>>>,
}

impl RenderCache {
    /// Render `text` unless it is already cached.
    pub fn prepare(&mut self, text: &str, tone: Tone) {
        let key = (tone, text.to_string());
        if !self.entries.contains_key(&key) {
            let lines = render_text(text, tone, &self.math);
            self.entries.insert(key, lines);
        }
    }

    /// Cached lines, rendered on the fly on a miss.
    pub fn lines(&self, text: &str, tone: Tone) -> Vec<Line<'static>> {
        match self.entries.get(&(tone, text.to_string())) {
            Some(lines) => lines.clone(),
            None => render_text(text, tone, &self.math),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Modifier;

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        plain_lines(lines)
    }

    fn render(text: &str, tone: Tone) -> Vec<Line<'static>> {
        render_text(text, tone, &MathTypesetter)
    }

    // ── sections ──

    #[test]
    fn headings_and_icons() {
        let lines = render(
            "### Durum 1 ### 🎯 Önce $x+1=2$ yaz\n✅ Sonra $x=1$ bul",
            Tone::Body,
        );
        assert_eq!(
            text_of(&lines),
            vec!["▍ Durum 1", "🎯 Önce x+1=2 yaz", "✅ Sonra x=1 bul"]
        );
        assert_eq!(lines[1].spans[0].style, theme::icon());
    }

    #[test]
    fn blank_line_between_sections() {
        let lines = render("### A ### bir ### B ### iki", Tone::Body);
        assert_eq!(text_of(&lines), vec!["▍ A", "bir", "", "▍ B", "iki"]);
    }

    // ── inline styling ──

    #[test]
    fn bold_and_math_styles() {
        let lines = render("**Dikkat:** $\\frac{1}{2}$ alınır", Tone::Chat);
        let spans = &lines[0].spans;
        assert_eq!(spans[0].content, "Dikkat:");
        assert!(spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(spans[2].content, "1/2");
        assert_eq!(spans[2].style.fg, theme::math().fg);
    }

    #[test]
    fn bold_keeps_surrounding_color() {
        let lines = render("### **Adım** 1 ### metin", Tone::Body);
        let bold = &lines[0].spans[1];
        assert_eq!(bold.content, "Adım");
        assert_eq!(bold.style.fg, theme::fragment_heading().fg);
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn block_math_gets_own_line() {
        let lines = render("Denklem: $$x^2$$ olur", Tone::Chat);
        assert_eq!(text_of(&lines), vec!["Denklem: ", "    x²", " olur"]);
    }

    #[test]
    fn unbalanced_math_shows_source() {
        let lines = render("bak $\\frac{1}{2$", Tone::Chat);
        let last = lines[0].spans.last().unwrap();
        assert_eq!(last.content, "$\\frac{1}{2$");
        assert_eq!(last.style, theme::math_fallback());
    }

    // ── final answer ──

    #[test]
    fn final_answer_is_one_math_span() {
        let lines = render("**$x = 4$**", Tone::FinalAnswer);
        assert_eq!(text_of(&lines), vec!["x = 4"]);
    }

    // ── cache ──

    #[test]
    fn cache_memoizes_by_tone_and_text() {
        let mut cache = RenderCache::default();
        cache.prepare("a $b$", Tone::Chat);
        cache.prepare("a $b$", Tone::Chat);
        assert_eq!(cache.len(), 1);
        cache.prepare("a $b$", Tone::Body);
        assert_eq!(cache.len(), 2);
        assert_eq!(text_of(&cache.lines("a $b$", Tone::Chat)), vec!["a b"]);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(text_of(&cache.lines("yeni", Tone::Chat)), vec!["yeni"]);
    }
}
