//! Segmentation of tutor responses into renderable fragments.
//!
//! The tutor writes loosely structured text: `### title ###` section headers,
//! paragraphs separated by newlines that may start with a pictographic icon,
//! and inline `**bold**`, `$$block math$$` and `$inline math$` spans. This
//! module turns such a blob into an ordered list of [`RenderFragment`]s. It is
//! pure and never fails: anything that does not form a well-formed construct
//! is kept as plain text.
//!
//! Grammar, section level (tokens produced by [`lex`]):
//!
//! ```text
//! document  := (header | body)*
//! header    := HEADER_MARKER TEXT* HEADER_MARKER      -- no NEWLINE in between
//! body      := (TEXT | NEWLINE | unmatched HEADER_MARKER)*
//! ```
//!
//! Grammar, inline level (spans produced by [`InlineLexer`]):
//!
//! ```text
//! line      := (bold | block_math | inline_math | text)*
//! bold      := "**" content "**"
//! block     := "$$" content "$$"
//! inline    := "$" content "$"
//! ```
//!
//! At each position the alternatives are tried in the order above and the
//! first closing delimiter wins. `content` must be non-empty. A `$` preceded
//! by a backslash is never a delimiter. Spans do not nest.

/// Leading glyphs recognised as paragraph icons. A trailing U+FE0F variation
/// selector is accepted after any of them.
pub const ICONS: &[char] = &[
    '\u{1F3AF}', // 🎯
    '\u{1F522}', // 🔢
    '\u{27A1}',  // ➡
    '\u{2705}',  // ✅
    '\u{1F4A1}', // 💡
    '\u{1F50D}', // 🔍
    '\u{1F4DD}', // 📝
    '\u{1F4CC}', // 📌
    '\u{2714}',  // ✔
    '\u{2795}',  // ➕
    '\u{2796}',  // ➖
    '\u{2797}',  // ➗
    '\u{2716}',  // ✖
    '\u{1F7F0}', // 🟰
];

const VARIATION_SELECTOR: char = '\u{FE0F}';
const HEADER_MARKER: &str = "###";

/// One inline piece of a paragraph or heading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InlineSpan {
    PlainText(String),
    Bold(String),
    InlineMath(String),
    BlockMath(String),
}

impl InlineSpan {
    /// Span content without delimiters.
    pub fn content(&self) -> &str {
        match self {
            InlineSpan::PlainText(s)
            | InlineSpan::Bold(s)
            | InlineSpan::InlineMath(s)
            | InlineSpan::BlockMath(s) => s,
        }
    }

    /// Span content with its original delimiters restored.
    pub fn to_markup(&self) -> String {
        match self {
            InlineSpan::PlainText(s) => s.clone(),
            InlineSpan::Bold(s) => format!("**{s}**"),
            InlineSpan::InlineMath(s) => format!("${s}$"),
            InlineSpan::BlockMath(s) => format!("$${s}$$"),
        }
    }

    pub fn is_math(&self) -> bool {
        matches!(self, InlineSpan::InlineMath(_) | InlineSpan::BlockMath(_))
    }
}

/// A block-level piece of rendered output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderFragment {
    /// Section title. `text` is the trimmed title, `spans` its inline parse.
    Heading { text: String, spans: Vec<InlineSpan> },
    Paragraph {
        icon: Option<String>,
        spans: Vec<InlineSpan>,
    },
}

impl RenderFragment {
    pub fn spans(&self) -> &[InlineSpan] {
        match self {
            RenderFragment::Heading { spans, .. } | RenderFragment::Paragraph { spans, .. } => {
                spans
            }
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, RenderFragment::Heading { .. })
    }

    /// Flattened markup for this fragment (a single source line).
    pub fn to_markup(&self) -> String {
        match self {
            RenderFragment::Heading { spans, .. } => {
                format!("{HEADER_MARKER} {} {HEADER_MARKER}", spans_to_markup(spans))
            }
            RenderFragment::Paragraph { icon, spans } => match icon {
                Some(icon) if spans.is_empty() => icon.clone(),
                Some(icon) => format!("{icon} {}", spans_to_markup(spans)),
                None => spans_to_markup(spans),
            },
        }
    }
}

/// Parse a tutor response into fragments.
///
/// Text containing a `###` marker anywhere is parsed in sectioned mode
/// (headings, icon extraction, literal `\n` unescaping). Anything else is a
/// flat list of newline-separated paragraphs, which is what chat replies use.
pub fn parse(text: &str) -> Vec<RenderFragment> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if text.contains(HEADER_MARKER) {
        parse_sectioned(text)
    } else {
        parse_flat(text)
    }
}

/// Reassemble fragments into markup that parses back to the same fragments.
pub fn to_markup(fragments: &[RenderFragment]) -> String {
    fragments
        .iter()
        .map(RenderFragment::to_markup)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tokenise a single line into inline spans. Adjacent plain runs are merged.
pub fn parse_inline(line: &str) -> Vec<InlineSpan> {
    let mut spans: Vec<InlineSpan> = Vec::new();
    for span in InlineLexer::new(line) {
        match (spans.last_mut(), span) {
            (Some(InlineSpan::PlainText(prev)), InlineSpan::PlainText(next)) => {
                prev.push_str(&next);
            }
            (_, span) => spans.push(span),
        }
    }
    spans
}

/// The final-answer field is shown as one math expression: strip every `$`
/// and `*` the model may have added and typeset the rest inline.
pub fn final_answer_math(answer: &str) -> InlineSpan {
    let cleaned: String = answer.chars().filter(|c| *c != '$' && *c != '*').collect();
    InlineSpan::InlineMath(cleaned.trim().to_string())
}

/// Split a leading icon off a paragraph line. Returns the icon as written in
/// the source (including a variation selector) and the remaining text with
/// leading whitespace removed.
pub fn split_icon(line: &str) -> (Option<&str>, &str) {
    let Some(first) = line.chars().next() else {
        return (None, line);
    };
    if !ICONS.contains(&first) {
        return (None, line);
    }
    let mut end = first.len_utf8();
    if line[end..].starts_with(VARIATION_SELECTOR) {
        end += VARIATION_SELECTOR.len_utf8();
    }
    (Some(&line[..end]), line[end..].trim_start())
}

fn spans_to_markup(spans: &[InlineSpan]) -> String {
    spans.iter().map(InlineSpan::to_markup).collect()
}

fn parse_flat(text: &str) -> Vec<RenderFragment> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| RenderFragment::Paragraph {
            icon: None,
            spans: parse_inline(line),
        })
        .collect()
}

fn parse_sectioned(text: &str) -> Vec<RenderFragment> {
    let tokens = lex(text);
    let mut fragments = Vec::new();
    let mut body_start = 0;
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i].kind != TokenKind::HeaderMarker {
            i += 1;
            continue;
        }
        // Find the closing marker on the same line.
        let close = tokens[i + 1..]
            .iter()
            .position(|t| t.kind != TokenKind::Text)
            .map(|offset| i + 1 + offset)
            .filter(|&j| tokens[j].kind == TokenKind::HeaderMarker);
        let Some(close) = close else {
            i += 1;
            continue;
        };

        push_body(&text[body_start..tokens[i].start], &mut fragments);
        let title = text[tokens[i].end..tokens[close].start].trim();
        fragments.push(RenderFragment::Heading {
            text: title.to_string(),
            spans: parse_inline(title),
        });
        body_start = tokens[close].end;
        i = close + 1;
    }
    push_body(&text[body_start..], &mut fragments);
    fragments
}

fn push_body(body: &str, fragments: &mut Vec<RenderFragment>) {
    let body = body.replace("\\n", "\n");
    for line in body.trim().split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (icon, rest) = split_icon(line);
        fragments.push(RenderFragment::Paragraph {
            icon: icon.map(str::to_string),
            spans: parse_inline(rest),
        });
    }
}

// ── Section lexer ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    HeaderMarker,
    Newline,
    Text,
}

#[derive(Clone, Copy, Debug)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn lex(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let (kind, len) = if rest.starts_with(HEADER_MARKER) {
            (TokenKind::HeaderMarker, HEADER_MARKER.len())
        } else if rest.starts_with('\n') {
            (TokenKind::Newline, 1)
        } else {
            let len = rest
                .char_indices()
                .skip(1)
                .find(|(i, c)| *c == '\n' || rest[*i..].starts_with(HEADER_MARKER))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            (TokenKind::Text, len)
        };
        tokens.push(Token {
            kind,
            start: pos,
            end: pos + len,
        });
        pos += len;
    }
    tokens
}

// ── Inline lexer ────────────────────────────────────────────────────

/// Iterator over the inline spans of one line. Plain runs are yielded one
/// stretch at a time and may be adjacent; [`parse_inline`] merges them.
pub struct InlineLexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> InlineLexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Is the byte at `idx` a `$` that is not escaped by a backslash?
    fn is_dollar(&self, idx: usize) -> bool {
        self.src.as_bytes().get(idx) == Some(&b'$')
            && (idx == 0 || self.src.as_bytes()[idx - 1] != b'\\')
    }

    /// First occurrence of `delim` at or after `from`, honouring escapes.
    fn find_close(&self, from: usize, delim: &str) -> Option<usize> {
        let mut at = from;
        while let Some(offset) = self.src[at..].find(delim) {
            let idx = at + offset;
            if !delim.starts_with('$') || self.is_dollar(idx) {
                return Some(idx);
            }
            at = idx + 1;
        }
        None
    }

    /// Try to read `open content close` at the current position.
    fn delimited(&self, delim: &str) -> Option<(usize, &'a str)> {
        let inner = self.pos + delim.len();
        let close = self.find_close(inner, delim)?;
        if close == inner {
            return None;
        }
        Some((close + delim.len(), &self.src[inner..close]))
    }

    fn next_special(&self, from: usize) -> usize {
        self.src[from..]
            .char_indices()
            .find(|(i, c)| *c == '*' || (*c == '$' && self.is_dollar(from + i)))
            .map(|(i, _)| from + i)
            .unwrap_or(self.src.len())
    }
}

impl Iterator for InlineLexer<'_> {
    type Item = InlineSpan;

    fn next(&mut self) -> Option<InlineSpan> {
        if self.pos >= self.src.len() {
            return None;
        }
        let rest = &self.src[self.pos..];

        if rest.starts_with("**")
            && let Some((end, content)) = self.delimited("**")
        {
            self.pos = end;
            return Some(InlineSpan::Bold(content.to_string()));
        }
        if self.is_dollar(self.pos) {
            if rest.starts_with("$$")
                && let Some((end, content)) = self.delimited("$$")
            {
                self.pos = end;
                return Some(InlineSpan::BlockMath(content.to_string()));
            }
            if let Some((end, content)) = self.delimited("$") {
                self.pos = end;
                return Some(InlineSpan::InlineMath(content.to_string()));
            }
        }

        // Not a span opener: emit plain text up to the next candidate.
        let first_len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        let end = self.next_special(self.pos + first_len);
        let text = &self.src[self.pos..end];
        self.pos = end;
        Some(InlineSpan::PlainText(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> InlineSpan {
        InlineSpan::PlainText(s.into())
    }

    fn math(s: &str) -> InlineSpan {
        InlineSpan::InlineMath(s.into())
    }

    fn headings(fragments: &[RenderFragment]) -> Vec<&str> {
        fragments
            .iter()
            .filter_map(|f| match f {
                RenderFragment::Heading { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    // ── sectioned mode ──

    #[test]
    fn parses_heading_and_icon_paragraphs() {
        let fragments = parse("### Durum 1 ### 🎯 Önce $x+1=2$ yaz\n✅ Sonra $x=1$ bul");
        assert_eq!(
            fragments,
            vec![
                RenderFragment::Heading {
                    text: "Durum 1".into(),
                    spans: vec![plain("Durum 1")],
                },
                RenderFragment::Paragraph {
                    icon: Some("🎯".into()),
                    spans: vec![plain("Önce "), math("x+1=2"), plain(" yaz")],
                },
                RenderFragment::Paragraph {
                    icon: Some("✅".into()),
                    spans: vec![plain("Sonra "), math("x=1"), plain(" bul")],
                },
            ]
        );
    }

    #[test]
    fn headings_keep_source_order() {
        let text = "giriş\n### A ###\n➡️ bir\n### B ###\niki\n### C ### üç";
        let fragments = parse(text);
        assert_eq!(headings(&fragments), vec!["A", "B", "C"]);
        assert!(!fragments[0].is_heading());
    }

    #[test]
    fn heading_text_is_inline_parsed() {
        let fragments = parse("### **Durum** $n=2$ ###");
        assert_eq!(
            fragments[0],
            RenderFragment::Heading {
                text: "**Durum** $n=2$".into(),
                spans: vec![
                    InlineSpan::Bold("Durum".into()),
                    plain(" "),
                    math("n=2"),
                ],
            }
        );
    }

    #[test]
    fn unmatched_marker_stays_plain_text() {
        let fragments = parse("### yarım başlık\n🎯 adım");
        assert_eq!(headings(&fragments), Vec::<&str>::new());
        assert_eq!(fragments[0].spans(), &[plain("### yarım başlık")]);
        assert!(matches!(
            &fragments[1],
            RenderFragment::Paragraph { icon: Some(i), .. } if i == "🎯"
        ));
    }

    #[test]
    fn header_marker_does_not_span_newlines() {
        let fragments = parse("### a\nb ###");
        assert_eq!(headings(&fragments), Vec::<&str>::new());
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn literal_backslash_n_splits_body_lines() {
        let fragments = parse("### Adımlar ###🔢 bir\\n📝 iki");
        assert_eq!(fragments.len(), 3);
        assert!(matches!(
            &fragments[2],
            RenderFragment::Paragraph { icon: Some(i), spans } if i == "📝" && spans == &[plain("iki")]
        ));
    }

    #[test]
    fn blank_lines_are_dropped() {
        let fragments = parse("### T ###\n\n   \n✅ tamam\n\n");
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn icon_with_and_without_variation_selector() {
        assert_eq!(split_icon("➡️ devam"), (Some("➡️"), "devam"));
        assert_eq!(split_icon("➡devam"), (Some("➡"), "devam"));
        assert_eq!(split_icon("✖️  çarp"), (Some("✖️"), "çarp"));
        assert_eq!(split_icon("🙂 gülümse"), (None, "🙂 gülümse"));
        assert_eq!(split_icon(""), (None, ""));
    }

    #[test]
    fn extracted_icon_does_not_leak_into_spans() {
        for icon in ["🎯", "🔢", "➡️", "✅", "💡", "🔍", "📝", "📌", "✔️", "➕", "➖", "➗", "✖️", "🟰"] {
            let text = format!("### T ###\n{icon} adım $a$");
            let fragments = parse(&text);
            let RenderFragment::Paragraph { icon: got, spans } = &fragments[1] else {
                panic!("expected paragraph");
            };
            assert_eq!(got.as_deref(), Some(icon));
            assert!(spans.iter().all(|s| !s.content().contains(icon)));
        }
    }

    #[test]
    fn empty_heading_is_kept() {
        let fragments = parse("######\n🎯 a");
        assert_eq!(headings(&fragments), vec![""]);
        assert_eq!(parse(&to_markup(&fragments)), fragments);
    }

    // ── flat mode ──

    #[test]
    fn flat_mode_has_no_icons_or_headings() {
        let fragments = parse("🎯 Merhaba $x$\n\n**dikkat** et");
        assert_eq!(
            fragments,
            vec![
                RenderFragment::Paragraph {
                    icon: None,
                    spans: vec![plain("🎯 Merhaba "), math("x")],
                },
                RenderFragment::Paragraph {
                    icon: None,
                    spans: vec![InlineSpan::Bold("dikkat".into()), plain(" et")],
                },
            ]
        );
    }

    #[test]
    fn flat_mode_keeps_literal_backslash_n() {
        let fragments = parse("a\\nb");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].spans(), &[plain("a\\nb")]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("  \n ").is_empty());
    }

    #[test]
    fn flat_parse_is_idempotent() {
        let inputs = [
            "Rica ederim! $a^2+b^2=c^2$ unutma.\n**Not:** $$\\frac{1}{2}$$",
            "tek $ dolar ve ** yıldız",
            "$$a$ b\n\n$x$$y$",
        ];
        for input in inputs {
            let first = parse(input);
            assert_eq!(parse(input), first);
            assert_eq!(parse(&to_markup(&first)), first, "input: {input:?}");
        }
    }

    #[test]
    fn sectioned_parse_is_idempotent() {
        let input = "Giriş metni\n### Durum 1: $x>0$ ###🎯 Önce **dikkat**\\n✅ Sonuç $$x=2$$\n### Durum 2 ###\n📌 Son";
        let first = parse(input);
        assert_eq!(parse(&to_markup(&first)), first);
    }

    // ── inline spans ──

    #[test]
    fn inline_priority_and_order() {
        assert_eq!(
            parse_inline("**a** $$b$$ $c$"),
            vec![
                InlineSpan::Bold("a".into()),
                plain(" "),
                InlineSpan::BlockMath("b".into()),
                plain(" "),
                math("c"),
            ]
        );
    }

    #[test]
    fn adjacent_inline_math() {
        assert_eq!(parse_inline("$a$$b$"), vec![math("a"), math("b")]);
    }

    #[test]
    fn unmatched_delimiters_degrade_to_plain() {
        assert_eq!(parse_inline("fiyat $5"), vec![plain("fiyat $5")]);
        assert_eq!(parse_inline("a ** b"), vec![plain("a ** b")]);
        assert_eq!(parse_inline("$$x"), vec![plain("$$x")]);
        assert_eq!(parse_inline("****"), vec![plain("****")]);
    }

    #[test]
    fn empty_block_falls_back_to_inline() {
        assert_eq!(parse_inline("$$a$ b"), vec![plain("$"), math("a"), plain(" b")]);
    }

    #[test]
    fn escaped_dollar_is_not_a_delimiter() {
        assert_eq!(parse_inline("\\$5 ve \\$6"), vec![plain("\\$5 ve \\$6")]);
        assert_eq!(parse_inline("$\\$5$"), vec![math("\\$5")]);
    }

    #[test]
    fn bold_does_not_nest_math() {
        assert_eq!(
            parse_inline("**kök $x$**"),
            vec![InlineSpan::Bold("kök $x$".into())]
        );
    }

    #[test]
    fn well_formed_spans_round_trip() {
        let cases = [
            "$x+1=2$",
            "$$\\frac{a}{b}$$",
            "**kalın**",
            "önce $a$, sonra **b** ve $$c$$ bitti",
            "$V_{Can} \\neq 0$",
        ];
        for src in cases {
            let rebuilt: String = parse_inline(src).iter().map(InlineSpan::to_markup).collect();
            assert_eq!(rebuilt, src);
        }
    }

    #[test]
    fn multibyte_text_is_preserved() {
        assert_eq!(
            parse_inline("Çözüm: ğüşıöç $ş$"),
            vec![plain("Çözüm: ğüşıöç "), math("ş")]
        );
    }

    // ── final answer ──

    #[test]
    fn final_answer_strips_markup() {
        assert_eq!(final_answer_math("**$x = 5$**"), math("x = 5"));
        assert_eq!(final_answer_math("$$\\frac{1}{2}$$"), math("\\frac{1}{2}"));
    }
}
