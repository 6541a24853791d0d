//! LaTeX → Unicode for terminal display.
//!
//! Covers what the solver prompts ask for: fractions, roots, scripts, Greek
//! letters, relations and `\text{…}`. Anything the parser cannot balance is
//! returned unchanged as a [`Typeset::Fallback`] so the student still sees
//! the source.

const MAX_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Typeset {
    Rendered(String),
    /// Source as written, shown when typesetting failed.
    Fallback(String),
}

impl Typeset {
    pub fn text(&self) -> &str {
        match self {
            Typeset::Rendered(s) | Typeset::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Typeset::Fallback(_))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MathTypesetter;

impl MathTypesetter {
    /// `block` only changes how `\\` line breaks come out.
    pub fn typeset(&self, source: &str, block: bool) -> Typeset {
        let mut parser = Parser {
            chars: source.chars().collect(),
            pos: 0,
            depth: 0,
            block,
        };
        match parser.sequence(false) {
            Ok(out) => Typeset::Rendered(out.trim().to_string()),
            Err(Unbalanced) => {
                tracing::debug!(source, "math fallback");
                Typeset::Fallback(source.to_string())
            }
        }
    }
}

struct Unbalanced;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    block: bool,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn sequence(&mut self, in_group: bool) -> Result<String, Unbalanced> {
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return if in_group { Err(Unbalanced) } else { Ok(out) };
            };
            match c {
                '}' if in_group => return Ok(out),
                '}' => return Err(Unbalanced),
                '{' => out.push_str(&self.group()?),
                '\\' => out.push_str(&self.command()?),
                '^' => {
                    let arg = self.argument()?;
                    out.push_str(&superscript(&arg));
                }
                '_' => {
                    let arg = self.argument()?;
                    out.push_str(&subscript(&arg));
                }
                '~' => out.push(' '),
                c => out.push(c),
            }
        }
    }

    /// Body of a `{…}` group; the opening brace is already consumed.
    fn group(&mut self) -> Result<String, Unbalanced> {
        self.nested(|p| p.sequence(true))
    }

    /// Every recursive descent goes through here so deep input falls back
    /// instead of exhausting the stack.
    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<String, Unbalanced>,
    ) -> Result<String, Unbalanced> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Unbalanced);
        }
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// Argument of a command or script: a group, a command, or one char.
    fn argument(&mut self) -> Result<String, Unbalanced> {
        self.skip_spaces();
        match self.bump() {
            Some('{') => self.group(),
            Some('\\') => self.command(),
            Some('}') | None => Err(Unbalanced),
            Some(c) => Ok(c.to_string()),
        }
    }

    /// `[…]` after `\sqrt`.
    fn optional(&mut self) -> Result<Option<String>, Unbalanced> {
        if self.peek() != Some('[') {
            return Ok(None);
        }
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(']') => return Ok(Some(out.trim().to_string())),
                Some(c) => out.push(c),
                None => return Err(Unbalanced),
            }
        }
    }

    /// Delimiter after `\left` / `\right`.
    fn delimiter(&mut self) -> Result<String, Unbalanced> {
        self.skip_spaces();
        match self.bump() {
            Some('.') => Ok(String::new()),
            Some('\\') => self.command(),
            Some(c) => Ok(c.to_string()),
            None => Err(Unbalanced),
        }
    }

    fn command_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            name.push(c);
            self.pos += 1;
        }
        if name.is_empty()
            && let Some(c) = self.bump()
        {
            name.push(c);
        }
        name
    }

    /// Everything after a backslash.
    fn command(&mut self) -> Result<String, Unbalanced> {
        self.nested(Self::command_body)
    }

    fn command_body(&mut self) -> Result<String, Unbalanced> {
        let name = self.command_name();
        match name.as_str() {
            "" => Err(Unbalanced),
            "frac" | "dfrac" | "tfrac" => {
                let num = self.argument()?;
                let den = self.argument()?;
                Ok(format!("{}/{}", operand(&num), operand(&den)))
            }
            "sqrt" => {
                let index = self.optional()?;
                let radicand = self.argument()?;
                let root = match index.as_deref() {
                    None | Some("2") => "√".to_string(),
                    Some("3") => "∛".to_string(),
                    Some("4") => "∜".to_string(),
                    Some(n) => format!("{}√", superscript(n)),
                };
                Ok(format!("{root}{}", operand(&radicand)))
            }
            "text" | "textrm" | "textbf" | "textit" | "mathrm" | "mathbf" | "mathit"
            | "operatorname" | "mbox" => self.argument(),
            "left" | "right" | "big" | "Big" | "bigl" | "bigr" | "Bigl" | "Bigr" => {
                self.delimiter()
            }
            "overline" | "bar" => Ok(combine(&self.argument()?, '\u{0305}')),
            "vec" => Ok(combine(&self.argument()?, '\u{20D7}')),
            "hat" => Ok(combine(&self.argument()?, '\u{0302}')),
            "dot" => Ok(combine(&self.argument()?, '\u{0307}')),
            "displaystyle" | "limits" | "nolimits" | "!" => Ok(String::new()),
            "," | ";" | ":" | ">" | " " | "quad" => Ok(" ".to_string()),
            "qquad" => Ok("  ".to_string()),
            "\\" => Ok(if self.block { "\n" } else { " " }.to_string()),
            other => Ok(match symbol(other) {
                Some(glyph) => glyph.to_string(),
                // \{ \} \% \$ \& \# \_
                None if !other.starts_with(|c: char| c.is_ascii_alphabetic()) => {
                    other.to_string()
                }
                None => format!("\\{other}"),
            }),
        }
    }
}

/// Parenthesize compound fraction and root operands.
fn operand(s: &str) -> String {
    let s = s.trim();
    let simple = s.chars().count() <= 1
        || s.chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == ',');
    if simple {
        s.to_string()
    } else {
        format!("({s})")
    }
}

fn combine(s: &str, mark: char) -> String {
    s.chars().flat_map(|c| [c, mark]).collect()
}

fn superscript(s: &str) -> String {
    if s == "∘" {
        return "°".to_string();
    }
    if let Some(mapped) = s.chars().map(superscript_char).collect::<Option<String>>() {
        return mapped;
    }
    if s.chars().count() == 1 {
        format!("^{s}")
    } else {
        format!("^({s})")
    }
}

fn subscript(s: &str) -> String {
    if let Some(mapped) = s.chars().map(subscript_char).collect::<Option<String>>() {
        return mapped;
    }
    if s.chars().all(char::is_alphanumeric) {
        format!("_{s}")
    } else {
        format!("_({s})")
    }
}

fn superscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' | '−' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'a' => 'ᵃ',
        'b' => 'ᵇ',
        'c' => 'ᶜ',
        'd' => 'ᵈ',
        'e' => 'ᵉ',
        'i' => 'ⁱ',
        'k' => 'ᵏ',
        'm' => 'ᵐ',
        'n' => 'ⁿ',
        'o' => 'ᵒ',
        'p' => 'ᵖ',
        't' => 'ᵗ',
        'x' => 'ˣ',
        'y' => 'ʸ',
        _ => return None,
    })
}

fn subscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' | '−' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'h' => 'ₕ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'l' => 'ₗ',
        'm' => 'ₘ',
        'n' => 'ₙ',
        'o' => 'ₒ',
        'p' => 'ₚ',
        'r' => 'ᵣ',
        's' => 'ₛ',
        't' => 'ₜ',
        'u' => 'ᵤ',
        'v' => 'ᵥ',
        'x' => 'ₓ',
        _ => return None,
    })
}

const SYMBOLS: &[(&str, &str)] = &[
    // operators
    ("cdot", "·"),
    ("times", "×"),
    ("div", "÷"),
    ("pm", "±"),
    ("mp", "∓"),
    ("ast", "∗"),
    ("circ", "∘"),
    ("degree", "°"),
    // relations
    ("neq", "≠"),
    ("ne", "≠"),
    ("leq", "≤"),
    ("le", "≤"),
    ("geq", "≥"),
    ("ge", "≥"),
    ("ll", "≪"),
    ("gg", "≫"),
    ("approx", "≈"),
    ("equiv", "≡"),
    ("cong", "≅"),
    ("sim", "∼"),
    ("propto", "∝"),
    ("perp", "⊥"),
    ("parallel", "∥"),
    ("|", "‖"),
    ("mid", "∣"),
    // arrows
    ("to", "→"),
    ("rightarrow", "→"),
    ("leftarrow", "←"),
    ("gets", "←"),
    ("leftrightarrow", "↔"),
    ("Rightarrow", "⇒"),
    ("implies", "⇒"),
    ("Leftarrow", "⇐"),
    ("Leftrightarrow", "⇔"),
    ("iff", "⇔"),
    // sets and logic
    ("in", "∈"),
    ("notin", "∉"),
    ("subset", "⊂"),
    ("subseteq", "⊆"),
    ("supset", "⊃"),
    ("cup", "∪"),
    ("cap", "∩"),
    ("emptyset", "∅"),
    ("varnothing", "∅"),
    ("forall", "∀"),
    ("exists", "∃"),
    ("neg", "¬"),
    ("land", "∧"),
    ("lor", "∨"),
    ("therefore", "∴"),
    ("because", "∵"),
    // big operators and calculus
    ("sum", "∑"),
    ("prod", "∏"),
    ("int", "∫"),
    ("oint", "∮"),
    ("partial", "∂"),
    ("nabla", "∇"),
    ("infty", "∞"),
    ("prime", "′"),
    // geometry
    ("angle", "∠"),
    ("triangle", "△"),
    ("square", "□"),
    // dots
    ("cdots", "⋯"),
    ("ldots", "…"),
    ("dots", "…"),
    // greek
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ϵ"),
    ("varepsilon", "ε"),
    ("zeta", "ζ"),
    ("eta", "η"),
    ("theta", "θ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("pi", "π"),
    ("rho", "ρ"),
    ("sigma", "σ"),
    ("tau", "τ"),
    ("phi", "ϕ"),
    ("varphi", "φ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("omega", "ω"),
    ("Gamma", "Γ"),
    ("Delta", "Δ"),
    ("Theta", "Θ"),
    ("Lambda", "Λ"),
    ("Pi", "Π"),
    ("Sigma", "Σ"),
    ("Phi", "Φ"),
    ("Omega", "Ω"),
    // named functions print as themselves
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("cot", "cot"),
    ("sec", "sec"),
    ("csc", "csc"),
    ("log", "log"),
    ("ln", "ln"),
    ("exp", "exp"),
    ("lim", "lim"),
    ("max", "max"),
    ("min", "min"),
];

fn symbol(name: &str) -> Option<&'static str> {
    SYMBOLS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, glyph)| *glyph)
}
