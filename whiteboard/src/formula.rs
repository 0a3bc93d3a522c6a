//! Math markup rendering.
//!
//! The engine consumes rendering as a pure function through
//! [`FormulaRenderer`]: markup in, rendered block out. A failed render never
//! reaches the caller as an error; the engine inserts the raw markup as plain
//! text instead (see `EngineCore::add_formula`).
//!
//! [`TexRenderer`] is the built-in renderer. It understands the TeX subset
//! the math palette produces (Greek letters, operators, relations, `\frac`,
//! `\sqrt`, sub/superscripts, `\text`, `\left`/`\right`) and lays it out as
//! Unicode text.

#[cfg(test)]
#[path = "formula_test.rs"]
mod formula_test;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula markup is empty")]
    Empty,
    #[error("unbalanced braces in formula markup")]
    UnbalancedBraces,
    #[error("unknown command: \\{0}")]
    UnknownCommand(String),
    #[error("{0} is missing an argument")]
    MissingArgument(String),
    #[error("formula nests deeper than {MAX_NESTING} levels")]
    TooDeep,
}

/// Deepest group or argument nesting the renderer descends into.
pub const MAX_NESTING: usize = 64;

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFormula {
    /// The markup that was rendered, unchanged.
    pub markup: String,
    /// Display text for the formula block.
    pub text: String,
}

/// Markup string → rendered block.
pub trait FormulaRenderer {
    /// Render `markup`.
    ///
    /// # Errors
    ///
    /// Returns a [`FormulaError`] when the markup cannot be rendered.
    fn render(&self, markup: &str) -> Result<RenderedFormula, FormulaError>;
}

/// Built-in TeX-subset renderer producing Unicode text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TexRenderer;

impl FormulaRenderer for TexRenderer {
    fn render(&self, markup: &str) -> Result<RenderedFormula, FormulaError> {
        if markup.trim().is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser { chars: markup.chars().collect(), pos: 0, depth: 0 };
        let text = parser.sequence(false)?;
        Ok(RenderedFormula { markup: markup.to_owned(), text: text.trim().to_owned() })
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
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

    /// Render until end of input, or until the closing brace when `in_group`.
    fn sequence(&mut self, in_group: bool) -> Result<String, FormulaError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            match c {
                '}' => {
                    if in_group {
                        return Ok(out);
                    }
                    return Err(FormulaError::UnbalancedBraces);
                }
                '{' => out.push_str(&self.group()?),
                '\\' => {
                    self.pos += 1;
                    out.push_str(&self.command()?);
                }
                '^' => {
                    self.pos += 1;
                    let arg = self.argument("^")?;
                    out.push_str(&superscript(&arg));
                }
                '_' => {
                    self.pos += 1;
                    let arg = self.argument("_")?;
                    out.push_str(&subscript(&arg));
                }
                _ => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
        if in_group {
            return Err(FormulaError::UnbalancedBraces);
        }
        Ok(out)
    }

    /// Run `f` one nesting level deeper.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<String, FormulaError>) -> Result<String, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::TooDeep);
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// `{ ... }` starting at the opening brace.
    fn group(&mut self) -> Result<String, FormulaError> {
        self.nested(|p| {
            p.pos += 1;
            let inner = p.sequence(true)?;
            match p.bump() {
                Some('}') => Ok(inner),
                _ => Err(FormulaError::UnbalancedBraces),
            }
        })
    }

    /// One argument: a group, a command, or a single character.
    fn argument(&mut self, owner: &str) -> Result<String, FormulaError> {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
        match self.peek() {
            Some('{') => self.group(),
            Some('\\') => {
                self.pos += 1;
                self.nested(Self::command)
            }
            Some('}') | None => Err(FormulaError::MissingArgument(owner.to_owned())),
            Some(c) => {
                self.pos += 1;
                Ok(c.to_string())
            }
        }
    }

    /// Optional `[ ... ]` argument.
    fn optional(&mut self) -> Option<String> {
        if self.peek() != Some('[') {
            return None;
        }
        let close = self.chars[self.pos..].iter().position(|&c| c == ']')?;
        let inner: String = self.chars[self.pos + 1..self.pos + close].iter().collect();
        self.pos += close + 1;
        Some(inner)
    }

    /// Command body after the backslash.
    fn command(&mut self) -> Result<String, FormulaError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        if self.pos == start {
            // Control symbol: `\,`, `\{`, `\\` and friends.
            return match self.bump() {
                Some(',' | ';' | ':' | ' ') => Ok(" ".to_owned()),
                Some('!') => Ok(String::new()),
                Some('\\') => Ok("\n".to_owned()),
                Some(c @ ('{' | '}' | '%' | '$' | '&' | '#' | '_')) => Ok(c.to_string()),
                Some(c) => Err(FormulaError::UnknownCommand(c.to_string())),
                None => Err(FormulaError::UnknownCommand(String::new())),
            };
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        match name.as_str() {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.argument("\\frac")?;
                let den = self.argument("\\frac")?;
                Ok(format!("{}/{}", wrap(&num), wrap(&den)))
            }
            "sqrt" => {
                let index = self.optional();
                let radicand = self.argument("\\sqrt")?;
                let radical = match index.as_deref().map(str::trim) {
                    None | Some("" | "2") => "√".to_owned(),
                    Some("3") => "∛".to_owned(),
                    Some("4") => "∜".to_owned(),
                    Some(n) => format!("{}√", superscript(n)),
                };
                Ok(format!("{radical}{}", wrap(&radicand)))
            }
            "text" | "mathrm" | "mathbf" | "mathit" | "operatorname" => self.argument(&format!("\\{name}")),
            "left" | "right" => {
                if self.peek() == Some('.') {
                    self.pos += 1;
                }
                Ok(String::new())
            }
            "quad" | "qquad" => Ok(" ".to_owned()),
            "sin" | "cos" | "tan" | "cot" | "sec" | "csc" | "log" | "ln" | "exp" | "lim" | "max" | "min" | "det" => {
                Ok(name.clone())
            }
            other => symbol(other)
                .map(str::to_owned)
                .ok_or_else(|| FormulaError::UnknownCommand(other.to_owned())),
        }
    }
}

/// Parenthesize anything but a single symbol or a plain number.
fn wrap(s: &str) -> String {
    let s = s.trim();
    let bare = s.chars().count() == 1 || (!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()));
    if bare {
        s.to_owned()
    } else {
        format!("({s})")
    }
}

fn superscript(s: &str) -> String {
    let mapped: Option<String> = s
        .chars()
        .map(|c| {
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
                '-' => '⁻',
                '=' => '⁼',
                '(' => '⁽',
                ')' => '⁾',
                'n' => 'ⁿ',
                'i' => 'ⁱ',
                _ => return None,
            })
        })
        .collect();
    mapped.unwrap_or_else(|| format!("^{}", wrap(s)))
}

fn subscript(s: &str) -> String {
    let mapped: Option<String> = s
        .chars()
        .map(|c| {
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
                '-' => '₋',
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
        })
        .collect();
    mapped.unwrap_or_else(|| format!("_{}", wrap(s)))
}

fn symbol(name: &str) -> Option<&'static str> {
    Some(match name {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" | "vartheta" => "θ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" | "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Xi" => "Ξ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        "times" => "×",
        "div" => "÷",
        "pm" => "±",
        "mp" => "∓",
        "cdot" => "·",
        "ast" => "∗",
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "neq" | "ne" => "≠",
        "approx" => "≈",
        "equiv" => "≡",
        "sim" => "∼",
        "propto" => "∝",
        "infty" => "∞",
        "sum" => "∑",
        "prod" => "∏",
        "int" => "∫",
        "iint" => "∬",
        "oint" => "∮",
        "partial" => "∂",
        "nabla" => "∇",
        "in" => "∈",
        "notin" => "∉",
        "subset" => "⊂",
        "subseteq" => "⊆",
        "supset" => "⊃",
        "cup" => "∪",
        "cap" => "∩",
        "emptyset" => "∅",
        "forall" => "∀",
        "exists" => "∃",
        "neg" => "¬",
        "land" | "wedge" => "∧",
        "lor" | "vee" => "∨",
        "to" | "rightarrow" => "→",
        "leftarrow" => "←",
        "Rightarrow" | "implies" => "⇒",
        "Leftarrow" => "⇐",
        "Leftrightarrow" | "iff" => "⇔",
        "angle" => "∠",
        "perp" => "⊥",
        "parallel" => "∥",
        "degree" | "circ" => "°",
        "ldots" | "dots" => "…",
        "cdots" => "⋯",
        "triangle" => "△",
        _ => return None,
    })
}
