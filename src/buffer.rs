use std::collections::BTreeSet;
use std::fmt;

/// Where an entered line is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Preprocessor and `using` directives, emitted before `main`.
    Header,
    /// Executable statements, emitted inside the value block.
    Statement,
}

impl LineKind {
    /// Classify a raw input line.
    pub fn of(text: &str) -> Self {
        if text.starts_with('#') || text.starts_with("using ") {
            Self::Header
        } else {
            Self::Statement
        }
    }
}

/// True when the last non-whitespace character of `text` is `;` or `}`.
pub fn is_terminated(text: &str) -> bool {
    matches!(text.trim_end().chars().last(), Some(';' | '}'))
}

/// One statement line as typed, plus whether a `;` is owed after it.
#[derive(Debug, Clone)]
struct Statement {
    text: String,
    closed: bool,
}

/// Header and statement text joined with newlines, ready for synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Lines emitted before `main`.
    pub headers: String,
    /// Lines emitted inside the value block.
    pub statements: String,
}

/// Accumulated program text of an interactive session.
///
/// Lines are numbered globally starting at 1: all header lines first, then
/// all statement lines. Numbers stay contiguous after every edit, so deleting
/// line 2 of 3 turns line 3 into line 2.
#[derive(Debug, Clone, Default)]
pub struct SnippetBuffer {
    headers: Vec<String>,
    statements: Vec<Statement>,
    last_touched: Option<usize>,
}

impl SnippetBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the header or statement section.
    ///
    /// Returns the global number the line received. Empty text is ignored and
    /// leaves the last-touched line untouched.
    pub fn append_line(&mut self, text: &str) -> Option<usize> {
        if text.is_empty() {
            return None;
        }
        let number = match LineKind::of(text) {
            LineKind::Header => {
                self.headers.push(text.to_string());
                self.headers.len()
            }
            LineKind::Statement => {
                self.statements.push(Statement {
                    text: text.to_string(),
                    closed: false,
                });
                self.headers.len() + self.statements.len()
            }
        };
        self.last_touched = Some(number);
        Some(number)
    }

    /// Append a header line regardless of its shape (used for configured includes).
    pub fn push_header(&mut self, text: impl Into<String>) {
        self.headers.push(text.into());
        self.last_touched = Some(self.headers.len());
    }

    /// Delete the line with global number `n`. Out-of-range numbers are ignored.
    pub fn delete_by_number(&mut self, n: usize) -> bool {
        let h = self.headers.len();
        let removed = if n == 0 {
            false
        } else if n <= h {
            self.headers.remove(n - 1);
            true
        } else if n <= h + self.statements.len() {
            self.statements.remove(n - h - 1);
            true
        } else {
            false
        };
        self.last_touched = None;
        removed
    }

    /// Delete several lines at once.
    ///
    /// Numbers are deduplicated and removed from the highest down, so every
    /// number refers to the listing as it was before the call.
    pub fn delete_many<I>(&mut self, numbers: I) -> usize
    where
        I: IntoIterator<Item = usize>,
    {
        let unique: BTreeSet<usize> = numbers.into_iter().collect();
        unique
            .into_iter()
            .rev()
            .filter(|&n| self.delete_by_number(n))
            .count()
    }

    /// Remove the most recently appended line, if it is still known.
    pub fn rollback_last(&mut self) -> bool {
        match self.last_touched {
            Some(n) => self.delete_by_number(n),
            None => false,
        }
    }

    /// Mark the last statement as a finished expression.
    ///
    /// A bare expression such as `x + 2` that ran as the block's value has
    /// no `;`. Once more lines follow it, it is no longer last in the block
    /// and needs one. The `;` goes on its own line when rendered, so a
    /// trailing `//` comment cannot swallow it. The listing keeps the text
    /// as typed. Returns whether anything changed.
    pub fn close_last_statement(&mut self) -> bool {
        match self.statements.last_mut() {
            Some(last) if !last.closed && !is_terminated(&last.text) => {
                last.closed = true;
                true
            }
            _ => false,
        }
    }

    /// Drop every line, including preloaded headers.
    pub fn clear(&mut self) {
        self.headers.clear();
        self.statements.clear();
        self.last_touched = None;
    }

    /// Join the sections for synthesis. Closed statements get their `;`.
    pub fn render(&self) -> Rendered {
        let statements = self
            .statements
            .iter()
            .map(|s| {
                if s.closed {
                    format!("{}\n;", s.text)
                } else {
                    s.text.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        Rendered {
            headers: self.headers.join("\n"),
            statements,
        }
    }

    /// Global number of the line [`rollback_last`](Self::rollback_last) would remove.
    pub fn last_touched(&self) -> Option<usize> {
        self.last_touched
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn has_statements(&self) -> bool {
        !self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.headers.len() + self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Numbered listing as printed by `.show`.
impl fmt::Display for SnippetBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut num = 1;
        if !self.headers.is_empty() {
            for line in &self.headers {
                writeln!(f, "{num:3}| {line}")?;
                num += 1;
            }
            writeln!(f, "    --------------------")?;
        }
        for statement in &self.statements {
            writeln!(f, "{num:3}| {}", statement.text)?;
            num += 1;
        }
        Ok(())
    }
}
