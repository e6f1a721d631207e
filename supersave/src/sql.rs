use std::fmt::{self, Write};

use crate::conn::EngineKind;

/// Helper for building SQL statement text, tracking which backend's
/// identifier-quoting and parameter-placeholder rules apply. Both supported
/// backends use positional `?` placeholders, so the only dialect
/// difference this writer tracks is identifier quoting.
#[derive(Debug)]
pub struct SqlWriter {
    engine: EngineKind,
    text: String,
    param_count: usize,
}

impl SqlWriter {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            text: String::new(),
            param_count: 0,
        }
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn write_str(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Appends a quoted identifier: `"name"` on SQLite, `` `name` `` on
    /// MySQL, doubling any embedded quote character.
    pub fn write_ident(&mut self, name: &str) -> &mut Self {
        let quote = match self.engine {
            EngineKind::Sqlite => '"',
            EngineKind::MySql => '`',
        };
        self.text.push(quote);
        for c in name.chars() {
            if c == quote {
                self.text.push(quote);
            }
            self.text.push(c);
        }
        self.text.push(quote);
        self
    }

    /// Appends one `?` placeholder and bumps the tracked parameter count
    /// (used only for bookkeeping/tests; both backends bind positionally
    /// in declaration order regardless of the count).
    pub fn write_param(&mut self) -> &mut Self {
        self.text.push('?');
        self.param_count += 1;
        self
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn write_fmt_args(&mut self, args: fmt::Arguments<'_>) {
        self.text.write_fmt(args).expect("formatting into a String cannot fail");
    }

    pub fn build(self) -> String {
        self.text
    }
}

/// Field-name validation for generated-column identifiers (§4.4.2): must
/// match `^[A-Za-z_][A-Za-z0-9_]*$` so it is safe to interpolate directly
/// into JSON-path expressions and column DDL.
pub fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
