//! Structured Doxyfile emission.
//!
//! Values are written unquoted when they are a single plain token and
//! double-quoted otherwise. Inside quotes `"` becomes `\"`; line breaks are
//! folded to spaces so one value can never start a new statement.

/// Column the `=` of a `set` statement is aligned to.
const KEY_WIDTH: usize = 23;

/// Ordered Doxyfile statements.
#[derive(Debug, Default, Clone)]
pub struct DoxyfileWriter {
    lines: Vec<String>,
}

impl DoxyfileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `## text`
    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("## {}", single_line(text)));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    /// `KEY = value`, quoting `value` when needed.
    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines
            .push(format!("{key:<KEY_WIDTH$}= {}", quote_if_needed(value)));
        self
    }

    /// `KEY = "value"`
    pub fn set_quoted(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(format!("{key:<KEY_WIDTH$}= {}", quote(value)));
        self
    }

    /// `KEY += "value"`
    pub fn append(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(format!("{key} += {}", quote(value)));
        self
    }

    /// `@INCLUDE = path`
    pub fn include(&mut self, path: &str) -> &mut Self {
        self.lines.push(format!("@INCLUDE = {}", quote_if_needed(path)));
        self
    }

    /// A statement supplied verbatim by the user, folded onto one line.
    pub fn statement(&mut self, raw: &str) -> &mut Self {
        self.lines.push(single_line(raw));
        self
    }

    pub fn finish(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Double-quote `value`, escaping backslashes and embedded quotes.
pub fn quote(value: &str) -> String {
    let escaped = single_line(value)
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn quote_if_needed(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '#' | '\\' | '='));
    if plain {
        value.to_string()
    } else {
        quote(value)
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
