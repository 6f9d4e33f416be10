//! The diagnostic log of spec §6.2: a flat list of strings (HTML fragments
//! permitted), appended to on every code path including failure ones.

#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    lines: Vec<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        DiagnosticLog::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines[..]
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
