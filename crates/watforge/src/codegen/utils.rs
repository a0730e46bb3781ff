//! Line buffer with indentation tracking.

/// Accumulates output lines, prefixing each with the current indentation.
#[derive(Debug, Clone)]
pub struct Emitter {
    lines: Vec<String>,
    indent: usize,
    step: usize,
}

impl Emitter {
    /// `step` spaces per level, starting at `level`.
    pub fn new(step: usize, level: usize) -> Self {
        Self {
            lines: Vec::new(),
            indent: level,
            step,
        }
    }

    pub fn push_line(&mut self, line: impl AsRef<str>) {
        let prefix = " ".repeat(self.indent * self.step);
        self.lines.push(format!("{prefix}{}", line.as_ref()));
    }

    /// Push every line of a multi-line fragment at the current level.
    pub fn push_lines(&mut self, text: &str) {
        for line in text.lines() {
            self.push_line(line);
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn finish(self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut e = Emitter::new(2, 0);
        e.push_line("(a");
        e.indent();
        e.push_lines("b\nc");
        e.dedent();
        e.dedent();
        e.push_line(")");
        assert_eq!(e.finish(), "(a\n  b\n  c\n)");
    }

    #[test]
    fn test_starting_level() {
        let mut e = Emitter::new(4, 1);
        e.push_line("x");
        assert_eq!(e.finish(), "    x");
    }
}
