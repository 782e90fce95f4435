use owo_colors::{OwoColorize, Style};

/// A byte range in the source program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// A label pointing to a specific span in the source
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// An error report ready to be rendered against the program source.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        // Runtime errors raised outside any source construct carry no span.
        if !label.span.is_dummy() {
            self.labels.push(label);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }
}

/// Computes 1-based line and column from a byte offset
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn line_text(source: &str, line_num: usize) -> Option<&str> {
    source.split('\n').nth(line_num.saturating_sub(1))
}

/// Renders diagnostics in a rustc-like layout.
pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    file_name: &'a str,
    use_color: bool,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str, file_name: &'a str, use_color: bool) -> Self {
        Self {
            source,
            file_name,
            use_color,
        }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();

        // error[E0201]: message
        let header = self.paint("error", Style::new().red().bold());
        match &diagnostic.code {
            Some(code) => output.push_str(&format!(
                "{}[{}]: {}\n",
                header,
                code,
                self.paint(&diagnostic.message, Style::new().bold())
            )),
            None => output.push_str(&format!(
                "{}: {}\n",
                header,
                self.paint(&diagnostic.message, Style::new().bold())
            )),
        }

        let mut lines_to_show: Vec<usize> = Vec::new();
        for label in &diagnostic.labels {
            let (start_line, _) = line_col(self.source, label.span.start);
            let (end_line, _) = line_col(
                self.source,
                label.span.end.saturating_sub(1).max(label.span.start),
            );
            for line in start_line..=end_line {
                if !lines_to_show.contains(&line) {
                    lines_to_show.push(line);
                }
            }
        }
        lines_to_show.sort_unstable();

        if let Some(label) = diagnostic.labels.first() {
            let (line, col) = line_col(self.source, label.span.start);
            let gutter = self.paint("|", Style::new().blue());
            let width = lines_to_show.last().copied().unwrap_or(1).to_string().len();

            output.push_str(&format!(
                "{}{} {}:{}:{}\n",
                " ".repeat(width),
                self.paint("-->", Style::new().blue()),
                self.file_name,
                line,
                col
            ));
            output.push_str(&format!("{} {}\n", " ".repeat(width + 1), gutter));
            for &line_num in &lines_to_show {
                self.render_line(&mut output, diagnostic, line_num, width);
            }
            output.push_str(&format!("{} {}\n", " ".repeat(width + 1), gutter));
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("  {} {}\n", self.paint("=", Style::new().blue()), note));
        }

        output
    }

    fn render_line(&self, output: &mut String, diagnostic: &Diagnostic, line_num: usize, width: usize) {
        let content = match line_text(self.source, line_num) {
            Some(text) => text,
            None => return,
        };
        let gutter = self.paint("|", Style::new().blue());

        output.push_str(&format!(
            "{} {} {}\n",
            self.paint(&format!("{:>width$}", line_num, width = width + 1), Style::new().blue()),
            gutter,
            content
        ));

        let mut underlines: Vec<(usize, usize, &str)> = Vec::new();
        for label in &diagnostic.labels {
            let (first_line, start_col) = line_col(self.source, label.span.start);
            let (last_line, end_col) = line_col(
                self.source,
                label.span.end.saturating_sub(1).max(label.span.start),
            );
            if first_line <= line_num && last_line >= line_num {
                let col_start = if first_line == line_num { start_col } else { 1 };
                let col_end = if last_line == line_num {
                    end_col + 1
                } else {
                    content.chars().count() + 1
                };
                underlines.push((col_start, col_end, &label.message));
            }
        }
        if underlines.is_empty() {
            return;
        }
        underlines.sort_by_key(|(start, _, _)| *start);

        let mut marks = String::new();
        let mut pos = 1;
        for (col_start, col_end, _) in &underlines {
            while pos < *col_start {
                marks.push(' ');
                pos += 1;
            }
            while pos < *col_end {
                marks.push('^');
                pos += 1;
            }
        }
        output.push_str(&format!(
            "{} {} {}\n",
            " ".repeat(width + 1),
            gutter,
            self.paint(&marks, Style::new().red())
        ));

        for (col_start, _, message) in &underlines {
            if message.is_empty() {
                continue;
            }
            output.push_str(&format!(
                "{} {} {}{}\n",
                " ".repeat(width + 1),
                gutter,
                " ".repeat(col_start.saturating_sub(1)),
                self.paint(message, Style::new().red())
            ));
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.use_color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }
}

pub fn render_diagnostics(source: &str, file_name: &str, diagnostics: &[Diagnostic], use_color: bool) -> String {
    let renderer = DiagnosticRenderer::new(source, file_name, use_color);
    let mut output = String::new();
    for diagnostic in diagnostics {
        output.push_str(&renderer.render(diagnostic));
    }
    output
}
