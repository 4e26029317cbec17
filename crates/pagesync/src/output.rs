//! Colored terminal output on stderr.

use console::{Style, Term};

/// How a report line is colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tone {
    /// Something changed remotely.
    Changed,
    /// Nothing to do.
    Quiet,
    /// Not attempted.
    Attention,
    Failure,
}

pub(crate) struct Output {
    term: Term,
    heading: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            heading: Style::new().cyan().bold(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(Tone::Failure, msg);
    }

    pub(crate) fn highlight(&self, msg: &str) {
        let _ = self.term.write_line(&self.heading.apply_to(msg).to_string());
    }

    /// Write `msg` in the color of `tone`.
    pub(crate) fn line(&self, tone: Tone, msg: &str) {
        let style = match tone {
            Tone::Changed => Style::new().green(),
            Tone::Quiet => Style::new().dim(),
            Tone::Attention => Style::new().yellow(),
            Tone::Failure => Style::new().red(),
        };
        let _ = self.term.write_line(&style.apply_to(msg).to_string());
    }
}
