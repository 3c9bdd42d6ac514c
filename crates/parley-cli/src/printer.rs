//! Incremental line output.
//!
//! A terminal cannot redraw like a widget, so [`Printer`] diffs successive
//! [`ChatView`]s and emits only what changed: new messages are appended,
//! anything else (a switch, a history reload, a receipt flipping an older
//! message) redraws the conversation under a header.

use parley_app::ChatView;

/// Remembers what is already on screen.
#[derive(Debug, Default)]
pub struct Printer {
    title: Option<String>,
    lines: Vec<String>,
    status: Option<String>,
    notice: Option<String>,
    hidden: bool,
}

impl Printer {
    /// Empty screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print so the screen reflects `view`.
    pub fn update(&mut self, view: &ChatView) -> Vec<String> {
        let mut out = Vec::new();

        let status = view.status_line();
        if self.status.as_deref() != Some(status.as_str()) {
            out.push(format!("-- {status} --"));
            self.status = Some(status);
        }

        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                out.push(format!("> {notice}"));
            }
            self.notice.clone_from(&view.notice);
        }

        if !view.widget_open {
            if !self.hidden {
                out.push("(chat hidden, /show to reopen)".to_string());
                self.hidden = true;
            }
            return out;
        }

        let lines = view.lines();
        let same_screen = !self.hidden && self.title.as_deref() == Some(view.title.as_str());
        if same_screen && lines.starts_with(&self.lines) {
            out.extend(lines[self.lines.len()..].iter().cloned());
        } else {
            out.push(format!("== {} ==", view.title));
            out.extend(lines.iter().cloned());
        }

        self.hidden = false;
        self.title = Some(view.title.clone());
        self.lines = lines;
        out
    }
}
