use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Role of a piece of output; the theme maps each role to a style.
#[derive(Clone, Copy, Debug)]
enum Tone {
    Heading,
    Key,
    Marker,
    Info,
    Success,
    Warning,
    Failure,
}

impl Tone {
    fn icon(self) -> &'static str {
        match self {
            Tone::Heading => "▸",
            Tone::Key | Tone::Marker => "•",
            Tone::Info => "ℹ",
            Tone::Success => "✔",
            Tone::Warning => "⚠",
            Tone::Failure => "✘",
        }
    }

    fn style(self, theme: Theme) -> Style {
        let light = theme == Theme::Light;
        let color = match (self, light) {
            (Tone::Heading, false) => Color::Purple,
            (Tone::Heading, true) => Color::Blue,
            (Tone::Key, false) | (Tone::Marker, false) => Color::LightBlue,
            (Tone::Key, true) => Color::Black,
            (Tone::Marker, true) => Color::Blue,
            (Tone::Info, false) => Color::LightCyan,
            (Tone::Info, true) => Color::Purple,
            (Tone::Success, false) => Color::LightGreen,
            (Tone::Success, true) => Color::Green,
            (Tone::Warning, _) => Color::Yellow,
            (Tone::Failure, false) => Color::LightRed,
            (Tone::Failure, true) => Color::Red,
        };
        let style = Style::new().fg(color);
        match self {
            Tone::Marker | Tone::Info => style,
            _ => style.bold(),
        }
    }
}

/// Terminal output of the CLI. Decorations are dropped when quiet, when
/// the plain theme is selected, or when stdout is not a terminal.
pub struct Ui {
    theme: Theme,
    paint: bool,
    quiet: bool,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let paint = !quiet && theme != Theme::Plain && std::io::stdout().is_terminal();
        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }
        Self {
            theme,
            paint,
            quiet,
        }
    }

    fn paint(&self, tone: Tone, text: impl Display) -> String {
        if self.paint {
            tone.style(self.theme).paint(text.to_string()).to_string()
        } else {
            text.to_string()
        }
    }

    /// Titled block of aligned `key: value` rows; nothing is printed for no rows.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let Some(width) = rows.iter().map(|(key, _)| key.chars().count()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            let pad = width - key.chars().count();
            println!("  {:pad$}{} {value}", "", self.paint(Tone::Key, format!("{key}:")));
        }
    }

    /// Titled bullet list; nothing is printed for no entries.
    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.heading(title);
        let marker = if self.paint {
            self.paint(Tone::Marker, Tone::Marker.icon())
        } else {
            "-".to_string()
        };
        for entry in entries {
            println!("  {marker} {entry}");
        }
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.status(Tone::Success, message));
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.status(Tone::Info, message));
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{}", self.status(Tone::Warning, message));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.status(Tone::Failure, message));
    }

    fn status(&self, tone: Tone, message: &str) -> String {
        if self.quiet {
            message.to_string()
        } else {
            format!("{} {message}", self.paint(tone, tone.icon()))
        }
    }

    fn heading(&self, title: &str) {
        if self.quiet {
            println!("{title}");
        } else {
            let text = format!("{} {title}", Tone::Heading.icon());
            println!("{}", self.paint(Tone::Heading, text));
        }
    }

    fn live_bars(&self) -> bool {
        !self.quiet && std::io::stderr().is_terminal()
    }

    /// Progress bar over `len` units, hidden when output is not interactive.
    pub fn progress(&self, label: &str, len: u64) -> ProgressBar {
        if !self.live_bars() {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} ({elapsed})")
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(len).with_style(style);
        bar.set_message(label.to_string());
        bar
    }

    /// Spinner for a step of unknown length; see [`Task::finish`].
    pub fn task(&self, label: impl Into<String>) -> Task<'_> {
        let label = label.into();
        let spinner = self.live_bars().then(|| {
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let spinner = ProgressBar::new_spinner().with_style(style);
            spinner.set_message(label.clone());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        });
        Task {
            ui: self,
            label,
            started: Instant::now(),
            spinner,
            done: false,
        }
    }
}

/// Running step started by [`Ui::task`]. Dropping it unfinished reports the
/// step as failed.
pub struct Task<'a> {
    ui: &'a Ui,
    label: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    done: bool,
}

impl Task<'_> {
    /// Clears the spinner and returns how long the step took.
    pub fn finish(mut self) -> Duration {
        self.done = true;
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.started.elapsed()
    }
}

impl Drop for Task<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let message = format!(
            "{} failed after {}",
            self.label,
            format_duration(self.started.elapsed())
        );
        match self.spinner.take() {
            Some(spinner) => spinner.abandon_with_message(message),
            None => self.ui.warn(&message),
        }
    }
}

/// Milliseconds below one second, seconds with two decimals above.
pub fn format_duration(duration: Duration) -> String {
    match duration.as_millis() {
        ms @ 0..=999 => format!("{ms}ms"),
        _ => format!("{:.2}s", duration.as_secs_f64()),
    }
}
