//! Stage progress for the CLI tools.
//!
//! Pretty mode renders an indicatif spinner per stage on stderr; plain
//! mode prints `==> stage` lines instead, which keeps piped output clean.
//! Auto picks pretty only when stderr is a terminal.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Progress {
    mode: Mode,
}

impl Progress {
    /// Resolve the mode from a `--ui auto|plain|pretty` flag value.
    pub fn from_flag(flag: &str) -> Self {
        let mode = match flag {
            "pretty" => Mode::Pretty,
            "plain" => Mode::Plain,
            _ => {
                if std::io::stderr().is_terminal() {
                    Mode::Pretty
                } else {
                    Mode::Plain
                }
            }
        };
        Self { mode }
    }

    /// Start a stage; it reports completion (with elapsed time) on drop.
    pub fn stage(&self, name: &str) -> Stage {
        match self.mode {
            Mode::Pretty => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_draw_target(ProgressDrawTarget::stderr());
                spinner.enable_steady_tick(Duration::from_millis(120));
                let style = ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner());
                spinner.set_style(style);
                spinner.set_message(name.to_string());
                Stage {
                    name: name.to_string(),
                    started: Instant::now(),
                    spinner: Some(spinner),
                }
            }
            Mode::Plain => {
                eprintln!("==> {}", name);
                Stage {
                    name: name.to_string(),
                    started: Instant::now(),
                    spinner: None,
                }
            }
        }
    }
}

pub struct Stage {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for Stage {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_elapsed(self.started.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}
