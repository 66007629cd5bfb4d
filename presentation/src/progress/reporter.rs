//! Progress reporting for chat turns and image jobs

use colored::Colorize;
use cud_application::{GenerationProgress, TurnProgressNotifier};
use cud_domain::{DirectiveError, GenerationDirective, ResourceHandle, TurnPhase};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn generation_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn generation_bar(message: String) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(generation_style());
    bar.set_prefix("Generating");
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[derive(Default)]
struct ReporterState {
    spinner: Option<ProgressBar>,
    bar: Option<ProgressBar>,
    /// Streamed text is on the current line
    mid_line: bool,
}

impl ReporterState {
    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.end_line();
    }
}

/// Streams assistant text to stdout with a spinner while waiting and a
/// progress bar while an image is generated
#[derive(Default)]
pub struct TurnProgressReporter {
    state: Mutex<ReporterState>,
}

impl TurnProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TurnProgressNotifier for TurnProgressReporter {
    fn on_phase(&self, phase: TurnPhase) {
        let mut state = self.state();
        match phase {
            TurnPhase::Sending => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(spinner_style());
                spinner.set_message("Waiting for the model...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                state.spinner = Some(spinner);
            }
            TurnPhase::Streaming => {
                if let Some(spinner) = state.spinner.take() {
                    spinner.finish_and_clear();
                }
                print!("{} ", "assistant>".yellow().bold());
                let _ = std::io::stdout().flush();
                state.mid_line = true;
            }
            TurnPhase::Extracting => state.end_line(),
            TurnPhase::Reconciling => {
                if let Some(bar) = state.bar.take() {
                    bar.finish_and_clear();
                }
            }
            TurnPhase::Idle => state.clear(),
            TurnPhase::Generating => {}
        }
    }

    fn on_stream_chunk(&self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn on_directive(&self, directive: &GenerationDirective) {
        let mut state = self.state();
        state.end_line();
        if let Some(status) = &directive.response_during_generation {
            println!("{} {}", "assistant>".yellow().bold(), status);
        }
        state.bar = Some(generation_bar(format!("{} image", directive.resolution)));
    }

    fn on_directive_rejected(&self, error: &DirectiveError) {
        let mut state = self.state();
        state.end_line();
        println!(
            "{} {}",
            "!".yellow(),
            format!("Ignoring image request: {}", error).dimmed()
        );
    }

    fn on_generation_progress(&self, percent: u8) {
        if let Some(bar) = self.state().bar.as_ref() {
            bar.set_position(u64::from(percent));
        }
    }

    fn on_image(&self, handle: &ResourceHandle) {
        let state = self.state();
        let line = format!("{} {}", "image:".green().bold(), handle);
        match state.bar.as_ref() {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }

    fn on_error(&self, message: &str) {
        let mut state = self.state();
        state.clear();
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
}

/// Plain-text progress; the REPL prints the reply once the turn ends
pub struct SimpleProgress;

impl TurnProgressNotifier for SimpleProgress {
    fn on_directive(&self, directive: &GenerationDirective) {
        println!(
            "{} generating {} image: {}",
            "->".cyan(),
            directive.resolution,
            directive.prompt
        );
    }

    fn on_directive_rejected(&self, error: &DirectiveError) {
        println!("{} Ignoring image request: {}", "!".yellow(), error);
    }
}

/// Progress bar for a direct generation job
pub struct GenerationProgressBar {
    bar: Option<ProgressBar>,
}

impl GenerationProgressBar {
    pub fn new(label: String, visible: bool) -> Self {
        Self {
            bar: visible.then(|| generation_bar(label)),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl GenerationProgress for GenerationProgressBar {
    fn on_progress(&self, percent: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(percent));
        }
    }
}

impl Drop for GenerationProgressBar {
    fn drop(&mut self) {
        self.finish();
    }
}
