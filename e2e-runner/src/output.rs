//! Report rendering for text vs JSON output.
//!
//! The final [`RunReport`] flows through [`OutputWriter`], which handles the
//! format switch. The summary line is always printed: on stdout in text mode,
//! on stderr in JSON mode so stdout stays a single JSON document.

use std::io::Write;

use serde::Serialize;

use qbridge_e2e_core::report::{RunReport, StepOutcome, Verdict};

use crate::cli::OutputFormat;

/// Writes report payloads in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render `payload` to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> std::io::Result<()> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render `payload` into `w`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => payload.render_text(w),
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)
            }
        }
    }
}

/// Human-readable text rendering.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// `E2E Test Run: PASSED` or `E2E Test Run: FAILED`.
pub fn summary_line(report: &RunReport) -> String {
    let verdict = if report.passed() {
        Verdict::Passed
    } else {
        Verdict::Failed
    };
    format!("E2E Test Run: {}", verdict.as_str())
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for result in self.results() {
            writeln!(
                w,
                "[{}] {} ({} ms): {}",
                result.verdict().as_str(),
                result.name(),
                result.elapsed().as_millis(),
                result.diagnostic()
            )?;
        }

        if let Some(failure) = self.setup_failure() {
            writeln!(w, "Setup failed after phase '{}': {}", failure.reached, failure.message)?;
        }

        if !self.teardown().is_empty() {
            writeln!(w, "Teardown:")?;
            for step in self.teardown().steps() {
                let outcome = match &step.outcome {
                    StepOutcome::Stopped => "stopped".to_owned(),
                    StepOutcome::AlreadyStopped => "already stopped".to_owned(),
                    StepOutcome::Killed => "killed after timeout".to_owned(),
                    StepOutcome::Failed(reason) => format!("FAILED: {reason}"),
                };
                match step.pid {
                    Some(pid) => writeln!(w, "  {} (pid {}): {}", step.resource, pid, outcome)?,
                    None => writeln!(w, "  {}: {}", step.resource, outcome)?,
                }
            }
        }

        for warning in self.warnings() {
            writeln!(w, "warning: {warning}")?;
        }

        writeln!(w, "{}", summary_line(self))
    }
}
