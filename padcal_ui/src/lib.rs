#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Console implementations of the host collaborator traits.
//!
//! The controller talks to the host UI only through the capabilities in
//! `padcal_traits`; these types render them on any `io::Write`, which is
//! stdout in the CLI and a byte buffer in tests.

use std::io::{BufRead, Write};

use padcal_traits::{
    Affordance, AffordancePanel, CloseResponse, GuideCue, GuideDisplay, StopConfirm,
};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Text guide: one cue line per refresh, blink rendered as a marker swap.
pub struct ConsoleGuide<W: Write> {
    out: W,
    open: bool,
}

impl<W: Write> ConsoleGuide<W> {
    pub fn new(out: W) -> Self {
        Self { out, open: false }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl<W: Write> GuideDisplay for ConsoleGuide<W> {
    fn open(&mut self) -> Result<(), BoxedError> {
        writeln!(self.out, "--- guide: press the weight where indicated ---")?;
        self.open = true;
        Ok(())
    }

    fn refresh(&mut self, cue: &GuideCue) -> Result<(), BoxedError> {
        if !self.open {
            return Ok(());
        }
        let marker = if cue.blink_on { "(*)" } else { "( )" };
        writeln!(
            self.out,
            "{} position {}/{} at ({}, {}) offset ({:+}, {:+})",
            marker,
            cue.index + 1,
            cue.total,
            cue.x,
            cue.y,
            cue.dx,
            cue.dy,
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxedError> {
        if self.open {
            writeln!(self.out, "--- guide closed ---")?;
            self.open = false;
        }
        Ok(())
    }
}

/// Affordance legend: re-rendered whole on every transition, mirroring the
/// atomic table the controller applies.
pub struct ConsolePanel<W: Write> {
    out: W,
    states: Vec<(Affordance, bool)>,
}

impl<W: Write> ConsolePanel<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            states: Vec::new(),
        }
    }

    /// Enabled state of an affordance after the last apply.
    pub fn enabled(&self, a: Affordance) -> bool {
        self.states
            .iter()
            .find(|(x, _)| *x == a)
            .map(|(_, on)| *on)
            .unwrap_or(false)
    }
}

fn affordance_key(a: Affordance) -> &'static str {
    match a {
        Affordance::GeneratePositions => "generate",
        Affordance::StartSession => "start",
        Affordance::StopSession => "stop",
        Affordance::RecordFrame => "record",
        Affordance::NextPosition => "next",
        Affordance::PreviousPosition => "back",
        Affordance::Analyze => "analyze",
        Affordance::SaveResults => "save",
    }
}

impl<W: Write> AffordancePanel for ConsolePanel<W> {
    fn apply(&mut self, states: &[(Affordance, bool)]) -> Result<(), BoxedError> {
        self.states = states.to_vec();
        let enabled: Vec<&str> = states
            .iter()
            .filter(|(_, on)| *on)
            .map(|(a, _)| affordance_key(*a))
            .collect();
        writeln!(self.out, "controls: [{}]", enabled.join(" "))?;
        Ok(())
    }
}

/// Stop confirmation over a line-based reader. `y`/`yes` stops the
/// session, `n`/`no` resumes it, end of input counts as a dismissal.
pub struct ConsolePrompt<R: BufRead, W: Write> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }
}

impl<R: BufRead, W: Write> StopConfirm for ConsolePrompt<R, W> {
    fn confirm_stop(&mut self, collected: usize, total: usize) -> CloseResponse {
        let _ = writeln!(
            self.out,
            "guide closed with {collected}/{total} positions measured; stop the survey? [y/N]"
        );
        let _ = self.out.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => CloseResponse::Cancel,
            Ok(_) => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => CloseResponse::Proceed,
                _ => CloseResponse::Resume,
            },
            Err(_) => CloseResponse::Cancel,
        }
    }
}
