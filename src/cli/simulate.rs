//! Simulate command for Arbor.
//!
//! Builds a repeat decorator around a scripted child, steps it, and reports
//! the trace and the final status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::core::{BehaviorTree, Outcome, Status, TraceEvent};
use crate::decorator::Repeat;
use crate::distribution::DistributionSpec;
use crate::error::{exit_codes, ArborError, Result};
use crate::leaf::ActionTask;

/// How the scripted child behaves each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPattern {
    /// Succeed on every run.
    Succeed,
    /// Fail on every run.
    Fail,
    /// Succeed on odd runs, fail on even runs.
    Alternate,
    /// Report running this many times, then succeed.
    Running(u32),
}

impl ChildPattern {
    /// Outcome of the child's next run.
    fn outcome(self, board: &mut SimBoard) -> Outcome {
        board.child_runs += 1;
        let runs = board.child_runs;
        match self {
            ChildPattern::Succeed => Outcome::Success,
            ChildPattern::Fail => Outcome::Failure,
            ChildPattern::Alternate if runs % 2 == 1 => Outcome::Success,
            ChildPattern::Alternate => Outcome::Failure,
            ChildPattern::Running(pending) => {
                if runs % (u64::from(pending) + 1) == 0 {
                    Outcome::Success
                } else {
                    Outcome::Running
                }
            }
        }
    }
}

impl FromStr for ChildPattern {
    type Err = ArborError;

    fn from_str(input: &str) -> Result<Self> {
        match input {
            "succeed" => Ok(ChildPattern::Succeed),
            "fail" => Ok(ChildPattern::Fail),
            "alternate" => Ok(ChildPattern::Alternate),
            other => other
                .strip_prefix("running:")
                .and_then(|ticks| ticks.parse::<u32>().ok())
                .map(ChildPattern::Running)
                .ok_or_else(|| {
                    ArborError::configuration(format!(
                        "unknown child pattern '{}'. Valid: succeed, fail, alternate, running:K",
                        input
                    ))
                }),
        }
    }
}

impl fmt::Display for ChildPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildPattern::Succeed => f.write_str("succeed"),
            ChildPattern::Fail => f.write_str("fail"),
            ChildPattern::Alternate => f.write_str("alternate"),
            ChildPattern::Running(ticks) => write!(f, "running:{}", ticks),
        }
    }
}

/// Blackboard of a simulated tree.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    /// Runs of the scripted child so far.
    pub child_runs: u64,
}

/// Options for the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Distribution notation; `repeat.default_times` when unset.
    pub times: Option<String>,
    /// Child behavior.
    pub child: ChildPattern,
    /// Tick limit; `driver.max_ticks` when unset.
    pub ticks: Option<u64>,
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            times: None,
            child: ChildPattern::Succeed,
            ticks: None,
            json: false,
            quiet: false,
        }
    }
}

/// Output format for the simulate command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateOutput {
    /// Whether the simulation ran.
    pub success: bool,
    /// Distribution used for the repeat count.
    pub times: String,
    /// Child pattern.
    pub child: String,
    /// Ticks executed.
    pub ticks: u64,
    /// Root status after the last tick.
    pub status: Status,
    /// Number of child activations, counted whether or not tracing is on.
    pub child_starts: u64,
    /// Recorded trace events.
    pub events: Vec<TraceEvent>,
    /// Error message if the simulation could not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimulateOutput {
    /// Create a failed output.
    pub fn failure(
        times: impl Into<String>,
        child: ChildPattern,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            times: times.into(),
            child: child.to_string(),
            ticks: 0,
            status: Status::Fresh,
            child_starts: 0,
            events: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Process exit code for this output.
    pub fn exit_code(&self) -> i32 {
        match (self.success, self.status) {
            (false, _) => exit_codes::ERROR,
            (true, Status::Failed) => exit_codes::TREE_FAILED,
            (true, _) => exit_codes::SUCCESS,
        }
    }
}

/// The simulate command implementation.
pub struct SimulateCommand {
    config: Config,
}

impl SimulateCommand {
    /// Create a new simulate command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the simulate command.
    pub fn run(&self, options: &SimulateOptions) -> SimulateOutput {
        let times = options
            .times
            .clone()
            .unwrap_or_else(|| self.config.repeat.default_times.clone());

        match self.simulate(&times, options) {
            Ok(output) => output,
            Err(e) => SimulateOutput::failure(times, options.child, e.to_string()),
        }
    }

    fn simulate(&self, times: &str, options: &SimulateOptions) -> Result<SimulateOutput> {
        let spec: DistributionSpec = times.parse()?;
        let max_ticks = options.ticks.unwrap_or(self.config.driver.max_ticks);

        let mut tree: BehaviorTree<SimBoard> = BehaviorTree::with_trace_config(&self.config.trace);
        let pattern = options.child;
        let action = move |board: &mut SimBoard| pattern.outcome(board);
        let child = tree.insert(ActionTask::new(pattern.to_string(), action))?;
        let root = tree.insert(Repeat::new(spec.build()?).decorate(child))?;
        tree.set_root(root)?;

        tracing::debug!(times = %spec, child = %pattern, max_ticks, "simulating");

        let mut board = SimBoard::default();
        let mut status = Status::Fresh;
        while tree.tick_count() < max_ticks {
            status = tree.step(&mut board)?;
            if self.config.driver.stop_on_terminal && status.is_terminal() {
                break;
            }
        }

        Ok(SimulateOutput {
            success: true,
            times: spec.to_string(),
            child: pattern.to_string(),
            ticks: tree.tick_count(),
            status,
            child_starts: tree.activations(child)?,
            events: tree.trace().to_vec(),
            error: None,
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SimulateOutput, options: &SimulateOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &SimulateOutput) -> String {
        if !output.success {
            return format!(
                "Simulation failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        lines.push(format!("repeat({}) over {} child", output.times, output.child));
        for event in &output.events {
            lines.push(format!(
                "  [tick {:>3}] {} {} {:?}",
                event.tick, event.task, event.name, event.event_type
            ));
        }
        if !self.config.trace.enabled {
            lines.push("  (tracing disabled)".to_string());
        }
        lines.push(format!(
            "Status: {} after {} tick(s), {} child activation(s)",
            output.status, output.ticks, output.child_starts
        ));

        lines.join("\n") + "\n"
    }
}
