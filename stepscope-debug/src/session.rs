//! Debug session state and the command interpreter.

use serde::Serialize;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Instant;
use stepscope_core::TraceEvent;

/// Navigation and breakpoint commands a client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    /// Advance exactly one event.
    Step,
    /// Run to the next breakpoint line.
    Continue,
    /// Step over: next event at the same or shallower call depth.
    Next,
    /// Step out: next event at a strictly shallower call depth.
    Out,
    /// Add a line to the breakpoint set.
    SetBreakpoint,
}

impl FromStr for DebugCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step" => Ok(Self::Step),
            "continue" => Ok(Self::Continue),
            "next" => Ok(Self::Next),
            "out" => Ok(Self::Out),
            "setBreakpoint" => Ok(Self::SetBreakpoint),
            _ => Err(()),
        }
    }
}

/// What a command observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    /// Navigation result: the event under the cursor, and whether the
    /// trace is exhausted.
    Navigation {
        event: Option<TraceEvent>,
        done: bool,
    },
    /// Current breakpoint set, after `setBreakpoint`.
    Breakpoints { breakpoints: Vec<u32> },
}

/// One interactive session over a precomputed trace.
///
/// The cursor starts before the first event and only ever moves forward.
/// Breakpoints have set semantics: adding an existing line is a no-op.
pub struct DebugSession {
    events: Vec<TraceEvent>,
    pointer: Option<usize>,
    breakpoints: BTreeSet<u32>,
    created_at: Instant,
}

impl DebugSession {
    #[must_use]
    pub fn new(events: Vec<TraceEvent>, breakpoints: impl IntoIterator<Item = u32>) -> Self {
        Self {
            events,
            pointer: None,
            breakpoints: breakpoints.into_iter().collect(),
            created_at: Instant::now(),
        }
    }

    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Dispatch one command. `line` is only meaningful for
    /// `setBreakpoint`, where a missing or non-numeric value is silently
    /// ignored.
    pub fn execute(&mut self, command: DebugCommand, line: Option<u64>) -> CommandOutcome {
        match command {
            DebugCommand::Step => self.step(),
            DebugCommand::Continue => self.resume(),
            DebugCommand::Next => self.step_over(),
            DebugCommand::Out => self.step_out(),
            DebugCommand::SetBreakpoint => self.set_breakpoint(line),
        }
    }

    /// Advance the cursor one event; past the end it clamps to the last
    /// index and reports the trace done.
    pub fn step(&mut self) -> CommandOutcome {
        if self.events.is_empty() {
            return CommandOutcome::Navigation {
                event: None,
                done: true,
            };
        }
        let next = self.pointer.map_or(0, |p| p + 1);
        if next >= self.events.len() {
            let last = self.events.len() - 1;
            self.pointer = Some(last);
            return CommandOutcome::Navigation {
                event: Some(self.events[last].clone()),
                done: true,
            };
        }
        self.pointer = Some(next);
        CommandOutcome::Navigation {
            event: Some(self.events[next].clone()),
            done: false,
        }
    }

    /// Run forward to the next event whose line is a breakpoint.
    pub fn resume(&mut self) -> CommandOutcome {
        let breakpoints = self.breakpoints.clone();
        self.seek(move |event| {
            !event
                .line()
                .is_some_and(|line| breakpoints.contains(&line))
        })
    }

    /// Skip events strictly deeper than the current one.
    pub fn step_over(&mut self) -> CommandOutcome {
        let depth = self.current_depth();
        self.seek(move |event| event.depth() > depth)
    }

    /// Skip events at the current depth or deeper.
    pub fn step_out(&mut self) -> CommandOutcome {
        let depth = self.current_depth();
        self.seek(move |event| event.depth() >= depth)
    }

    /// Add `line` to the breakpoint set and return the set. Idempotent;
    /// missing input leaves the set unchanged.
    pub fn set_breakpoint(&mut self, line: Option<u64>) -> CommandOutcome {
        if let Some(line) = line.and_then(|l| u32::try_from(l).ok()) {
            self.breakpoints.insert(line);
        }
        CommandOutcome::Breakpoints {
            breakpoints: self.breakpoints.iter().copied().collect(),
        }
    }

    fn current_depth(&self) -> usize {
        self.pointer
            .and_then(|p| self.events.get(p))
            .map_or(0, TraceEvent::depth)
    }

    /// Scan forward from one past the cursor for the first event the
    /// predicate does not skip; with none found, clamp to the last event
    /// and report done. The cursor never re-yields the current event and
    /// never moves backward.
    fn seek(&mut self, skip: impl Fn(&TraceEvent) -> bool) -> CommandOutcome {
        if self.events.is_empty() {
            return CommandOutcome::Navigation {
                event: None,
                done: true,
            };
        }
        let start = self.pointer.map_or(0, |p| p + 1);
        for i in start..self.events.len() {
            if !skip(&self.events[i]) {
                self.pointer = Some(i);
                return CommandOutcome::Navigation {
                    event: Some(self.events[i].clone()),
                    done: false,
                };
            }
        }
        let last = self.events.len() - 1;
        self.pointer = Some(last);
        CommandOutcome::Navigation {
            event: Some(self.events[last].clone()),
            done: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn step_at(line: u32) -> TraceEvent {
        TraceEvent::step(line, Map::new())
    }

    fn step_depth(line: u32, depth: usize) -> TraceEvent {
        TraceEvent::step_with_stack(
            line,
            Map::new(),
            (0..depth).map(|i| format!("f{i}")).collect(),
        )
    }

    fn lines(events: &[u32]) -> Vec<TraceEvent> {
        events.iter().map(|&l| step_at(l)).collect()
    }

    fn nav(outcome: CommandOutcome) -> (Option<u32>, bool) {
        match outcome {
            CommandOutcome::Navigation { event, done } => {
                (event.and_then(|e| e.line()), done)
            }
            CommandOutcome::Breakpoints { .. } => panic!("expected navigation outcome"),
        }
    }

    #[test]
    fn step_walks_one_event_at_a_time() {
        let mut session = DebugSession::new(lines(&[1, 2, 3]), []);
        assert_eq!(nav(session.step()), (Some(1), false));
        assert_eq!(nav(session.step()), (Some(2), false));
        assert_eq!(nav(session.step()), (Some(3), false));
        // past the end: clamp to the last event, done
        assert_eq!(nav(session.step()), (Some(3), true));
        assert_eq!(nav(session.step()), (Some(3), true));
    }

    #[test]
    fn empty_traces_signal_done_immediately() {
        let mut session = DebugSession::new(vec![], [1, 2]);
        assert_eq!(nav(session.step()), (None, true));
        assert_eq!(nav(session.resume()), (None, true));
        assert_eq!(nav(session.step_over()), (None, true));
        assert_eq!(nav(session.step_out()), (None, true));
    }

    #[test]
    fn continue_honors_breakpoints() {
        // events at lines 1..=6, breakpoint at 5: the cursor lands on
        // index 4 and the trace is not done
        let mut session = DebugSession::new(lines(&[1, 2, 3, 4, 5, 6]), [5]);
        assert_eq!(nav(session.resume()), (Some(5), false));
    }

    #[test]
    fn continue_without_breakpoints_fast_forwards() {
        let mut session = DebugSession::new(lines(&[1, 2, 3]), []);
        assert_eq!(nav(session.resume()), (Some(3), true));
    }

    #[test]
    fn continue_stops_at_each_breakpoint_in_turn() {
        let mut session = DebugSession::new(lines(&[1, 2, 3, 2, 3, 4]), [2]);
        assert_eq!(nav(session.resume()), (Some(2), false));
        assert_eq!(nav(session.resume()), (Some(2), false));
        assert_eq!(nav(session.resume()), (Some(4), true));
    }

    #[test]
    fn continue_never_re_yields_the_current_event() {
        let mut session = DebugSession::new(lines(&[5, 5, 6]), [5]);
        assert_eq!(nav(session.resume()), (Some(5), false)); // index 0
        assert_eq!(nav(session.resume()), (Some(5), false)); // index 1, not 0
        assert_eq!(nav(session.resume()), (Some(6), true));
    }

    #[test]
    fn log_events_are_not_breakpoint_candidates() {
        let events = vec![
            step_at(1),
            TraceEvent::log("noise"),
            step_at(2),
        ];
        let mut session = DebugSession::new(events, [2]);
        assert_eq!(nav(session.resume()), (Some(2), false));
    }

    #[test]
    fn next_skips_strictly_deeper_frames() {
        // depths: [1, 1, 2, 2, 1] — from the call-site event at index 1,
        // step-over must skip the two depth-2 events and land on index 4
        let events = vec![
            step_depth(1, 1),
            step_depth(2, 1),
            step_depth(10, 2),
            step_depth(11, 2),
            step_depth(3, 1),
        ];
        let mut session = DebugSession::new(events, []);
        assert_eq!(nav(session.step()), (Some(1), false)); // index 0
        assert_eq!(nav(session.step()), (Some(2), false)); // index 1
        assert_eq!(nav(session.step_over()), (Some(3), false)); // index 4
    }

    #[test]
    fn next_lands_on_equal_depth_immediately() {
        let events = vec![step_depth(1, 1), step_depth(2, 1), step_depth(3, 1)];
        let mut session = DebugSession::new(events, []);
        session.step();
        assert_eq!(nav(session.step_over()), (Some(2), false));
    }

    #[test]
    fn next_from_before_the_start_scans_from_index_zero() {
        // the initial cursor has depth 0, so every deeper event is
        // skipped and the trace fast-forwards to done
        let events = vec![step_depth(1, 1), step_depth(2, 2)];
        let mut session = DebugSession::new(events, []);
        assert_eq!(nav(session.step_over()), (Some(2), true));
    }

    #[test]
    fn out_needs_a_strictly_shallower_frame() {
        let events = vec![
            step_depth(10, 2),
            step_depth(11, 2),
            step_depth(3, 1),
            step_depth(4, 1),
        ];
        let mut session = DebugSession::new(events, []);
        session.step(); // index 0, depth 2
        assert_eq!(nav(session.step_out()), (Some(3), false)); // index 2
    }

    #[test]
    fn out_at_top_depth_fast_forwards() {
        let events = vec![step_depth(1, 1), step_depth(2, 1), step_depth(3, 1)];
        let mut session = DebugSession::new(events, []);
        session.step();
        assert_eq!(nav(session.step_out()), (Some(3), true));
    }

    #[test]
    fn set_breakpoint_is_idempotent() {
        let mut session = DebugSession::new(lines(&[1]), []);
        let first = session.set_breakpoint(Some(7));
        let second = session.set_breakpoint(Some(7));
        assert_eq!(first, second);
        match second {
            CommandOutcome::Breakpoints { breakpoints } => assert_eq!(breakpoints, vec![7]),
            CommandOutcome::Navigation { .. } => panic!("expected breakpoints"),
        }
    }

    #[test]
    fn set_breakpoint_ignores_missing_lines() {
        let mut session = DebugSession::new(lines(&[1]), [3]);
        match session.set_breakpoint(None) {
            CommandOutcome::Breakpoints { breakpoints } => assert_eq!(breakpoints, vec![3]),
            CommandOutcome::Navigation { .. } => panic!("expected breakpoints"),
        }
    }

    #[test]
    fn breakpoints_added_mid_session_take_effect() {
        let mut session = DebugSession::new(lines(&[1, 2, 3, 4]), []);
        session.step();
        session.set_breakpoint(Some(3));
        assert_eq!(nav(session.resume()), (Some(3), false));
    }

    #[test]
    fn pointer_is_monotonic_across_command_mixes() {
        let events = vec![
            step_depth(1, 1),
            step_depth(2, 2),
            step_depth(3, 2),
            step_depth(4, 1),
            step_depth(5, 1),
        ];
        let mut session = DebugSession::new(events, [2]);
        let mut observed = Vec::new();
        for _ in 0..10 {
            let (line, done) = nav(session.step());
            observed.push(line);
            if done {
                break;
            }
        }
        // strictly forward until the clamp
        assert_eq!(observed, vec![Some(1), Some(2), Some(3), Some(4), Some(5), Some(5)]);
    }

    #[test]
    fn command_strings_parse() {
        assert_eq!("step".parse::<DebugCommand>(), Ok(DebugCommand::Step));
        assert_eq!("setBreakpoint".parse::<DebugCommand>(), Ok(DebugCommand::SetBreakpoint));
        assert!("stepInto".parse::<DebugCommand>().is_err());
        assert!("SET_BREAKPOINT".parse::<DebugCommand>().is_err());
    }

    #[test]
    fn navigation_serializes_event_and_done() {
        let mut session = DebugSession::new(lines(&[4]), []);
        let outcome = session.step();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["done"], serde_json::json!(false));
        assert_eq!(json["event"]["line"], serde_json::json!(4));
    }

    #[test]
    fn exhausted_empty_session_serializes_null_event() {
        let mut session = DebugSession::new(vec![], []);
        let json = serde_json::to_value(session.step()).unwrap();
        assert_eq!(json, serde_json::json!({"event": null, "done": true}));
    }
}
