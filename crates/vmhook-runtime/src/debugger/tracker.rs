//! Location tracking on instruction fetch.
//!
//! Resolves each fetched instruction to a source location and reports only
//! transitions: fetches with no location and repeats of the tracked location
//! (loop back-edges, multi-instruction lines) leave the state untouched.

use super::stack_walk::meaningful_depth;
use crate::bytecode::SourceLocation;
use crate::vm::Fetch;
use tracing::trace;
use vmhook_config::FilenameMatch;

/// A committed location and the meaningful call depth it was reached at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedLocation {
    pub location: SourceLocation,
    pub depth: usize,
}

/// Last two committed locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedState {
    pub previous: Option<TrackedLocation>,
    pub current: Option<TrackedLocation>,
}

/// Location tracker.
///
/// Counts every transition it reports, so [`LocationTracker::traps`] equals
/// the number of trap invocations.
#[derive(Debug, Clone, Default)]
pub struct LocationTracker {
    state: TrackedState,
    filename_match: FilenameMatch,
    traps: u64,
}

impl LocationTracker {
    /// Creates a tracker with nothing tracked yet.
    pub fn new(filename_match: FilenameMatch) -> Self {
        Self {
            state: TrackedState::default(),
            filename_match,
            traps: 0,
        }
    }

    /// Returns both tracked locations.
    pub fn state(&self) -> &TrackedState {
        &self.state
    }

    /// Returns the most recently committed location.
    pub fn current(&self) -> Option<&TrackedLocation> {
        self.state.current.as_ref()
    }

    /// Returns the location committed before the current one.
    pub fn previous(&self) -> Option<&TrackedLocation> {
        self.state.previous.as_ref()
    }

    /// Returns the filename comparison used to detect transitions.
    pub fn filename_match(&self) -> FilenameMatch {
        self.filename_match
    }

    /// Returns the number of location transitions seen.
    pub fn traps(&self) -> u64 {
        self.traps
    }

    /// Returns true if `location` equals the tracked location.
    pub fn is_current(&self, location: &SourceLocation) -> bool {
        self.state
            .current
            .as_ref()
            .is_some_and(|c| c.location.matches(location, self.filename_match))
    }

    /// Handles one instruction fetch.
    ///
    /// On a transition, `trap` runs first with the incoming location and the
    /// not-yet-updated state, then the new location is committed together
    /// with the meaningful depth of `fetch.call_stack`. Returns the committed
    /// location, or `None` if nothing changed.
    pub fn on_fetch<F>(&mut self, fetch: &Fetch<'_>, trap: F) -> Option<&TrackedLocation>
    where
        F: FnOnce(&SourceLocation, &TrackedState),
    {
        let location = fetch.irep.resolve(fetch.pc)?;
        if self.is_current(&location) {
            return None;
        }

        self.traps += 1;
        trap(&location, &self.state);

        let depth = meaningful_depth(fetch.call_stack);
        trace!(location = %location, depth, "location changed");
        self.commit(location, depth);
        self.state.current.as_ref()
    }

    /// Records `location` as current, shifting the old current to previous.
    pub fn commit(&mut self, location: SourceLocation, depth: usize) {
        let next = TrackedLocation { location, depth };
        self.state.previous = self.state.current.replace(next);
    }

    /// Forgets all tracked locations and resets the counter.
    pub fn reset(&mut self) {
        self.state = TrackedState::default();
        self.traps = 0;
    }
}
