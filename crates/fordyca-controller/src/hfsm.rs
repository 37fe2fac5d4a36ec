//! A small table-driven hierarchical state machine engine.
//!
//! A machine is a state enum, an event enum, and a transition table of
//! `(from, event) -> to` rows. States may name a parent superstate through
//! [`HfsmState::parent`]. When the current state has no row for an event,
//! the event bubbles to the parent, then the grandparent, and so on; the
//! first ancestor with a row handles it.
//!
//! The engine does not run state bodies. Owners match on
//! [`Hfsm::current`] and use [`Hfsm::take_entry`] to run entry actions once
//! per visit.

use core::fmt::Debug;

use tracing::trace;

/// A state of a hierarchical machine.
pub trait HfsmState: Copy + Eq + Debug {
    /// The enclosing superstate, if any.
    fn parent(self) -> Option<Self>;
}

/// One row of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S, E> {
    /// State (or superstate) the row applies to.
    pub from: S,
    /// Triggering event.
    pub event: E,
    /// Target state.
    pub to: S,
}

/// Shorthand for building a [`Transition`].
pub const fn row<S, E>(from: S, event: E, to: S) -> Transition<S, E> {
    Transition { from, event, to }
}

/// A hierarchical state machine instance.
#[derive(Debug, Clone)]
pub struct Hfsm<S: 'static, E: 'static> {
    name: &'static str,
    initial: S,
    current: S,
    previous: S,
    entered: bool,
    table: &'static [Transition<S, E>],
}

impl<S: HfsmState, E: Copy + Eq + Debug> Hfsm<S, E> {
    /// Create a machine in `initial`, with a pending entry.
    pub const fn new(name: &'static str, initial: S, table: &'static [Transition<S, E>]) -> Self {
        Self {
            name,
            initial,
            current: initial,
            previous: initial,
            entered: true,
            table,
        }
    }

    /// Current (leaf) state.
    pub const fn current(&self) -> S {
        self.current
    }

    /// State before the last transition.
    pub const fn previous(&self) -> S {
        self.previous
    }

    /// Whether the current state is `state` or lies inside it.
    pub fn in_state(&self, state: S) -> bool {
        let mut s = Some(self.current);
        while let Some(cur) = s {
            if cur == state {
                return true;
            }
            s = cur.parent();
        }
        false
    }

    /// Returns `true` exactly once after each transition.
    pub const fn take_entry(&mut self) -> bool {
        let entered = self.entered;
        self.entered = false;
        entered
    }

    /// Dispatch an event. Returns the new state, or `None` if neither the
    /// current state nor any ancestor handles it.
    pub fn dispatch(&mut self, event: E) -> Option<S> {
        let mut handler = Some(self.current);
        while let Some(state) = handler {
            if let Some(t) = self
                .table
                .iter()
                .find(|t| t.from == state && t.event == event)
            {
                self.transition(t.to, Some(event));
                return Some(t.to);
            }
            handler = state.parent();
        }
        trace!(fsm = self.name, state = ?self.current, ?event, "Event ignored");
        None
    }

    /// Move directly to `state` outside the table.
    pub fn goto(&mut self, state: S) {
        self.transition(state, None);
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.previous = self.initial;
        self.entered = true;
    }

    fn transition(&mut self, to: S, event: Option<E>) {
        trace!(fsm = self.name, from = ?self.current, to = ?to, ?event, "Transition");
        self.previous = self.current;
        self.current = to;
        self.entered = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum S {
        Idle,
        Busy,
        Working,
        Resting,
        Done,
    }

    impl HfsmState for S {
        fn parent(self) -> Option<Self> {
            match self {
                Self::Working | Self::Resting => Some(Self::Busy),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum E {
        Start,
        Tired,
        Rested,
        Stop,
    }

    const TABLE: &[Transition<S, E>] = &[
        row(S::Idle, E::Start, S::Working),
        row(S::Working, E::Tired, S::Resting),
        row(S::Resting, E::Rested, S::Working),
        row(S::Busy, E::Stop, S::Done),
    ];

    #[test]
    fn leaf_transitions_follow_table() {
        let mut m = Hfsm::new("test", S::Idle, TABLE);
        assert!(m.take_entry());
        assert!(!m.take_entry());
        assert_eq!(m.dispatch(E::Start), Some(S::Working));
        assert!(m.take_entry());
        assert_eq!(m.dispatch(E::Tired), Some(S::Resting));
        assert_eq!(m.previous(), S::Working);
    }

    #[test]
    fn unhandled_events_bubble_to_superstate() {
        let mut m = Hfsm::new("test", S::Idle, TABLE);
        m.dispatch(E::Start);
        m.dispatch(E::Tired);
        assert!(m.in_state(S::Busy));
        assert_eq!(m.dispatch(E::Stop), Some(S::Done));
        assert!(!m.in_state(S::Busy));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut m = Hfsm::new("test", S::Idle, TABLE);
        m.take_entry();
        assert_eq!(m.dispatch(E::Rested), None);
        assert_eq!(m.current(), S::Idle);
        assert!(!m.take_entry());
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut m = Hfsm::new("test", S::Idle, TABLE);
        m.goto(S::Done);
        m.reset();
        assert_eq!(m.current(), S::Idle);
        assert!(m.take_entry());
    }
}
