//! The front-end state machine.
//!
//! Dispatch is a literal table of `(state, event, next, action)` tuples
//! scanned linearly per event; unknown pairs are logged and leave the
//! state untouched. `Resizing` exists as a state but nothing transitions
//! into it (resize is handled synchronously from `Running`), and
//! `SyncInput` is a reserved event with no transition.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Boot,
    Running,
    #[allow(dead_code)]
    Resizing,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StdinRead,
    PtyRead,
    Winch,
    ChldExit,
    Interrupt,
    EofStdin,
    EofPty,
    EnableRawMode,
    Detached,
    PaneSplit,
    #[allow(dead_code)]
    SyncInput,
}

/// What a transition runs; the client interprets these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EnableRawMode,
    Resize,
    ChildExit,
    PtyRead,
    StdinRead,
    Detach,
    PaneSplit,
}

pub struct Transition {
    pub state: State,
    pub event: Event,
    pub next: State,
    pub action: Option<Action>,
}

pub const TRANSITIONS: &[Transition] = &[
    Transition {
        state: State::Boot,
        event: Event::EnableRawMode,
        next: State::Running,
        action: Some(Action::EnableRawMode),
    },
    Transition {
        state: State::Running,
        event: Event::Winch,
        next: State::Running,
        action: Some(Action::Resize),
    },
    Transition {
        state: State::Running,
        event: Event::ChldExit,
        next: State::Exiting,
        action: Some(Action::ChildExit),
    },
    Transition {
        state: State::Running,
        event: Event::PtyRead,
        next: State::Running,
        action: Some(Action::PtyRead),
    },
    Transition {
        state: State::Running,
        event: Event::StdinRead,
        next: State::Running,
        action: Some(Action::StdinRead),
    },
    Transition {
        state: State::Exiting,
        event: Event::StdinRead,
        next: State::Exiting,
        action: None,
    },
    Transition {
        state: State::Exiting,
        event: Event::PtyRead,
        next: State::Exiting,
        action: None,
    },
    Transition {
        state: State::Running,
        event: Event::EofPty,
        next: State::Exiting,
        action: Some(Action::ChildExit),
    },
    Transition {
        state: State::Running,
        event: Event::EofStdin,
        next: State::Exiting,
        action: None,
    },
    Transition {
        state: State::Running,
        event: Event::Interrupt,
        next: State::Exiting,
        action: None,
    },
    Transition {
        state: State::Running,
        event: Event::Detached,
        next: State::Exiting,
        action: Some(Action::Detach),
    },
    Transition {
        state: State::Running,
        event: Event::PaneSplit,
        next: State::Running,
        action: Some(Action::PaneSplit),
    },
];

/// Linear table scan, first match wins.
pub fn lookup(state: State, event: Event) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.state == state && t.event == event)
}
