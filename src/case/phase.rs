//! Test lifecycle state machine.
//!
//! ```text
//! Created -> Validated -> SetupDone -> DataParsed -> DataInjected -> Waited -> ResultsFetched
//!    \___________\____________\____________\_____________\____________\___________\__-> TornDown
//! ```
//!
//! Every forward phase must run in order; `TornDown` is reachable from any
//! non-terminal state so cleanup always has somewhere to go.

use std::fmt;

/// Where a test currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Created,
    Validated,
    SetupDone,
    DataParsed,
    DataInjected,
    Waited,
    ResultsFetched,
    TornDown,
}

impl fmt::Display for Phase {
    /// Names the step that produces this state, as used in error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "create"),
            Self::Validated => write!(f, "validate"),
            Self::SetupDone => write!(f, "setup"),
            Self::DataParsed => write!(f, "parse data"),
            Self::DataInjected => write!(f, "add data"),
            Self::Waited => write!(f, "wait"),
            Self::ResultsFetched => write!(f, "results"),
            Self::TornDown => write!(f, "teardown"),
        }
    }
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TornDown)
    }

    /// The next forward state, `None` from `ResultsFetched` and `TornDown`.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::Created => Some(Self::Validated),
            Self::Validated => Some(Self::SetupDone),
            Self::SetupDone => Some(Self::DataParsed),
            Self::DataParsed => Some(Self::DataInjected),
            Self::DataInjected => Some(Self::Waited),
            Self::Waited => Some(Self::ResultsFetched),
            Self::ResultsFetched | Self::TornDown => None,
        }
    }

    /// Returns `true` if moving from this state to `to` is allowed.
    pub fn can_transition_to(&self, to: &Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        *to == Phase::TornDown || self.next().as_ref() == Some(to)
    }
}
