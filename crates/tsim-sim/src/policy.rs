//! What happens to the run after an event fails.

use std::fmt;

/// Reaction to an error escaping an event action or a move-phase task.
///
/// The failure is always logged and reported to listeners first.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorPolicy {
    /// Keep running.
    #[default]
    WarnAndContinue,
    /// Stop the run; queue and clock keep their last consistent state.
    WarnAndPause,
}

/// Whether the loop should keep going after a step.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Halt,
}

impl ErrorPolicy {
    pub fn on_failure(self) -> Flow {
        match self {
            ErrorPolicy::WarnAndContinue => Flow::Continue,
            ErrorPolicy::WarnAndPause    => Flow::Halt,
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorPolicy::WarnAndContinue => "warn-and-continue",
            ErrorPolicy::WarnAndPause    => "warn-and-pause",
        })
    }
}
