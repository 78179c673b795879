//! Exposure states, pre-print checks and their results.

use core::fmt;

use serde::{Deserialize, Serialize};

/// State of a print job.
///
/// Numeric values are stable and published with every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ExposureState {
    /// Loading project data
    ReadingData = 1,
    /// Waiting for the user to confirm the start
    Confirm = 2,
    /// Running pre-print checks
    Checks = 3,
    /// Printing layers
    Printing = 5,
    /// Platform moving to the top
    GoingUp = 6,
    /// Platform moving back to the print position
    GoingDown = 7,
    /// Paused
    Waiting = 8,
    /// Paused until the cover is closed
    CoverOpen = 9,
    /// Waiting for a resin refill
    FeedMe = 10,
    /// Print failed
    Failure = 11,
    /// Stirring the resin
    Stirring = 13,
    /// Hardware moving into position for a requested action
    PendingAction = 14,
    /// Print finished
    Finished = 15,
    /// Tank stuck during tear-off, waiting for the user
    Stuck = 16,
    /// Recovering from a stuck tank
    StuckRecovery = 17,
    /// Check raised a warning the user has to confirm
    CheckWarning = 22,
    /// Tilt returning to the endstop
    TiltingDown = 24,
    /// Print canceled
    Canceled = 26,
    /// Nothing left to print
    Done = 27,
    /// Waiting for the user to pour in resin
    PourInResin = 29,
}

impl ExposureState {
    /// Stable numeric value.
    #[inline]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Terminal states.
    pub const fn is_finished(self) -> bool {
        matches!(
            self,
            ExposureState::Failure
                | ExposureState::Canceled
                | ExposureState::Finished
                | ExposureState::Done
        )
    }

    /// States from which an outside cancel is accepted.
    pub const fn is_cancelable(self) -> bool {
        self.is_finished() || matches!(self, ExposureState::Confirm | ExposureState::PourInResin)
    }

    /// Upper-case name.
    pub const fn name(self) -> &'static str {
        match self {
            ExposureState::ReadingData => "READING_DATA",
            ExposureState::Confirm => "CONFIRM",
            ExposureState::Checks => "CHECKS",
            ExposureState::Printing => "PRINTING",
            ExposureState::GoingUp => "GOING_UP",
            ExposureState::GoingDown => "GOING_DOWN",
            ExposureState::Waiting => "WAITING",
            ExposureState::CoverOpen => "COVER_OPEN",
            ExposureState::FeedMe => "FEED_ME",
            ExposureState::Failure => "FAILURE",
            ExposureState::Stirring => "STIRRING",
            ExposureState::PendingAction => "PENDING_ACTION",
            ExposureState::Finished => "FINISHED",
            ExposureState::Stuck => "STUCK",
            ExposureState::StuckRecovery => "STUCK_RECOVERY",
            ExposureState::CheckWarning => "CHECK_WARNING",
            ExposureState::TiltingDown => "TILTING_DOWN",
            ExposureState::Canceled => "CANCELED",
            ExposureState::Done => "DONE",
            ExposureState::PourInResin => "POUR_IN_RESIN",
        }
    }
}

impl fmt::Display for ExposureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pre-print checks, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureCheck {
    /// Both axes home
    Hardware,
    /// UV LED temperature is safe
    Temperature,
    /// Project data is printable
    Project,
    /// Cover is closed
    Cover,
    /// Enough resin in the tank
    Resin,
    /// Axes reach their start positions
    StartPositions,
    /// Resin stirred before the first layer
    Stirring,
}

impl ExposureCheck {
    /// Every check in execution order.
    pub const ALL: [ExposureCheck; 7] = [
        ExposureCheck::Hardware,
        ExposureCheck::Temperature,
        ExposureCheck::Project,
        ExposureCheck::Cover,
        ExposureCheck::Resin,
        ExposureCheck::StartPositions,
        ExposureCheck::Stirring,
    ];
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    /// Will run
    Scheduled,
    /// Running
    Running,
    /// Passed
    Success,
    /// Failed, the print stops
    Failure,
    /// Passed with a warning
    Warning,
    /// Turned off in the configuration
    Disabled,
}
