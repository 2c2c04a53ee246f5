// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt;

/// Build status of a block, or the outcome of one builder step.
///
/// `Success` and `Fail` are the outcomes of `Block::execute`. `Next` marks
/// the block under the cursor (or a breakpoint pause) and `End` means the
/// builder has nothing left to run; neither is ever stored on a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    #[default]
    Nothing,
    Success,
    Fail,
    Next,
    End,
}

impl BuildStatus {
    /// Whether a run-to-completion loop should stop on this step result
    pub fn halts(self) -> bool {
        matches!(self, BuildStatus::Fail | BuildStatus::End | BuildStatus::Next)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Nothing => "nothing",
            BuildStatus::Success => "success",
            BuildStatus::Fail => "fail",
            BuildStatus::Next => "next",
            BuildStatus::End => "end",
        };
        f.write_str(s)
    }
}
