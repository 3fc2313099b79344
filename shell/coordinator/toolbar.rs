/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use splitlink_runtime::IconSet;

use crate::prefs::ActionTitles;

/// Per-page toolbar state: `NotSplit -> SplitOff <-> SplitOn`, and back to
/// `NotSplit` whenever the page leaves its split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitState {
    NotSplit,
    SplitOff,
    SplitOn,
}

impl SplitState {
    pub fn split(enabled: bool) -> Self {
        if enabled { Self::SplitOn } else { Self::SplitOff }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPresentation {
    pub icon: IconSet,
    pub title: String,
    pub enabled: bool,
}

impl ActionPresentation {
    pub fn for_state(state: SplitState, titles: &ActionTitles) -> Self {
        match state {
            SplitState::NotSplit => Self {
                icon: IconSet::Disabled,
                title: titles.not_split.clone(),
                enabled: false,
            },
            SplitState::SplitOff => Self {
                icon: IconSet::Off,
                title: titles.off.clone(),
                enabled: true,
            },
            SplitState::SplitOn => Self {
                icon: IconSet::On,
                title: titles.on.clone(),
                enabled: true,
            },
        }
    }
}
