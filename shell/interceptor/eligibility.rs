/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use splitlink_core::is_http_like;
use url::Url;

use super::dom::{LinkTarget, Modifiers, MouseButton};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    Disabled,
    NoLink,
    NonHttpScheme,
    /// The link asks to navigate the current page (`target="_self"`).
    SameTarget,
    /// ctrl/meta/shift: leave new-tab and new-window gestures to the browser.
    ModifierHeld,
    NonPrimaryButton,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptDecision {
    Intercept(Url),
    Decline(DeclineReason),
}

/// The eligibility predicate shared by the press and click phases.
pub fn should_intercept(
    enabled: bool,
    link: Option<&LinkTarget>,
    button: MouseButton,
    modifiers: Modifiers,
) -> InterceptDecision {
    if !enabled {
        return InterceptDecision::Decline(DeclineReason::Disabled);
    }
    let Some(link) = link else {
        return InterceptDecision::Decline(DeclineReason::NoLink);
    };
    if !is_http_like(&link.destination) {
        return InterceptDecision::Decline(DeclineReason::NonHttpScheme);
    }
    if link
        .target
        .as_deref()
        .is_some_and(|target| target.trim().eq_ignore_ascii_case("_self"))
    {
        return InterceptDecision::Decline(DeclineReason::SameTarget);
    }
    if modifiers.any_held() {
        return InterceptDecision::Decline(DeclineReason::ModifierHeld);
    }
    if button != MouseButton::Primary {
        return InterceptDecision::Decline(DeclineReason::NonPrimaryButton);
    }
    InterceptDecision::Intercept(link.destination.clone())
}
