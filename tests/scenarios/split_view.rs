/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use splitlink::prefs::ActionTitles;
use splitlink::shell::host::NavigationCause;
use splitlink::shell::interceptor::dom::{Modifiers, MouseButton};
use splitlink::splitlink_runtime::IconSet;

use crate::harness::Harness;

#[tokio::test]
async fn plain_click_opens_in_sibling_pane() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    assert!(h.press_action(a).await);

    let link = h.host.append_link(a, "https://example.com/x", &[]).unwrap();
    let flow = h.host.click(a, link).unwrap();
    h.settle().await;

    assert!(flow.default_prevented());
    assert_eq!(h.location(a), "https://example.com/");
    assert_eq!(h.location(b), "https://example.com/x");
    assert_eq!(h.navigations_of(NavigationCause::Platform).len(), 1);
    assert!(h.navigations_of(NavigationCause::Created).is_empty());
    assert!(h.navigations_of(NavigationCause::Native).is_empty());
}

#[tokio::test]
async fn self_target_link_navigates_in_place() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;

    let link = h
        .host
        .append_link(a, "https://example.com/x", &[("target", "_self")])
        .unwrap();
    let flow = h.host.click(a, link).unwrap();
    h.settle().await;

    assert!(!flow.default_prevented());
    assert_eq!(h.location(a), "https://example.com/x");
    assert_eq!(h.location(b), "https://example.org/");
    assert_eq!(h.navigations_of(NavigationCause::Native).len(), 1);
    assert!(h.navigations_of(NavigationCause::Platform).is_empty());
}

#[tokio::test]
async fn modifier_click_is_left_to_the_browser() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;

    let ctrl = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
    let link = h.host.append_link(a, "/docs", &[]).unwrap();
    h.host.click_with(a, link, MouseButton::Primary, ctrl).unwrap();
    h.settle().await;

    assert_eq!(h.location(a), "https://example.com/docs");
    assert_eq!(h.location(b), "https://example.org/");
}

#[tokio::test]
async fn unsplit_page_has_disabled_toolbar_and_ignores_clicks() {
    let mut h = Harness::new();
    let a = h.open("https://example.com/").await;
    h.host.activate(a).unwrap();
    h.settle().await;

    let toolbar = h.host.toolbar(a).unwrap();
    assert_eq!(toolbar.icon, IconSet::Disabled);
    assert!(!toolbar.enabled);
    assert_eq!(toolbar.title, ActionTitles::default().not_split);

    assert!(!h.press_action(a).await);
    assert!(!h.service.coordinator().has_state(a));
    assert!(!h.host.has_interceptor(a));
}

#[tokio::test]
async fn toggling_either_pane_updates_both() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    assert_eq!(h.host.toolbar(a).unwrap().icon, IconSet::Off);

    h.press_action(a).await;
    for page in [a, b] {
        assert!(h.service.coordinator().is_enabled(page));
        assert_eq!(h.host.interceptor_enabled(page), Some(true));
        assert_eq!(h.host.toolbar(page).unwrap().icon, IconSet::On);
    }

    h.press_action(b).await;
    for page in [a, b] {
        assert!(!h.service.coordinator().is_enabled(page));
        assert_eq!(h.host.interceptor_enabled(page), Some(false));
        assert_eq!(h.host.toolbar(page).unwrap().icon, IconSet::Off);
    }
}

#[tokio::test]
async fn sibling_keeps_interception_after_it_navigates() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;

    let link = h.host.append_link(a, "/x", &[]).unwrap();
    h.host.click(a, link).unwrap();
    h.settle().await;

    // The new document in the sibling was re-armed on load completion.
    assert_eq!(h.host.interceptor_enabled(b), Some(true));
    let back = h.host.append_link(b, "https://example.org/y", &[]).unwrap();
    h.host.click(b, back).unwrap();
    h.settle().await;
    assert_eq!(h.location(a), "https://example.org/y");
}

#[tokio::test]
async fn closing_the_sibling_falls_back_to_a_new_page() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;

    h.host.close_page(a).unwrap();
    h.settle().await;
    assert!(!h.service.coordinator().has_state(a));
    assert!(h.service.coordinator().has_state(b));

    let link = h.host.append_link(b, "https://example.org/z", &[]).unwrap();
    h.host.click(b, link).unwrap();
    h.settle().await;

    let created = h.navigations_of(NavigationCause::Created);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].url, "https://example.org/z");
    assert_eq!(h.location(b), "https://example.org/");
}

#[tokio::test]
async fn leaving_the_split_disarms_the_interceptor() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;

    h.host.unsplit(a).unwrap();
    h.settle().await;

    for page in [a, b] {
        assert_eq!(h.host.interceptor_enabled(page), Some(false));
        assert!(!h.host.toolbar(page).unwrap().enabled);
        assert_eq!(h.host.toolbar(page).unwrap().icon, IconSet::Disabled);
        assert!(!h.service.coordinator().has_state(page));
    }

    let link = h.host.append_link(a, "/x", &[]).unwrap();
    h.host.click(a, link).unwrap();
    h.settle().await;
    assert_eq!(h.location(a), "https://example.com/x");
    assert_eq!(h.location(b), "https://example.org/");

    // The former sibling navigates in place too; nothing is created.
    let back = h.host.append_link(b, "/y", &[]).unwrap();
    h.host.click(b, back).unwrap();
    h.settle().await;
    assert_eq!(h.location(b), "https://example.org/y");
    assert_eq!(h.location(a), "https://example.com/x");
    assert!(h.navigations_of(NavigationCause::Created).is_empty());
}

#[tokio::test]
async fn resplitting_moves_interception_with_the_new_group() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;
    let c = h.open("https://example.net/").await;

    h.host.split(a, c).unwrap();
    h.settle().await;

    // `a` keeps its flag in the new group; `b` is out and disarmed.
    assert!(h.service.coordinator().is_enabled(a));
    assert!(!h.service.coordinator().has_state(b));
    assert_eq!(h.host.interceptor_enabled(b), Some(false));
    assert!(!h.host.toolbar(b).unwrap().enabled);
    assert!(h.host.toolbar(c).unwrap().enabled);
    assert_eq!(h.host.toolbar(c).unwrap().icon, IconSet::Off);
}

#[tokio::test]
async fn restricted_pane_is_never_installed_into() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("chrome://newtab/", "https://example.org/").await;
    h.press_action(b).await;

    assert!(!h.host.has_interceptor(a));
    assert!(h.host.has_interceptor(b));
    assert!(h.service.coordinator().is_enabled(a));
    assert_eq!(h.host.toolbar(a).unwrap().icon, IconSet::On);
}

#[tokio::test]
async fn failed_installs_are_absorbed() {
    let mut h = Harness::new();
    h.host.refuse_installs(true);
    let (a, b) = h.split_pair("https://example.com/", "https://example.org/").await;
    h.press_action(a).await;

    assert!(h.service.coordinator().is_enabled(b));
    assert!(!h.host.has_interceptor(a));

    let link = h.host.append_link(a, "/x", &[]).unwrap();
    h.host.click(a, link).unwrap();
    h.settle().await;
    assert_eq!(h.location(a), "https://example.com/x");
}
