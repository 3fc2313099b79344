/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use splitlink::shell::host::{FrameworkAction, ListenerStage, NavigationCause};
use splitlink::shell::interceptor::dom::{DATA_HREF_ATTRIBUTE, EventKind};
use splitlink::shell::interceptor::history::HistoryOutcome;

use crate::harness::Harness;

#[tokio::test]
async fn router_on_mousedown_is_redirected_through_history() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://app.example/inbox", "https://example.org/").await;
    h.press_action(a).await;
    h.host
        .add_listener(
            a,
            EventKind::MouseDown,
            ListenerStage::BeforeInterceptor,
            FrameworkAction::ClientRoute,
        )
        .unwrap();

    let link = h.host.append_link(a, "/thread/42", &[]).unwrap();
    h.host.click(a, link).unwrap();
    h.settle().await;

    assert_eq!(h.location(a), "https://app.example/inbox");
    assert_eq!(h.location(b), "https://app.example/thread/42");
    assert!(h.navigations_of(NavigationCause::HistoryApi).is_empty());
    assert_eq!(h.navigations_of(NavigationCause::Platform).len(), 1);
}

#[tokio::test]
async fn click_router_never_sees_the_click() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://app.example/inbox", "https://example.org/").await;
    h.press_action(a).await;
    h.host
        .add_listener(
            a,
            EventKind::Click,
            ListenerStage::AfterInterceptor,
            FrameworkAction::ClientRoute,
        )
        .unwrap();

    let card = h
        .host
        .append_element(
            a,
            splitlink::shell::interceptor::dom::NodeId::ROOT,
            "div",
            &[(DATA_HREF_ATTRIBUTE, "/thread/7")],
        )
        .unwrap();
    h.host.click(a, card).unwrap();
    h.settle().await;

    assert_eq!(h.location(a), "https://app.example/inbox");
    assert_eq!(h.location(b), "https://app.example/thread/7");
}

#[tokio::test]
async fn script_push_without_gesture_mutates_history() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://app.example/inbox", "https://example.org/").await;
    h.press_action(a).await;

    let outcome = h.host.push_state_from_script(a, "/settings").unwrap();
    h.settle().await;

    assert!(matches!(outcome, HistoryOutcome::Applied { .. }));
    assert_eq!(h.location(a), "https://app.example/settings");
    assert_eq!(h.location(b), "https://example.org/");
}

#[tokio::test]
async fn history_routing_is_untouched_while_disabled() {
    let mut h = Harness::new();
    let (a, b) = h.split_pair("https://app.example/inbox", "https://example.org/").await;
    h.host
        .add_listener(
            a,
            EventKind::MouseDown,
            ListenerStage::BeforeInterceptor,
            FrameworkAction::ClientRoute,
        )
        .unwrap();

    let link = h.host.append_link(a, "/thread/42", &[]).unwrap();
    h.host.click(a, link).unwrap();
    h.settle().await;

    assert_eq!(h.location(a), "https://app.example/thread/42");
    assert_eq!(h.location(b), "https://example.org/");
}
