/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use url::Url;

/// Page URLs the host refuses to run an interceptor in.
pub const RESTRICTED_SCHEME_PREFIXES: [&str; 7] = [
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "devtools://",
    "view-source:",
    "chrome-search://",
];

/// Whether installing an interceptor into a page at `url` is worth attempting.
///
/// A page whose URL is unknown is treated as restricted.
pub fn can_install_interceptor(url: Option<&str>) -> bool {
    let Some(url) = url else {
        return false;
    };
    if url.is_empty() {
        return false;
    }
    !RESTRICTED_SCHEME_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// Only http and https destinations are ever redirected between panes.
pub fn is_http_like(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
