/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `splitlink` command line: drive a two-pane window in the in-memory host
//! and report where every click ended up.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bpaf::{OptionParser, Parser, construct, long};
use splitlink_core::PageContextId;
use splitlink_runtime::PlatformError;

use crate::prefs::{PrefsError, SplitLinkPrefs};
use crate::shell::coordinator::PaneCoordinator;
use crate::shell::coordinator::service::{CoordinatorService, coordinator_channels};
use crate::shell::host::{InMemoryHost, NavigationRecord};
use crate::shell::runtime::diagnostics::DiagnosticsState;

pub const DEFAULT_LEFT: &str = "https://example.com/";
pub const DEFAULT_RIGHT: &str = "https://example.org/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOptions {
    pub prefs: Option<PathBuf>,
    pub left: String,
    pub right: String,
    pub clicks: Vec<String>,
    pub self_target: bool,
    pub no_toggle: bool,
}

pub fn sim_options() -> OptionParser<SimOptions> {
    let prefs = long("prefs")
        .help("Preferences TOML file")
        .argument::<PathBuf>("PATH")
        .optional();
    let left = long("left")
        .help("URL loaded in the left pane")
        .argument::<String>("URL")
        .fallback(DEFAULT_LEFT.to_string());
    let right = long("right")
        .help("URL loaded in the right pane")
        .argument::<String>("URL")
        .fallback(DEFAULT_RIGHT.to_string());
    let clicks = long("click")
        .help("Link to click in the left pane, in order (repeatable)")
        .argument::<String>("HREF")
        .many();
    let self_target = long("self-target")
        .help("Give every clicked link target=\"_self\"")
        .switch();
    let no_toggle = long("no-toggle")
        .help("Leave interception off")
        .switch();
    construct!(SimOptions {
        prefs,
        left,
        right,
        clicks,
        self_target,
        no_toggle
    })
    .to_options()
    .descr("Simulate split-view link redirection in an in-memory browser")
    .version(crate::VERSION)
}

#[derive(Debug)]
pub enum CliError {
    Prefs(PrefsError),
    Platform(PlatformError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefs(e) => write!(f, "{e}"),
            Self::Platform(e) => write!(f, "simulation failed: {e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<PrefsError> for CliError {
    fn from(e: PrefsError) -> Self {
        Self::Prefs(e)
    }
}

impl From<PlatformError> for CliError {
    fn from(e: PlatformError) -> Self {
        Self::Platform(e)
    }
}

#[derive(Debug, Clone)]
pub struct SimReport {
    pub left: PageContextId,
    pub right: PageContextId,
    pub interception_enabled: bool,
    /// Final location of every open page.
    pub locations: Vec<(PageContextId, String)>,
    pub navigations: Vec<NavigationRecord>,
    pub diagnostics: Vec<(&'static str, u64)>,
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "split {} | {} interception={}",
            self.left, self.right, self.interception_enabled
        )?;
        writeln!(f, "pages:")?;
        for (page, url) in &self.locations {
            let role = if *page == self.left {
                " (left)"
            } else if *page == self.right {
                " (right)"
            } else {
                ""
            };
            writeln!(f, "  {page}{role}: {url}")?;
        }
        writeln!(f, "navigations:")?;
        for record in &self.navigations {
            writeln!(f, "  {} {:?} {}", record.page, record.cause, record.url)?;
        }
        writeln!(f, "diagnostics:")?;
        for (channel, count) in &self.diagnostics {
            writeln!(f, "  {channel} = {count}")?;
        }
        Ok(())
    }
}

/// Let spawned page tasks (initial state checks) run, then drain the
/// coordinator until nothing is queued.
async fn settle(service: &mut CoordinatorService<InMemoryHost>) {
    loop {
        tokio::task::yield_now().await;
        if service.drain_pending().await == 0 {
            break;
        }
    }
}

pub async fn simulate(options: &SimOptions, prefs: SplitLinkPrefs) -> Result<SimReport, CliError> {
    let mut diagnostics = DiagnosticsState::new();
    diagnostics.install();

    let (events, link, inbox) = coordinator_channels();
    let host = Arc::new(InMemoryHost::new(link, events, prefs.interceptor_prefs()));
    let coordinator = PaneCoordinator::new(host.clone(), prefs.action_titles.clone());
    let mut service = CoordinatorService::new(coordinator, inbox);

    let window = host.open_window();
    let left = host.open_page(window, &options.left)?;
    let right = host.open_page(window, &options.right)?;
    host.split(left, right)?;
    host.activate(left)?;
    settle(&mut service).await;

    if !options.no_toggle {
        host.click_action(left)?;
        settle(&mut service).await;
    }

    let attributes: &[(&str, &str)] = if options.self_target {
        &[("target", "_self")]
    } else {
        &[]
    };
    for href in &options.clicks {
        let node = host.append_link(left, href, attributes)?;
        let flow = host.click(left, node)?;
        log::debug!(
            "cli: clicked {href} in {left} (default prevented: {})",
            flow.default_prevented()
        );
        settle(&mut service).await;
    }

    diagnostics.drain();
    log::debug!("cli: diagnostics {}", diagnostics.snapshot_json());
    let locations = host
        .pages()
        .into_iter()
        .filter_map(|page| host.location(page).map(|url| (page, url.to_string())))
        .collect();
    Ok(SimReport {
        left,
        right,
        interception_enabled: service.coordinator().is_enabled(left),
        locations,
        navigations: host.navigations(),
        diagnostics: diagnostics.channels().collect(),
    })
}

pub fn main() -> ExitCode {
    let options = sim_options().run();
    let prefs = match SplitLinkPrefs::resolve(options.prefs.as_deref()) {
        Ok(prefs) => prefs,
        Err(e) => {
            eprintln!("splitlink: {e}");
            return ExitCode::FAILURE;
        }
    };
    crate::init_tracing(prefs.log_filter.as_deref());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("cli: could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(simulate(&options, prefs)) {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("cli: {e}");
            ExitCode::FAILURE
        }
    }
}
