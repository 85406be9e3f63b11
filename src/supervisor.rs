//! Supervisor (component C11): process bootstrap, panel discovery, and
//! per-display driver lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::bootstrap::{drop_privileges, make_tty_devs};
use crate::config::{Config, DisplayConfig, DriverConfig};
use crate::discovery::{
    filter_cfa635_ports, pair_ids, read_identity, run_initial_config, DiscoveryError, PortAssignment,
    SystemPortEnumerator,
};
use crate::discovery::PortEnumerator;
use crate::metrics::MetricsClient;
use crate::page::Page;
use crate::paged::PagedDriver;
use crate::panel::{Panel, PanelError};
use crate::pages;
use crate::render::{self, RenderSource, RenderWaker};
use crate::transition;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SupervisorError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error("unknown driver type {0:?}")]
    UnknownDriverType(String),

    #[error("unknown transition type {0:?}")]
    UnknownTransitionType(String),

    #[error("unknown page type {0:?}")]
    UnknownPageType(String),

    #[error("display {name:?} (id {id}) has no assigned port and no free port was available")]
    NoPortAssigned { id: u8, name: String },
}

/// Stops a running per-display driver. Object-safe wrapper around the
/// generic `render::Driver<S>` so the supervisor can hold a heterogeneous
/// list regardless of each display's concrete `RenderSource`.
trait RunningDriver: Send {
    fn stop(&mut self);
}

impl<S: RenderSource + 'static> RunningDriver for render::Driver<S> {
    fn stop(&mut self) {
        render::Driver::stop(self);
    }
}

type DriverFactory = fn(&DriverConfig, String, &Arc<dyn MetricsClient>) -> Result<Box<dyn RunningDriver>, SupervisorError>;

fn driver_registry() -> HashMap<&'static str, DriverFactory> {
    let mut map: HashMap<&'static str, DriverFactory> = HashMap::new();
    map.insert("paged", build_paged_driver);
    map
}

fn build_paged_driver(
    driver_config: &DriverConfig,
    device: String,
    metrics: &Arc<dyn MetricsClient>,
) -> Result<Box<dyn RunningDriver>, SupervisorError> {
    let render_period = driver_config
        .render_period
        .map(Duration::from_secs_f64)
        .unwrap_or(render::DEFAULT_RENDER_PERIOD);
    let auto_cycle_time = driver_config.auto_cycle_time.map(Duration::from_secs_f64);

    let page_registry = pages::registry();
    let mut page_list: Vec<Box<dyn Page>> = Vec::with_capacity(driver_config.pages.len());
    for page_config in &driver_config.pages {
        let factory = page_registry
            .get(page_config.kind.as_str())
            .ok_or_else(|| SupervisorError::UnknownPageType(page_config.kind.clone()))?;
        page_list.push(factory(page_config, Arc::clone(metrics)));
    }

    let waker = RenderWaker::new();
    let paged = PagedDriver::new(page_list, auto_cycle_time, waker.clone());
    let mut driver = render::Driver::new(device, paged, render_period, waker);

    if let Some(transition_config) = &driver_config.transition {
        let transition_registry = transition::registry();
        let ctor = *transition_registry
            .get(transition_config.kind.as_str())
            .ok_or_else(|| SupervisorError::UnknownTransitionType(transition_config.kind.clone()))?;
        let period = Duration::from_secs_f64(transition_config.period);
        driver = driver.with_transition(move || ctor(period));
    }

    driver.start()?;
    Ok(Box::new(driver))
}

/// Owns every running per-display driver; dropping/stopping it shuts the
/// whole fleet down in order.
pub struct Supervisor {
    drivers: Vec<Box<dyn RunningDriver>>,
}

impl Supervisor {
    /// Runs process bootstrap (device nodes, privilege drop), discovers
    /// and pairs panels, then builds and starts one driver per configured
    /// display.
    pub fn bootstrap_and_run(
        config: Config,
        tty_dev_count: u32,
        target_uid: u32,
        target_gid: u32,
    ) -> Result<Self, SupervisorError> {
        if tty_dev_count > 0 {
            make_tty_devs(tty_dev_count);
        }
        if let Err(err) = drop_privileges(target_uid, target_gid) {
            log::warn!("failed to drop privileges to uid={target_uid} gid={target_gid}: {err}");
        }

        let metrics: Arc<dyn MetricsClient> = Arc::new(crate::metrics::PrometheusClient::new(
            config.metrics_url.clone().unwrap_or_default(),
        ));

        let assignments = discover_and_pair(&config.displays)?;
        let registry = driver_registry();

        let mut drivers = Vec::with_capacity(config.displays.len());
        for display in &config.displays {
            let Some(assignment) = assignments.get(&display.id) else {
                log::warn!(
                    "no port for display {:?} (id {}); skipping",
                    display.name,
                    display.id
                );
                continue;
            };
            if let Err(err) = run_assignment_side_effects(assignment, display.id) {
                log::error!("initial config failed for display {:?}: {err}", display.name);
                continue;
            }

            let factory = registry
                .get(display.driver.kind.as_str())
                .ok_or_else(|| SupervisorError::UnknownDriverType(display.driver.kind.clone()))?;
            let driver = factory(&display.driver, assignment.device().to_owned(), &metrics)?;
            drivers.push(driver);
        }

        Ok(Self { drivers })
    }

    pub fn stop_all(&mut self) {
        for driver in self.drivers.iter_mut() {
            driver.stop();
        }
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }
}

fn discover_and_pair(
    displays: &[DisplayConfig],
) -> Result<HashMap<u8, PortAssignment>, SupervisorError> {
    let candidates = SystemPortEnumerator.enumerate()?;
    let cfa_ports = filter_cfa635_ports(&candidates);

    let mut assigned = HashMap::new();
    let mut free_ports = Vec::new();
    for candidate in cfa_ports {
        let panel = match Panel::open(&candidate.device) {
            Ok(panel) => panel,
            Err(err) => {
                log::warn!("failed to open {} during discovery: {err}", candidate.device);
                continue;
            }
        };
        match read_identity(&panel) {
            Ok(Some(identity)) => {
                assigned.insert(identity.id, (candidate.device.clone(), identity.config_version));
            }
            Ok(None) => free_ports.push(candidate.device.clone()),
            Err(err) => log::warn!("failed to read identity from {}: {err}", candidate.device),
        }
    }

    let configured_ids: Vec<u8> = displays.iter().map(|d| d.id).collect();
    let (assignments, unmatched) = pair_ids(&configured_ids, assigned, free_ports);
    for id in unmatched {
        log::warn!("no free port available for configured display id {id}");
    }
    Ok(assignments)
}

fn run_assignment_side_effects(assignment: &PortAssignment, id: u8) -> Result<(), DiscoveryError> {
    match assignment {
        PortAssignment::Existing { .. } => Ok(()),
        PortAssignment::Fresh { device } | PortAssignment::NeedsReinit { device } => {
            let panel = Panel::open(device)?;
            run_initial_config(&panel, id)?;
            Ok(())
        }
    }
}
