//! Example dashboard pages (ambient component A4): concrete `Page` and
//! `UpdatingBody` implementations driven by a `MetricsClient`, wired up by
//! name from configuration.

mod dummy;
mod lte;
mod ntp;
mod ping;
mod upspower;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PageConfig;
use crate::metrics::MetricsClient;
use crate::page::Page;

const DEFAULT_UPDATE_PERIOD: Duration = Duration::from_secs(30);

fn update_period(config: &PageConfig) -> Duration {
    config
        .update_period
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_UPDATE_PERIOD)
}

type PageFactory = fn(&PageConfig, Arc<dyn MetricsClient>) -> Box<dyn Page>;

/// Every page type constructible from a `{"type": "..."}` page config.
pub fn registry() -> HashMap<&'static str, PageFactory> {
    let mut map: HashMap<&'static str, PageFactory> = HashMap::new();
    map.insert("ping", ping::build);
    map.insert("lte", lte::build);
    map.insert("ntp", ntp::build);
    map.insert("upspower", upspower::build);
    map.insert("dummy", dummy::build);
    map
}
