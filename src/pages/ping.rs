//! Per-interface ping round-trip time and packet loss, on rows 1 and 2.

use std::sync::Arc;

use crate::config::PageConfig;
use crate::metrics::MetricsClient;
use crate::page::UpdatingBody;
use crate::shadow::Shadow;
use crate::utils::{led_upper_threshold, most_critical, LedColorPreset};

const DEFAULT_TITLE: &str = "PING RTT / LOSS";

struct Row {
    idx: usize,
    name: &'static str,
    iface: &'static str,
    warn_ms: f64,
    crit_ms: f64,
    text: String,
    led: LedColorPreset,
}

impl Row {
    fn new(idx: usize, name: &'static str, iface: &'static str, warn_ms: f64, crit_ms: f64) -> Self {
        Self {
            idx,
            name,
            iface,
            warn_ms,
            crit_ms,
            text: format!("{name} loading..."),
            led: LedColorPreset::Off,
        }
    }
}

pub struct PingBody {
    metrics: Arc<dyn MetricsClient>,
    rows: Vec<Row>,
}

impl PingBody {
    pub fn new(metrics: Arc<dyn MetricsClient>) -> Self {
        Self {
            metrics,
            rows: vec![
                Row::new(1, "WAN", "internet", 10.0, 50.0),
                Row::new(2, "ETH", "wired", 10.0, 50.0),
            ],
        }
    }
}

impl UpdatingBody for PingBody {
    fn update(&mut self) -> Result<(), String> {
        let rtt_by_iface = self
            .metrics
            .query_map_by("ping_average_response_ms > 0", "name")
            .map_err(|e| e.to_string())?;
        let loss_by_iface = self
            .metrics
            .query_map_by("ping_percent_packet_loss", "name")
            .map_err(|e| e.to_string())?;

        for row in &mut self.rows {
            let rtt = rtt_by_iface.get(row.iface).copied().unwrap_or(9999.0);
            let loss = loss_by_iface.get(row.iface).copied().unwrap_or(100.0);
            row.led = most_critical([
                led_upper_threshold(loss, 5.0, 90.0),
                led_upper_threshold(rtt, row.warn_ms, row.crit_ms),
            ]);
            row.text = format!("{} {rtt:4.0} ms / {loss:4.0} %", row.name);
        }
        Ok(())
    }

    fn render_body(&mut self, shadow: &mut Shadow, _width: usize, _height: usize) {
        for row in &self.rows {
            let _ = shadow.set_line(row.idx, &row.text);
            let (r, g) = row.led.rgb();
            let _ = shadow.set_led(row.idx, r, g);
        }
    }
}

pub fn build(config: &PageConfig, metrics: Arc<dyn MetricsClient>) -> Box<dyn crate::page::Page> {
    let title = config.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    Box::new(crate::page::UpdatingPage::new(
        title,
        super::update_period(config),
        PingBody::new(metrics),
    ))
}
