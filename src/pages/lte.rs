//! LTE modem signal quality and monthly data usage, rows 1-3.

use std::sync::Arc;

use crate::config::PageConfig;
use crate::metrics::MetricsClient;
use crate::page::UpdatingBody;
use crate::shadow::Shadow;
use crate::utils::{led_lower_threshold, led_upper_threshold, most_critical};

const DEFAULT_TITLE: &str = "LTE (MB)";
const BYTES_TO_MB: f64 = 1024.0 * 1024.0;
const DATA_LIMIT_MB: f64 = 2000.0;

#[derive(Default, Clone, Copy)]
struct Signal {
    rsrp: f64,
    rsrq: f64,
    rssi: f64,
    snr: f64,
    rx_mb: f64,
    tx_mb: f64,
}

pub struct LteBody {
    metrics: Arc<dyn MetricsClient>,
    signal: Option<Signal>,
}

impl LteBody {
    pub fn new(metrics: Arc<dyn MetricsClient>) -> Self {
        Self { metrics, signal: None }
    }
}

impl UpdatingBody for LteBody {
    fn update(&mut self) -> Result<(), String> {
        let rsrp = self
            .metrics
            .query_first_value("modem_signal_lte_rsrp")
            .map_err(|e| e.to_string())?;
        let rsrq = self
            .metrics
            .query_first_value("modem_signal_lte_rsrq")
            .map_err(|e| e.to_string())?;
        let rssi = self
            .metrics
            .query_first_value("modem_signal_lte_rssi")
            .map_err(|e| e.to_string())?;
        let snr = self
            .metrics
            .query_first_value("modem_signal_lte_snr")
            .map_err(|e| e.to_string())?;
        let rx_bytes = self
            .metrics
            .query_first_value(
                "increase(node_network_receive_bytes_total{device=\"wwan0\"}[30d])",
            )
            .map_err(|e| e.to_string())?;
        let tx_bytes = self
            .metrics
            .query_first_value(
                "increase(node_network_transmit_bytes_total{device=\"wwan0\"}[30d])",
            )
            .map_err(|e| e.to_string())?;

        self.signal = Some(Signal {
            rsrp,
            rsrq,
            rssi,
            snr,
            rx_mb: rx_bytes / BYTES_TO_MB,
            tx_mb: tx_bytes / BYTES_TO_MB,
        });
        Ok(())
    }

    fn render_body(&mut self, shadow: &mut Shadow, _width: usize, _height: usize) {
        let Some(signal) = self.signal else {
            let _ = shadow.set_line(1, "Loading...");
            return;
        };

        let led1 = most_critical([
            led_lower_threshold(signal.rsrp, -90.0, -100.0),
            led_lower_threshold(signal.rsrq, -15.0, -20.0),
        ]);
        let _ = shadow.set_line(1, &format!("RSRP {:4.0} / RSRQ {:3.0}", signal.rsrp, signal.rsrq));
        let _ = shadow.set_led(1, led1.rgb().0, led1.rgb().1);

        let led2 = most_critical([
            led_lower_threshold(signal.rssi, -75.0, -85.0),
            led_lower_threshold(signal.snr, 13.0, 0.0),
        ]);
        let _ = shadow.set_line(2, &format!("RSSI {:4.0} / SNR  {:3.0}", signal.rssi, signal.snr));
        let _ = shadow.set_led(2, led2.rgb().0, led2.rgb().1);

        let usage = signal.rx_mb + signal.tx_mb;
        let led3 = led_upper_threshold(usage, DATA_LIMIT_MB * 0.75, DATA_LIMIT_MB);
        let _ = shadow.set_line(3, &format!("RX  {:5.0} / TX {:5.0}", signal.rx_mb, signal.tx_mb));
        let _ = shadow.set_led(3, led3.rgb().0, led3.rgb().1);
    }
}

pub fn build(config: &PageConfig, metrics: Arc<dyn MetricsClient>) -> Box<dyn crate::page::Page> {
    let title = config.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    Box::new(crate::page::UpdatingPage::new(
        title,
        super::update_period(config),
        LteBody::new(metrics),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsError, QueryData, Series};

    struct StubMetrics {
        value: f64,
    }

    impl MetricsClient for StubMetrics {
        fn query(&self, _promql: &str) -> Result<QueryData, MetricsError> {
            Ok(QueryData {
                result: vec![Series {
                    metric: Default::default(),
                    value: (0.0, self.value.to_string()),
                }],
            })
        }
    }

    #[test]
    fn renders_loading_before_first_update() {
        let metrics: Arc<dyn MetricsClient> = Arc::new(StubMetrics { value: 0.0 });
        let mut body = LteBody::new(metrics);
        let mut shadow = Shadow::new(20, 4, 4);
        body.render_body(&mut shadow, 20, 4);
        assert!(shadow.cells()[20..40].starts_with(b"Loading..."));
    }

    #[test]
    fn update_populates_signal_and_renders() {
        let metrics: Arc<dyn MetricsClient> = Arc::new(StubMetrics { value: -50.0 });
        let mut body = LteBody::new(metrics);
        body.update().unwrap();
        let mut shadow = Shadow::new(20, 4, 4);
        body.render_body(&mut shadow, 20, 4);
        assert!(shadow.cells()[20..40].starts_with(b"RSRP"));
    }
}
