//! NTP synchronisation health: estimated error, frequency adjustment,
//! stratum and sanity, rows 1-3.

use std::sync::Arc;

use crate::config::PageConfig;
use crate::metrics::MetricsClient;
use crate::page::UpdatingBody;
use crate::shadow::Shadow;
use crate::utils::{led_upper_threshold, LedColorPreset};

const DEFAULT_TITLE: &str = "NTP";

#[derive(Clone, Copy)]
struct Status {
    estimated_error_s: f64,
    ppm_adjustment: f64,
    stratum: f64,
    sanity_percent: f64,
}

pub struct NtpBody {
    metrics: Arc<dyn MetricsClient>,
    status: Option<Status>,
}

impl NtpBody {
    pub fn new(metrics: Arc<dyn MetricsClient>) -> Self {
        Self { metrics, status: None }
    }
}

impl UpdatingBody for NtpBody {
    fn update(&mut self) -> Result<(), String> {
        let estimated_error_s = self
            .metrics
            .query_first_value("node_timex_estimated_error_seconds")
            .map_err(|e| e.to_string())?;
        let ppm_adjustment = self
            .metrics
            .query_first_value("(node_timex_frequency_adjustment_ratio - 1) * 1000000")
            .map_err(|e| e.to_string())?;
        let stratum = self
            .metrics
            .query_first_value("node_ntp_stratum")
            .map_err(|e| e.to_string())?;
        let sanity = self
            .metrics
            .query_first_value("node_ntp_sanity")
            .map_err(|e| e.to_string())?;

        self.status = Some(Status {
            estimated_error_s,
            ppm_adjustment,
            stratum,
            sanity_percent: sanity * 100.0,
        });
        Ok(())
    }

    fn render_body(&mut self, shadow: &mut Shadow, _width: usize, _height: usize) {
        let Some(status) = self.status else {
            let _ = shadow.set_line(1, "Loading...");
            return;
        };

        let estimated_error_ms = status.estimated_error_s * 1_000.0;
        let _ = shadow.set_line(1, &format!("Err {estimated_error_ms:12.6} ms"));
        let led1 = led_upper_threshold(estimated_error_ms, 0.001, 1.0);
        let _ = shadow.set_led(1, led1.rgb().0, led1.rgb().1);

        let _ = shadow.set_line(2, &format!("Adj {:12.6} ppm", status.ppm_adjustment));
        let led2 = led_upper_threshold(status.ppm_adjustment.abs(), 20.0, 100.0);
        let _ = shadow.set_led(2, led2.rgb().0, led2.rgb().1);

        let _ = shadow.set_line(
            3,
            &format!("Str {:2.0}    /  San {:3.0}", status.stratum, status.sanity_percent),
        );
        let mut led3 = LedColorPreset::Normal;
        if status.stratum != 1.0 {
            led3 = LedColorPreset::Warning;
        }
        if status.sanity_percent < 100.0 {
            led3 = LedColorPreset::Critical;
        }
        let _ = shadow.set_led(3, led3.rgb().0, led3.rgb().1);
    }
}

pub fn build(config: &PageConfig, metrics: Arc<dyn MetricsClient>) -> Box<dyn crate::page::Page> {
    let title = config.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    Box::new(crate::page::UpdatingPage::new(
        title,
        super::update_period(config),
        NtpBody::new(metrics),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsError, QueryData, Series};

    struct StubMetrics {
        values: Vec<f64>,
    }

    impl MetricsClient for StubMetrics {
        fn query(&self, promql: &str) -> Result<QueryData, MetricsError> {
            let value = if promql.contains("estimated_error") {
                self.values[0]
            } else if promql.contains("frequency_adjustment") {
                self.values[1]
            } else if promql.contains("stratum") {
                self.values[2]
            } else {
                self.values[3]
            };
            Ok(QueryData {
                result: vec![Series {
                    metric: Default::default(),
                    value: (0.0, value.to_string()),
                }],
            })
        }
    }

    #[test]
    fn good_sync_is_all_normal() {
        let metrics: Arc<dyn MetricsClient> = Arc::new(StubMetrics {
            values: vec![0.0000001, 0.0, 1.0, 1.0],
        });
        let mut body = NtpBody::new(metrics);
        body.update().unwrap();
        let status = body.status.unwrap();
        assert_eq!(status.stratum, 1.0);
        assert_eq!(status.sanity_percent, 100.0);
    }

    #[test]
    fn stratum_drift_downgrades_led_to_warning_and_bad_sanity_to_critical() {
        let metrics: Arc<dyn MetricsClient> = Arc::new(StubMetrics {
            values: vec![0.0, 0.0, 2.0, 0.5],
        });
        let mut body = NtpBody::new(metrics);
        body.update().unwrap();
        let mut shadow = Shadow::new(20, 4, 4);
        body.render_body(&mut shadow, 20, 4);
        assert!(shadow.cells()[60..80].starts_with(b"Str"));
    }
}
