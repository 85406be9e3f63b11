//! UPS output power, battery runtime and line voltage, rows 1-3.

use std::sync::Arc;

use crate::config::PageConfig;
use crate::metrics::MetricsClient;
use crate::page::UpdatingBody;
use crate::shadow::Shadow;
use crate::utils::{led_lower_threshold, led_upper_threshold};

const DEFAULT_TITLE: &str = "UPS Power";
const FILTER: &str = "{hostname=\"ups-rack\"}";

#[derive(Clone, Copy)]
struct Reading {
    power_w: f64,
    apparent_power_va: f64,
    runtime_min: f64,
    capacity_percent: f64,
    input_voltage: f64,
    output_voltage: f64,
}

pub struct UpsPowerBody {
    metrics: Arc<dyn MetricsClient>,
    reading: Option<Reading>,
}

impl UpsPowerBody {
    pub fn new(metrics: Arc<dyn MetricsClient>) -> Self {
        Self { metrics, reading: None }
    }

    fn fetch(&self, metric: &str) -> Result<f64, String> {
        self.metrics
            .query_first_value(&format!("{metric}{FILTER}"))
            .map_err(|e| e.to_string())
    }
}

impl UpdatingBody for UpsPowerBody {
    fn update(&mut self) -> Result<(), String> {
        let power_w = self.fetch("snmp_upsAdvOutputActivePower")?;
        let apparent_power_va = self.fetch("snmp_upsAdvOutputApparentPower")?;
        let runtime_min = self.fetch("snmp_upsAdvBatteryRunTimeRemaining")? / 6000.0;
        let capacity_percent = self.fetch("snmp_upsHighPrecBatteryCapacity")?;
        let input_voltage = self.fetch("snmp_upsHighPrecInputLineVoltage")?;
        let output_voltage = self.fetch("snmp_upsHighPrecOutputVoltage")?;

        self.reading = Some(Reading {
            power_w,
            apparent_power_va,
            runtime_min,
            capacity_percent,
            input_voltage,
            output_voltage,
        });
        Ok(())
    }

    fn render_body(&mut self, shadow: &mut Shadow, _width: usize, _height: usize) {
        let Some(reading) = self.reading else {
            let _ = shadow.set_line(1, "Loading...");
            return;
        };

        let _ = shadow.set_line(
            1,
            &format!("PWR {:4.0} W / {:4.0} VA", reading.power_w, reading.apparent_power_va),
        );
        let led1 = led_upper_threshold(reading.power_w, 800.0, 1000.0);
        let _ = shadow.set_led(1, led1.rgb().0, led1.rgb().1);

        let _ = shadow.set_line(
            2,
            &format!("BAT {:4.0} m / {:4.0} %", reading.runtime_min, reading.capacity_percent),
        );
        let led2 = led_lower_threshold(reading.runtime_min, 15.0, 5.0);
        let _ = shadow.set_led(2, led2.rgb().0, led2.rgb().1);

        let _ = shadow.set_line(
            3,
            &format!("VIO {:4.0} V / {:4.0} V", reading.input_voltage, reading.output_voltage),
        );
        let led3 = led_lower_threshold(reading.input_voltage, 100.0, 80.0);
        let _ = shadow.set_led(3, led3.rgb().0, led3.rgb().1);
    }
}

pub fn build(config: &PageConfig, metrics: Arc<dyn MetricsClient>) -> Box<dyn crate::page::Page> {
    let title = config.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    Box::new(crate::page::UpdatingPage::new(
        title,
        super::update_period(config),
        UpsPowerBody::new(metrics),
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
    fn low_runtime_trips_warning_led() {
        let metrics: Arc<dyn MetricsClient> = Arc::new(StubMetrics { value: 10.0 });
        let mut body = UpsPowerBody::new(metrics);
        body.update().unwrap();
        let reading = body.reading.unwrap();
        assert!((reading.runtime_min - 10.0 / 6000.0).abs() < 1e-9);
    }

    #[test]
    fn renders_loading_before_first_update() {
        let metrics: Arc<dyn MetricsClient> = Arc::new(StubMetrics { value: 0.0 });
        let mut body = UpsPowerBody::new(metrics);
        let mut shadow = Shadow::new(20, 4, 4);
        body.render_body(&mut shadow, 20, 4);
        assert!(shadow.cells()[20..40].starts_with(b"Loading..."));
    }
}
