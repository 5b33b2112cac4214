use std::time::Duration;

use crate::codec::SEA_LEVEL_HPA;

const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(v) => v,
    None => "YOUR_WIFI_SSID",
};
const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(v) => v,
    None => "",
};
const MQTT_HOST: &str = match option_env!("MQTT_HOST") {
    Some(v) => v,
    None => "broker.local",
};
const MQTT_PORT_DEFAULT: u16 = 8883;
const MQTT_PORT_ENV: Option<&str> = option_env!("MQTT_PORT");
const MQTT_USER: Option<&str> = match option_env!("MQTT_USER") {
    Some(v) if !v.is_empty() => Some(v),
    _ => None,
};
const MQTT_PASS: Option<&str> = match option_env!("MQTT_PASS") {
    Some(v) if !v.is_empty() => Some(v),
    _ => None,
};
const MQTT_CLIENT_ID: &str = match option_env!("MQTT_CLIENT_ID") {
    Some(v) => v,
    None => "SmokeDetector_001_0_0",
};
const DEVICE_ID: &str = match option_env!("DEVICE_ID") {
    Some(v) => v,
    None => "SmokeDetector_001",
};

#[derive(Debug, Clone, PartialEq)]
pub struct WifiSettings {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl WifiSettings {
    pub fn is_configured(&self) -> bool {
        self.ssid != "YOUR_WIFI_SSID" && !self.ssid.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: &'static str,
    pub port: u16,
    pub client_id: &'static str,
    /// Falls back to the device id, which is what the platform expects.
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
    pub keep_alive: Duration,
    pub tls: bool,
}

impl MqttSettings {
    pub fn url(&self) -> String {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub samples_per_report: usize,
    pub sample_interval: Duration,
    pub self_test_samples: usize,
    pub self_test_interval: Duration,
    pub warmup: Duration,
    pub sea_level_hpa: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples_per_report: 10,
            sample_interval: Duration::from_secs(1),
            self_test_samples: 3,
            self_test_interval: Duration::from_millis(500),
            warmup: Duration::from_secs(10),
            sea_level_hpa: SEA_LEVEL_HPA,
        }
    }
}

/// Platform topics for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub report: String,
    pub commands: String,
    pub messages: String,
    pub property_set: String,
}

impl Topics {
    pub fn for_device(device_id: &str) -> Self {
        let base = format!("$oc/devices/{}/sys", device_id);
        Self {
            report: format!("{}/properties/report", base),
            commands: format!("{}/commands/#", base),
            messages: format!("{}/messages/down", base),
            property_set: format!("{}/properties/set/#", base),
        }
    }

    /// Everything the device listens on.
    pub fn downlinks(&self) -> [&str; 3] {
        [
            self.commands.as_str(),
            self.messages.as_str(),
            self.property_set.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device_id: &'static str,
    pub wifi: WifiSettings,
    pub mqtt: MqttSettings,
    pub sampling: SamplingConfig,
    pub report_interval: Duration,
    pub alarm_duration: Duration,
}

impl Config {
    /// Values baked in at build time.
    pub fn from_env() -> Self {
        let port = MQTT_PORT_ENV
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(MQTT_PORT_DEFAULT);
        Self {
            device_id: DEVICE_ID,
            wifi: WifiSettings {
                ssid: WIFI_SSID,
                password: WIFI_PASS,
            },
            mqtt: MqttSettings {
                host: MQTT_HOST,
                port,
                client_id: MQTT_CLIENT_ID,
                username: MQTT_USER.or(Some(DEVICE_ID)),
                password: MQTT_PASS,
                keep_alive: Duration::from_secs(60),
                tls: true,
            },
            sampling: SamplingConfig::default(),
            report_interval: Duration::from_secs(30),
            alarm_duration: Duration::from_secs(60),
        }
    }

    pub fn topics(&self) -> Topics {
        Topics::for_device(self.device_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
