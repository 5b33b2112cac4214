use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
// embedded-svc defines the MQTT traits and event payloads used across platforms.
use embedded_svc::mqtt::client::{EventPayload, QoS};
// esp-idf-svc provides the ESP-IDF backed MQTT client implementation and config.
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};

use smoke_detector::config::{MqttSettings, Topics};
use smoke_detector::error::PublishFault;
use smoke_detector::publish::{MessageId, Publisher};

use crate::wifi::ensure_connected;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A message the platform pushed to the device.
#[derive(Debug)]
pub struct Downlink {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct MqttLink {
    client: EspMqttClient<'static>,
    downlink_rx: Receiver<Downlink>,
    connected: Arc<AtomicBool>,
}

impl MqttLink {
    pub fn try_recv_downlink(&mut self) -> Option<Downlink> {
        self.downlink_rx.try_recv().ok()
    }
}

impl Publisher for MqttLink {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<MessageId, PublishFault> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(PublishFault::Disconnected);
        }
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| PublishFault::Rejected(e.to_string()))
    }
}

pub fn init_mqtt(
    wifi: &mut BlockingWifi<EspWifi<'static>>,
    settings: &MqttSettings,
    topics: &Topics,
) -> Result<MqttLink> {
    // Ensure Wi-Fi is connected before starting the MQTT client.
    ensure_connected(wifi)?;

    let url = settings.url();
    // Platform auth: device id as username, TLS against the bundled roots.
    let conf = MqttClientConfiguration {
        client_id: Some(settings.client_id),
        username: settings.username,
        password: settings.password,
        keep_alive_interval: Some(settings.keep_alive),
        network_timeout: Duration::from_secs(5),
        crt_bundle_attach: if settings.tls {
            Some(esp_idf_sys::esp_crt_bundle_attach)
        } else {
            None
        },
        ..Default::default()
    };

    let (mut client, mut conn) = EspMqttClient::new(&url, &conf)?;
    let (downlink_tx, downlink_rx) = mpsc::channel::<Downlink>();
    let (conn_tx, conn_rx) = mpsc::channel::<bool>();
    let connected = Arc::new(AtomicBool::new(false));
    let link_state = Arc::clone(&connected);

    // Event loop runs on a separate thread; it receives MQTT events from ESP-IDF.
    thread::spawn(move || loop {
        match conn.next() {
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => {
                    link_state.store(true, Ordering::Relaxed);
                    let _ = conn_tx.send(true);
                }
                EventPayload::Disconnected => {
                    link_state.store(false, Ordering::Relaxed);
                    warn!("MQTT disconnected");
                    let _ = conn_tx.send(false);
                }
                EventPayload::Received { topic, data, .. } => {
                    let downlink = Downlink {
                        topic: topic.unwrap_or_default().to_string(),
                        payload: data.to_vec(),
                    };
                    let _ = downlink_tx.send(downlink);
                }
                EventPayload::Error(e) => warn!("MQTT error: {:?}", e),
                _ => {}
            },
            Err(_) => {
                thread::sleep(Duration::from_millis(100));
            }
        }
    });

    // Wait for the broker connection before we subscribe.
    match conn_rx.recv_timeout(CONNECT_TIMEOUT) {
        Ok(true) => {}
        Ok(false) => return Err(anyhow!("MQTT disconnected during init")),
        Err(_) => return Err(anyhow!("MQTT connect timeout")),
    }

    for topic in topics.downlinks() {
        client.subscribe(topic, QoS::AtLeastOnce)?;
        info!("Subscribed to {}", topic);
    }

    info!("MQTT connected to {}", url);
    Ok(MqttLink {
        client,
        downlink_rx,
        connected,
    })
}
