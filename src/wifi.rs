use anyhow::{anyhow, Result};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::info;

use smoke_detector::config::WifiSettings;

pub fn init_wifi(modem: Modem, settings: &WifiSettings) -> Result<BlockingWifi<EspWifi<'static>>> {
    if !settings.is_configured() {
        return Err(anyhow!("Wi-Fi settings have no SSID configured"));
    }
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;

    let auth_method = if settings.password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let ssid = settings
        .ssid
        .try_into()
        .map_err(|_| anyhow!("Wi-Fi SSID too long"))?;
    let password = settings
        .password
        .try_into()
        .map_err(|_| anyhow!("Wi-Fi password too long"))?;

    let cfg = Configuration::Client(ClientConfiguration {
        ssid,
        password,
        auth_method,
        ..Default::default()
    });

    wifi.set_configuration(&cfg)?;
    ensure_connected(&mut wifi)?;
    info!("Wi-Fi connected to {}", settings.ssid);

    Ok(wifi)
}

/// Bring the station back up if the link dropped between reports.
pub fn ensure_connected(wifi: &mut BlockingWifi<EspWifi<'static>>) -> Result<()> {
    if !wifi.is_started()? {
        wifi.start()?;
    }
    if !wifi.is_connected()? {
        wifi.connect()?;
    }
    wifi.wait_netif_up()?;
    Ok(())
}
