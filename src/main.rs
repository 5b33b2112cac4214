// main.rs
// Smoke / air-quality detector firmware.
//
// I2C0 (SDA=GPIO18, SCL=GPIO19) at 100 kHz carries every sensor:
//   AHT21 0x38, BMP280 0x76/0x77, ENS160 0x52, ADS1115 0x49 (MQ-2 on AIN0)
// Buzzer: GPIO4, active-low.
//
// Boot: sensors, warm-up, self-test, Wi-Fi, MQTT. Then a windowed report
// every REPORT interval; any downlink sounds the buzzer.

#[cfg(target_os = "espidf")]
mod mqtt;
#[cfg(target_os = "espidf")]
mod wifi;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::time::{Duration, Instant};

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::gpio::PinDriver;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::log::EspLogger;
    use esp_idf_sys as sys;
    use log::{error, info, warn};

    use smoke_detector::ads1115::{Ads1115, Gain, ADS1115_ADDR};
    use smoke_detector::alarm::{ActiveLevel, Alarm};
    use smoke_detector::bus::SharedBus;
    use smoke_detector::monitor::Monitor;
    use smoke_detector::{Collector, Config};

    const MQ2_CHANNEL: u8 = 0;
    const LOOP_TICK: Duration = Duration::from_millis(200);

    sys::link_patches();
    EspLogger::initialize_default();

    let config = Config::from_env();
    info!("Device {} starting", config.device_id);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let i2c_cfg = I2cConfig::new().baudrate(100.kHz().into());
    let i2c = I2cDriver::new(peripherals.i2c0, pins.gpio18, pins.gpio19, &i2c_cfg)?;
    let bus = SharedBus::new(i2c);
    bus.scan();

    let adc = Ads1115::new(bus.clone(), ADS1115_ADDR, MQ2_CHANNEL, Gain::TwoThirds);
    let collector = Collector::new(bus, adc, FreeRtos, config.sampling.clone());
    let alarm = Alarm::new(PinDriver::output(pins.gpio4)?, ActiveLevel::Low)?;

    let mut monitor = Monitor::new(collector, alarm, config.clone());
    monitor.bootstrap()?;

    let mut wifi = wifi::init_wifi(peripherals.modem, &config.wifi)?;
    let mut link = mqtt::init_mqtt(&mut wifi, &config.mqtt, monitor.topics())?;

    let mut last_report: Option<Instant> = None;
    loop {
        while let Some(downlink) = link.try_recv_downlink() {
            if let Err(e) = monitor.on_downlink(&downlink.topic, &downlink.payload) {
                error!("Alarm trigger failed: {}", e);
            }
        }

        if last_report.map_or(true, |t| t.elapsed() >= config.report_interval) {
            if let Err(e) = wifi::ensure_connected(&mut wifi) {
                warn!("Wi-Fi reconnect failed: {:?}", e);
            }
            if let Err(e) = monitor.report(&mut link) {
                error!("Report failed: {}", e);
            }
            last_report = Some(Instant::now());
        }

        std::thread::sleep(LOOP_TICK);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("smoke-detector firmware runs on ESP-IDF targets only; the library is host-testable")
}
