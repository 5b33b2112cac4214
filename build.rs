fn main() {
    // Only the firmware build has ESP-IDF args to propagate; host builds run the tests.
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "espidf" {
        if let Err(err) = embuild::build::LinkArgs::output_propagated("ESP_IDF") {
            println!("cargo:warning=esp-idf link args not propagated: {err}");
        }
        if let Err(err) = embuild::build::CfgArgs::output_propagated("ESP_IDF") {
            println!("cargo:warning=esp-idf cfg args not propagated: {err}");
        }
    }

    for var in [
        "WIFI_SSID",
        "WIFI_PASS",
        "MQTT_HOST",
        "MQTT_PORT",
        "MQTT_USER",
        "MQTT_PASS",
        "MQTT_CLIENT_ID",
        "DEVICE_ID",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }
}
