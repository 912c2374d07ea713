fn main() {
    println!("cargo:rerun-if-env-changed=RELAYNODE_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=RELAYNODE_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=RELAYNODE_BACKEND_URI");
    println!("cargo:rerun-if-env-changed=RELAYNODE_DEVICE_SECRET");

    // Host builds (tests, fuzzing) have no ESP-IDF environment to export.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
