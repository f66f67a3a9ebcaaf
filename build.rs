fn main() {
    // The ESP-IDF environment is only needed for Xtensa firmware builds.
    // Host builds (tests, simulator) skip it entirely.
    let target = std::env::var("TARGET").unwrap_or_default();
    if target.contains("xtensa") {
        embuild::espidf::sysenv::output();
    }
}
