fn main() {
    // Propagates the ESP-IDF build environment when cross-compiling for the
    // XIAO ESP32-C6 target. A no-op on host builds where no IDF env exists.
    embuild::espidf::sysenv::output();
}
