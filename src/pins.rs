//! GPIO / peripheral pin assignments for the XIAO ESP32-C6 sender boards.
//!
//! Single source of truth — the hardware glue references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Fuel sender board
// ---------------------------------------------------------------------------

/// Fuel sender voltage divider — ADC1 channel 0 (GPIO 0 on the XIAO C6).
pub const FUEL_ADC_GPIO: i32 = 0;
/// ADC attenuation for the divider node (11 dB → 0 – 3.1 V range).
pub const FUEL_ADC_ATTEN: u32 = 3; // esp_idf_hal::adc::attenuation::DB_11

// ---------------------------------------------------------------------------
// Oil sender board — SPI bus (MAX31856 thermocouple converters)
// ---------------------------------------------------------------------------

pub const SPI_SCLK_GPIO: i32 = 19;
pub const SPI_MOSI_GPIO: i32 = 18;
pub const SPI_MISO_GPIO: i32 = 20;
/// Chip select, cylinder-head thermocouple converter.
pub const TC_HEAD_CS_GPIO: i32 = 17;
/// Chip select, oil thermocouple converter.
pub const TC_OIL_CS_GPIO: i32 = 16;

// ---------------------------------------------------------------------------
// Oil sender board — I2C bus (ADS1115 for the pressure sender)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 22;
pub const I2C_SCL_GPIO: i32 = 23;
/// ADS1115 address with ADDR strapped to GND.
pub const ADS1115_ADDR: u8 = 0x48;

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// SSD1306 status OLED, shares the I2C bus on both boards.
pub const OLED_ADDR: u8 = 0x3C;
