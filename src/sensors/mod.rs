//! Raw-reading boundary between the bus glue and the core.
//!
//! The physical bus drivers (ADC oneshot, MAX31856 SPI, ADS1115 I2C) are
//! thin glue that publishes each raw reading into a per-sensor atomic
//! cell; the core consumes the cells on its sampling cadence and owns all
//! numeric conversion from there. Host tests publish through the same
//! functions, so every conversion path is exercised without hardware.

pub mod fuel_level;
pub mod pressure;
pub mod thermocouple;
