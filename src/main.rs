//! CarMon sender firmware — main entry point.
//!
//! One binary per sender board, selected at build time:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │  NvsAdapter     EspNowTransport    MonotonicClock        │
//! │  (StoragePort)  (TransportPort)    (TimePort)            │
//! │  console parser · ADC / SPI / I2C glue (this file)       │
//! │                                                          │
//! │  ───────────── Port Trait Boundary ─────────────         │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │  FuelNode / OilNode (pure logic)               │      │
//! │  │  conditioning · fault vote · calibration       │      │
//! │  └────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Only built with the `espidf` feature; host testing goes through the
//! library crate.
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::mpsc;

use carmon::adapters::console;
use carmon::adapters::espnow::{EspNowTransport, DISPLAY_PEER_MAC};
use carmon::adapters::nvs::NvsAdapter;
use carmon::adapters::time::MonotonicClock;
use carmon::ports::TimePort;

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("CarMon sender v{}", env!("CARGO_PKG_VERSION"));

    let nvs = NvsAdapter::new().context("NVS init")?;
    let clock = MonotonicClock::new();

    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;

    // ESP-NOW rides on a started Wi-Fi station; no AP association needed.
    let sysloop = esp_idf_svc::eventloop::EspSystemEventLoop::take()?;
    let mut wifi = esp_idf_svc::wifi::EspWifi::new(peripherals.modem, sysloop, None)?;
    wifi.set_configuration(&esp_idf_svc::wifi::Configuration::Client(
        esp_idf_svc::wifi::ClientConfiguration::default(),
    ))?;
    wifi.start()?;
    let mut transport = EspNowTransport::new(DISPLAY_PEER_MAC)?;

    // Serial console: a thread blocks on stdin and feeds complete lines to
    // the control loop, which never blocks.
    let lines = spawn_console_reader();

    #[cfg(feature = "node-oil")]
    {
        // Pin routing matches `pins.rs` for the oil sender board.
        let bus = hw::OilBus::new(
            peripherals.spi2,
            peripherals.pins.gpio19.into(),
            peripherals.pins.gpio18.into(),
            peripherals.pins.gpio20.into(),
            peripherals.pins.gpio17.into(),
            peripherals.pins.gpio16.into(),
            peripherals.i2c0,
            peripherals.pins.gpio22.into(),
            peripherals.pins.gpio23.into(),
        )?;
        run_oil(nvs, clock, &mut transport, lines, bus)
    }
    #[cfg(not(feature = "node-oil"))]
    {
        let adc = hw::FuelAdc::new()?;
        run_fuel(nvs, clock, &mut transport, lines, adc)
    }
}

fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(4096)
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                use std::io::BufRead;
                if stdin.lock().read_line(&mut line).is_err() {
                    return;
                }
                if tx.send(line.trim_end().to_owned()).is_err() {
                    return;
                }
            }
        })
        .ok();
    rx
}

#[cfg(not(feature = "node-oil"))]
fn run_fuel(
    nvs: NvsAdapter,
    clock: MonotonicClock,
    transport: &mut EspNowTransport,
    lines: mpsc::Receiver<String>,
    mut adc: hw::FuelAdc,
) -> Result<()> {
    use carmon::config::FuelConfig;
    use carmon::node::FuelNode;

    let mut node = FuelNode::new(FuelConfig::default(), nvs);
    println!("{}", console::MENU);
    info!("fuel node ready, entering control loop");

    loop {
        adc.poll();

        while let Ok(line) = lines.try_recv() {
            match console::parse_line(&line) {
                Some(cmd) => match node.handle_command(cmd) {
                    Ok(Some(event)) => print_session_event(&event),
                    Ok(None) => {}
                    Err(e) => warn!("console command failed: {e}"),
                },
                None => println!("{}", console::MENU),
            }
        }

        match node.tick(clock.now_ms(), transport) {
            Ok(Some(event)) => print_session_event(&event),
            Ok(None) => {}
            Err(e) => warn!("tick failed: {e}"),
        }

        esp_idf_hal::delay::FreeRtos::delay_ms(20);
    }
}

/// Render a calibration session event on the operator's console.
#[cfg(not(feature = "node-oil"))]
fn print_session_event(event: &carmon::calibration::SessionEvent) {
    use carmon::calibration::SessionEvent;
    match event {
        SessionEvent::AwaitingReference { point, nominal_ohms } => {
            println!(
                "position the sender at {point:?} (nominal {nominal_ohms:.1} ohms), then press ENTER"
            );
        }
        SessionEvent::SamplingProgress { taken, target } => {
            println!("sampling {taken}/{target}");
        }
        SessionEvent::OffsetComputed {
            point,
            measured_ohms,
            offset_ohms,
        } => {
            println!(
                "{point:?}: measured {measured_ohms:.2} ohms, offset {offset_ohms:+.2} ohms"
            );
        }
        SessionEvent::Committed(record) => println!("calibration saved: {record:?}"),
        SessionEvent::Aborted => println!("calibration aborted, nothing saved"),
    }
}

#[cfg(feature = "node-oil")]
fn run_oil(
    nvs: NvsAdapter,
    clock: MonotonicClock,
    transport: &mut EspNowTransport,
    lines: mpsc::Receiver<String>,
    mut bus: hw::OilBus,
) -> Result<()> {
    use carmon::config::OilConfig;
    use carmon::node::OilNode;

    let mut node = OilNode::new(OilConfig::default(), nvs);
    println!("{}", console::OIL_MENU);
    info!("oil node ready, entering control loop");

    loop {
        bus.poll();

        // The oil node has no interactive calibration session; offsets and
        // alarm limits arrive as direct adjustments over the console.
        while let Ok(line) = lines.try_recv() {
            match console::parse_oil_line(&line) {
                Some(cmd) => {
                    if let Err(e) = node.handle_command(cmd) {
                        warn!("console command failed: {e}");
                    }
                }
                None => println!("{}", console::OIL_MENU),
            }
        }

        if let Err(e) = node.tick(clock.now_ms(), transport) {
            warn!("tick failed: {e}");
        }

        esp_idf_hal::delay::FreeRtos::delay_ms(20);
    }
}

/// Hardware glue: owns the bus drivers and publishes raw conversions into
/// the sensor cells. Read failures publish as failures rather than stale
/// values, so the domain sees NaN instead of a frozen reading.
#[cfg(target_os = "espidf")]
mod hw {
    use anyhow::Result;
    use carmon::pins;
    #[cfg(not(feature = "node-oil"))]
    use carmon::sensors::fuel_level;
    #[cfg(not(feature = "node-oil"))]
    use log::warn;

    #[cfg(not(feature = "node-oil"))]
    pub struct FuelAdc {
        // Sole owner of ADC1 channel 0 after init.
        handle: esp_idf_svc::sys::adc_oneshot_unit_handle_t,
    }

    #[cfg(not(feature = "node-oil"))]
    impl FuelAdc {
        pub fn new() -> Result<Self> {
            use esp_idf_svc::sys::*;
            let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
            // SAFETY: one-shot unit init, called once from main.
            unsafe {
                let unit_cfg = adc_oneshot_unit_init_cfg_t {
                    unit_id: adc_unit_t_ADC_UNIT_1,
                    ..core::mem::zeroed()
                };
                esp!(adc_oneshot_new_unit(&unit_cfg, &mut handle))?;
                let chan_cfg = adc_oneshot_chan_cfg_t {
                    atten: pins::FUEL_ADC_ATTEN,
                    bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
                };
                esp!(adc_oneshot_config_channel(
                    handle,
                    pins::FUEL_ADC_GPIO as adc_channel_t,
                    &chan_cfg
                ))?;
            }
            Ok(Self { handle })
        }

        pub fn poll(&mut self) {
            use esp_idf_svc::sys::*;
            let mut raw: i32 = 0;
            // SAFETY: handle valid for the lifetime of self.
            let ret = unsafe {
                adc_oneshot_read(self.handle, pins::FUEL_ADC_GPIO as adc_channel_t, &mut raw)
            };
            if ret == ESP_OK {
                fuel_level::publish_raw(raw.clamp(0, 4095) as u16);
            } else {
                warn!("fuel ADC read failed ({ret})");
                fuel_level::publish_read_failure();
            }
        }
    }

    #[cfg(feature = "node-oil")]
    pub use oil_bus::OilBus;

    #[cfg(feature = "node-oil")]
    mod oil_bus {
        use anyhow::Result;
        use carmon::pins;
        use carmon::sensors::{pressure, thermocouple, thermocouple::Channel};
        use esp_idf_hal::delay::BLOCK;
        use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Output, PinDriver};
        use esp_idf_hal::i2c::{I2c, I2cConfig, I2cDriver};
        use esp_idf_hal::peripheral::Peripheral;
        use esp_idf_hal::spi::{config, SpiAnyPins, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
        use esp_idf_hal::units::Hertz;

        // MAX31856 register map (read address; writes OR in 0x80).
        const REG_CR0: u8 = 0x00;
        const REG_CR1: u8 = 0x01;
        const REG_CJTH: u8 = 0x0A;
        const CR0_AUTO_CONVERT: u8 = 0x80;
        const CR1_TYPE_K: u8 = 0x03;

        pub struct OilBus {
            spi: SpiDeviceDriver<'static, SpiDriver<'static>>,
            head_cs: PinDriver<'static, AnyOutputPin, Output>,
            oil_cs: PinDriver<'static, AnyOutputPin, Output>,
            i2c: I2cDriver<'static>,
        }

        impl OilBus {
            #[allow(clippy::too_many_arguments)]
            pub fn new(
                spi: impl Peripheral<P = impl SpiAnyPins> + 'static,
                sclk: AnyOutputPin,
                mosi: AnyOutputPin,
                miso: AnyInputPin,
                head_cs: AnyOutputPin,
                oil_cs: AnyOutputPin,
                i2c: impl Peripheral<P = impl I2c> + 'static,
                sda: AnyIOPin,
                scl: AnyIOPin,
            ) -> Result<Self> {
                let driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &SpiDriverConfig::new())?;
                // CS is driven manually so two converters share the device.
                let spi = SpiDeviceDriver::new(
                    driver,
                    Option::<AnyOutputPin>::None,
                    &config::Config::new()
                        .baudrate(Hertz(2_000_000))
                        .data_mode(config::MODE_1),
                )?;
                let mut head_cs = PinDriver::output(head_cs)?;
                let mut oil_cs = PinDriver::output(oil_cs)?;
                head_cs.set_high()?;
                oil_cs.set_high()?;

                let i2c = I2cDriver::new(i2c, sda, scl, &I2cConfig::new().baudrate(Hertz(100_000)))?;

                let mut bus = Self {
                    spi,
                    head_cs,
                    oil_cs,
                    i2c,
                };
                for channel in [Channel::Head, Channel::Oil] {
                    bus.write_reg(channel, REG_CR1, CR1_TYPE_K)?;
                    bus.write_reg(channel, REG_CR0, CR0_AUTO_CONVERT)?;
                }
                // ADS1115: AIN0 single-ended, ±4.096 V, continuous, 128 SPS.
                bus.i2c
                    .write(pins::ADS1115_ADDR, &[0x01, 0x42, 0x83], BLOCK)?;
                Ok(bus)
            }

            pub fn poll(&mut self) {
                for channel in [Channel::Head, Channel::Oil] {
                    match self.read_max31856(channel) {
                        Ok((temp_c, cj_c, fault)) => {
                            thermocouple::publish(channel, temp_c, cj_c, fault)
                        }
                        Err(_) => thermocouple::publish_read_failure(channel),
                    }
                }
                match self.read_ads1115_volts() {
                    Ok(v) => pressure::publish_volts(v),
                    Err(_) => pressure::publish_read_failure(),
                }
            }

            fn write_reg(&mut self, channel: Channel, reg: u8, value: u8) -> Result<()> {
                let cs = match channel {
                    Channel::Head => &mut self.head_cs,
                    Channel::Oil => &mut self.oil_cs,
                };
                cs.set_low()?;
                let res = self.spi.write(&[reg | 0x80, value]);
                cs.set_high()?;
                res?;
                Ok(())
            }

            /// Burst-read CJTH..SR (0x0A–0x0F) in one transaction.
            fn read_max31856(&mut self, channel: Channel) -> Result<(f32, f32, u8)> {
                let tx = [REG_CJTH, 0, 0, 0, 0, 0, 0];
                let mut rx = [0u8; 7];
                let cs = match channel {
                    Channel::Head => &mut self.head_cs,
                    Channel::Oil => &mut self.oil_cs,
                };
                cs.set_low()?;
                let res = self.spi.transfer(&mut rx, &tx);
                cs.set_high()?;
                res?;

                // rx[0] clocks out during the address byte.
                let cj_raw = i16::from_be_bytes([rx[1], rx[2]]) >> 2;
                let cj_c = f32::from(cj_raw) * 0.015625;
                // 19-bit linearized thermocouple value, left-justified.
                let tc_raw = ((i32::from(rx[3]) << 24)
                    | (i32::from(rx[4]) << 16)
                    | (i32::from(rx[5]) << 8))
                    >> 13;
                let temp_c = tc_raw as f32 * 0.0078125;
                let fault = rx[6];
                Ok((temp_c, cj_c, fault))
            }

            fn read_ads1115_volts(&mut self) -> Result<f32> {
                let mut buf = [0u8; 2];
                self.i2c
                    .write_read(pins::ADS1115_ADDR, &[0x00], &mut buf, BLOCK)?;
                let raw = i16::from_be_bytes(buf);
                Ok(f32::from(raw) * 4.096 / 32768.0)
            }
        }
    }
}
