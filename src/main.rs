use anyhow::Result;
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("atlas-ph-monitor starting");
    run()
}

#[cfg(target_os = "linux")]
fn run() -> Result<()> {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use log::error;

    use atlas_ph_monitor::atlas_ph::driver::{self, AtlasPhDriver};
    use atlas_ph_monitor::i2c::config::DeviceConfig;
    use atlas_ph_monitor::i2c::device::I2cDevice;
    use atlas_ph_monitor::i2c::linux::LinuxI2cBus;

    // 監視対象のバス番号と読み取り間隔
    const BUS_NUMBER: u8 = 1;
    const READ_INTERVAL: Duration = Duration::from_secs(10);

    let config = DeviceConfig::new("atlas-ph", BUS_NUMBER, driver::DEFAULT_ADDRESS);
    config.validate()?;

    let bus = Arc::new(Mutex::new(LinuxI2cBus::open(BUS_NUMBER)?));
    let device = I2cDevice::new(config, bus);
    let driver = AtlasPhDriver::new(device);

    loop {
        match driver.read_ph() {
            Ok(ph) => info!("pH: {:.3}", ph),
            Err(e) => error!("pH read failed: {}", e),
        }
        thread::sleep(READ_INTERVAL);
    }
}

#[cfg(not(target_os = "linux"))]
fn run() -> Result<()> {
    anyhow::bail!("the I2C bus backend requires a Linux host")
}
