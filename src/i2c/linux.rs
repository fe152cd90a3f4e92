/// Linux i2c-devバス実行器
///
/// このモジュールはI2Cデバイスドライバが存在するLinuxターゲットでのみ
/// 利用可能です。`/dev/i2c-N`を開き、組み立て済みトランザクションを
/// `I2C_RDWR` ioctlで一括実行します。
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;

use log::debug;

use super::transaction::{I2cRdwrData, Transaction};
use super::{BusError, BusExecutor, BusResult};

mod ffi {
    use crate::i2c::transaction::I2cRdwrData;

    // Linux i2c-devのマルチメッセージ転送ioctl
    nix::ioctl_write_ptr_bad!(i2c_rdwr, 0x0707, I2cRdwrData);
}

/// `/dev/i2c-N`上のバス実行器
pub struct LinuxI2cBus {
    bus: u8,
    file: File,
}

impl LinuxI2cBus {
    /// バスデバイスファイルを開きます
    pub fn open(bus: u8) -> BusResult<Self> {
        let path = format!("/dev/i2c-{}", bus);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| BusError::Open { path: path.clone(), source })?;

        debug!("opened {}", path);
        Ok(LinuxI2cBus { bus, file })
    }

    /// バス番号
    pub fn bus(&self) -> u8 {
        self.bus
    }
}

impl BusExecutor for LinuxI2cBus {
    fn submit(&mut self, transaction: &mut Transaction) -> BusResult<()> {
        if transaction.is_empty() {
            return Err(BusError::EmptyTransaction);
        }

        // カーネルはこの構造体を読み、読み取りメッセージのバッファへ
        // 直接書き込む。`raw_messages`のポインタは`transaction`の借用中
        // のみ有効。
        let mut msgs = transaction.raw_messages();
        let data = I2cRdwrData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };

        unsafe { ffi::i2c_rdwr(self.file.as_raw_fd(), &data) }.map_err(|errno| {
            BusError::Transfer {
                bus: self.bus,
                source: std::io::Error::from_raw_os_error(errno as i32),
            }
        })?;
        Ok(())
    }
}
