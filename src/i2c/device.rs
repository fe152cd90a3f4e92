/// 共有バス上のデバイスハンドル
///
/// バス実行器は`Arc<Mutex<_>>`でバス単位に共有される。ロックは
/// マルチプレクサ選択とゲート対象操作の両方に跨って保持され、
/// 同一マルチプレクサを共有する他デバイスとの競合をここで直列化する。
use std::sync::{Arc, Mutex};

use log::warn;

use super::config::{DeviceConfig, MuxFailurePolicy};
use super::mux::{self, GatedOperation};
use super::transaction::Transaction;
use super::{BusExecutor, BusResult, I2cError, I2cResult};

/// 書き込み/読み取り操作の既定リトライ回数
pub const TRANSFER_DEFAULT_RETRY: u32 = 3;

/// 共有バス上のI2Cデバイスハンドル
pub struct I2cDevice<B: BusExecutor> {
    config: DeviceConfig,
    bus: Arc<Mutex<B>>,
}

impl<B: BusExecutor> I2cDevice<B> {
    /// デバイスハンドルを作成します
    pub fn new(config: DeviceConfig, bus: Arc<Mutex<B>>) -> Self {
        I2cDevice { config, bus }
    }

    /// 論理デバイス名
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// デバイス設定への参照
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// ゲート付きで操作を実行します
    ///
    /// マルチプレクサ設定があれば、解決したリトライ回数でチャンネル
    /// 選択を行ってから操作本体を実行する。選択と操作本体は1つの
    /// クリティカルセクションとして同一ロック下で行われる。
    /// 選択失敗時の扱いは`DeviceConfig::mux_failure`に従う。
    pub fn run<O: GatedOperation>(&self, op: O, retry: Option<u32>) -> I2cResult<O::Output> {
        let mut bus = self.bus.lock().unwrap();

        if let (Some(mux_addr), Some(channel)) = (self.config.mux, self.config.channel) {
            let resolved = mux::resolve_retry(retry, op.default_retry());
            if let Err(e) = mux::select_channel(&mut *bus, mux_addr, channel, resolved) {
                match self.config.mux_failure {
                    MuxFailurePolicy::Abort => return Err(e.into()),
                    MuxFailurePolicy::Proceed => {
                        warn!("{}: proceeding after mux select failure: {}", self.config.name, e);
                    }
                }
            }
        }

        op.execute(&mut *bus).map_err(I2cError::from)
    }

    /// バイト列をデバイスへ書き込みます
    pub fn write(&self, bytes: &[u8]) -> I2cResult<()> {
        self.run(WriteOp { addr: self.config.address, bytes }, None)
    }

    /// 明示リトライ指定付きの書き込み
    pub fn write_with_retry(&self, bytes: &[u8], retry: u32) -> I2cResult<()> {
        self.run(WriteOp { addr: self.config.address, bytes }, Some(retry))
    }

    /// デバイスから`len`バイトを読み取ります
    pub fn read(&self, len: usize) -> I2cResult<Vec<u8>> {
        self.run(ReadOp { addr: self.config.address, len }, None)
    }

    /// 明示リトライ指定付きの読み取り
    pub fn read_with_retry(&self, len: usize, retry: u32) -> I2cResult<Vec<u8>> {
        self.run(ReadOp { addr: self.config.address, len }, Some(retry))
    }

    /// 書き込みと読み取りを単一トランザクションで行います
    ///
    /// 同一トランザクション内のwrite-readペアを要求するデバイス向け。
    pub fn write_read(&self, bytes: &[u8], read_len: usize) -> I2cResult<Vec<u8>> {
        self.run(WriteReadOp { addr: self.config.address, bytes, read_len }, None)
    }

    /// 明示リトライ指定付きのwrite-readペア
    pub fn write_read_with_retry(&self, bytes: &[u8], read_len: usize, retry: u32) -> I2cResult<Vec<u8>> {
        self.run(WriteReadOp { addr: self.config.address, bytes, read_len }, Some(retry))
    }
}

/// 単発書き込み操作
struct WriteOp<'a> {
    addr: u16,
    bytes: &'a [u8],
}

impl GatedOperation for WriteOp<'_> {
    type Output = ();

    fn default_retry(&self) -> Option<u32> {
        Some(TRANSFER_DEFAULT_RETRY)
    }

    fn execute(self, bus: &mut dyn BusExecutor) -> BusResult<()> {
        let mut txn = Transaction::write(self.addr, self.bytes);
        bus.submit(&mut txn)
    }
}

/// 単発読み取り操作
struct ReadOp {
    addr: u16,
    len: usize,
}

impl GatedOperation for ReadOp {
    type Output = Vec<u8>;

    fn default_retry(&self) -> Option<u32> {
        Some(TRANSFER_DEFAULT_RETRY)
    }

    fn execute(self, bus: &mut dyn BusExecutor) -> BusResult<Vec<u8>> {
        let mut txn = Transaction::read(self.addr, self.len);
        bus.submit(&mut txn)?;
        Ok(txn.messages()[0].bytes().to_vec())
    }
}

/// write-readペア操作。既定リトライは宣言しない。
struct WriteReadOp<'a> {
    addr: u16,
    bytes: &'a [u8],
    read_len: usize,
}

impl GatedOperation for WriteReadOp<'_> {
    type Output = Vec<u8>;

    fn execute(self, bus: &mut dyn BusExecutor) -> BusResult<Vec<u8>> {
        let mut txn = Transaction::write_read(self.addr, self.bytes, self.read_len);
        bus.submit(&mut txn)?;
        Ok(txn.messages()[1].bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::mock::MockI2cBus;

    fn device(mock: &MockI2cBus, config: DeviceConfig) -> I2cDevice<MockI2cBus> {
        I2cDevice::new(config, Arc::new(Mutex::new(mock.clone())))
    }

    #[test]
    fn test_write_goes_to_device_address() {
        let mock = MockI2cBus::new();
        let dev = device(&mock, DeviceConfig::new("dev", 1, 0x63));

        dev.write(&[0x52]).unwrap();

        assert_eq!(mock.writes_to(0x63), vec![vec![0x52]]);
    }

    #[test]
    fn test_read_returns_queued_data() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(0x63, vec![0x01, 0x02]);
        let dev = device(&mock, DeviceConfig::new("dev", 1, 0x63));

        let data = dev.read(2).unwrap();
        assert_eq!(data, vec![0x01, 0x02]);
    }

    #[test]
    fn test_write_read_is_single_transaction() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(0x48, vec![0xBE, 0xEF]);
        let dev = device(&mock, DeviceConfig::new("dev", 1, 0x48));

        let data = dev.write_read(&[0x00], 2).unwrap();

        assert_eq!(data, vec![0xBE, 0xEF]);
        // write-readペアは1トランザクションにまとまる
        assert_eq!(mock.submission_count(), 1);
        assert_eq!(mock.submissions()[0].len(), 2);
    }
}
