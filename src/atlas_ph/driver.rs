/// Atlas Scientific EZO-pHセンサードライバー
///
/// ASCIIコマンドを書き込み、処理待ち後にステータスバイト付きの応答を
/// 読み取るコマンド/レスポンス型のプロトコルを実装します。転送は
/// すべてデバイスハンドルのゲート付き操作を経由します。
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::i2c::device::I2cDevice;
use crate::i2c::{BusExecutor, I2cError};

/// EZO-pHの既定I2Cアドレス
pub const DEFAULT_ADDRESS: u16 = 0x63;

/// コマンド処理待ち時間
///
/// 読み取り/校正コマンドは発行からこの時間が経過するまで応答を返さない。
const PROCESSING_DELAY: Duration = Duration::from_millis(900);

/// 応答バッファ長（ステータス1バイト + ASCIIペイロード）
const RESPONSE_LEN: usize = 31;

// 応答ステータスコード
const STATUS_OK: u8 = 1;
const STATUS_SYNTAX_ERROR: u8 = 2;
const STATUS_STILL_PROCESSING: u8 = 254;
const STATUS_NO_DATA: u8 = 255;

/// pHセンサードライバーのエラー
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Transfer(#[from] I2cError),

    #[error("sensor rejected command `{0}` as a syntax error")]
    SyntaxError(String),

    #[error("sensor is still processing the previous command")]
    StillProcessing,

    #[error("sensor has no data to report")]
    NoData,

    #[error("unexpected response status {0}")]
    UnknownStatus(u8),

    #[error("malformed sensor response: {0}")]
    MalformedResponse(String),
}

/// Atlas EZO-pHセンサードライバー
pub struct AtlasPhDriver<B: BusExecutor> {
    device: I2cDevice<B>,
    processing_delay: Duration,
}

impl<B: BusExecutor> AtlasPhDriver<B> {
    /// 新しいドライバーを作成します
    pub fn new(device: I2cDevice<B>) -> Self {
        AtlasPhDriver {
            device,
            processing_delay: PROCESSING_DELAY,
        }
    }

    /// 処理待ち時間を差し替えます（テスト用）
    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    /// pH値を読み取ります
    pub fn read_ph(&self) -> Result<f32, DriverError> {
        let response = self.command("R")?;
        let text = ascii_payload(&response)?;
        let ph = text
            .parse::<f32>()
            .map_err(|_| DriverError::MalformedResponse(text.to_string()))?;

        info!("{}: pH {:.3}", self.device.name(), ph);
        Ok(ph)
    }

    /// 低点校正を実行します
    pub fn take_low_point_calibration_reading(&self, value: f64) -> Result<(), DriverError> {
        self.calibrate(&format!("Cal,low,{:.2}", value))
    }

    /// 中点校正を実行します
    pub fn take_mid_point_calibration_reading(&self, value: f64) -> Result<(), DriverError> {
        self.calibrate(&format!("Cal,mid,{:.2}", value))
    }

    /// 高点校正を実行します
    pub fn take_high_point_calibration_reading(&self, value: f64) -> Result<(), DriverError> {
        self.calibrate(&format!("Cal,high,{:.2}", value))
    }

    /// 校正データをクリアします
    pub fn clear_calibration_readings(&self) -> Result<(), DriverError> {
        self.calibrate("Cal,clear")
    }

    fn calibrate(&self, command: &str) -> Result<(), DriverError> {
        self.command(command)?;
        Ok(())
    }

    /// コマンドを発行し、処理待ち後に応答を読み取ります
    fn command(&self, command: &str) -> Result<Vec<u8>, DriverError> {
        debug!("{}: sending `{}`", self.device.name(), command);
        self.device.write(command.as_bytes())?;

        thread::sleep(self.processing_delay);

        let response = self.device.read(RESPONSE_LEN)?;
        match response.first().copied() {
            Some(STATUS_OK) => Ok(response),
            Some(STATUS_SYNTAX_ERROR) => Err(DriverError::SyntaxError(command.to_string())),
            Some(STATUS_STILL_PROCESSING) => Err(DriverError::StillProcessing),
            Some(STATUS_NO_DATA) => Err(DriverError::NoData),
            Some(code) => Err(DriverError::UnknownStatus(code)),
            None => Err(DriverError::MalformedResponse("empty response".to_string())),
        }
    }
}

/// 応答からNUL終端のASCIIペイロードを取り出します
fn ascii_payload(response: &[u8]) -> Result<&str, DriverError> {
    let payload = &response[1..];
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    std::str::from_utf8(&payload[..end])
        .map_err(|_| DriverError::MalformedResponse("non-ASCII payload".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::config::DeviceConfig;
    use crate::i2c::mock::MockI2cBus;
    use std::sync::{Arc, Mutex};

    fn driver(mock: &MockI2cBus) -> AtlasPhDriver<MockI2cBus> {
        let config = DeviceConfig::new("atlas-ph", 1, DEFAULT_ADDRESS);
        let device = I2cDevice::new(config, Arc::new(Mutex::new(mock.clone())));
        AtlasPhDriver::new(device).with_processing_delay(Duration::ZERO)
    }

    fn response(text: &str) -> Vec<u8> {
        let mut data = vec![STATUS_OK];
        data.extend_from_slice(text.as_bytes());
        data
    }

    #[test]
    fn test_read_ph_parses_response() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(DEFAULT_ADDRESS, response("9.560"));

        let ph = driver(&mock).read_ph().unwrap();

        assert!((ph - 9.56).abs() < 1e-4);
        assert_eq!(mock.writes_to(DEFAULT_ADDRESS), vec![b"R".to_vec()]);
    }

    #[test]
    fn test_calibration_command_format() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(DEFAULT_ADDRESS, vec![STATUS_OK]);

        driver(&mock).take_low_point_calibration_reading(4.0).unwrap();

        assert_eq!(mock.writes_to(DEFAULT_ADDRESS), vec![b"Cal,low,4.00".to_vec()]);
    }

    #[test]
    fn test_syntax_error_status() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(DEFAULT_ADDRESS, vec![STATUS_SYNTAX_ERROR]);

        let result = driver(&mock).clear_calibration_readings();
        assert!(matches!(result, Err(DriverError::SyntaxError(_))));
    }

    #[test]
    fn test_still_processing_status() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(DEFAULT_ADDRESS, vec![STATUS_STILL_PROCESSING]);

        let result = driver(&mock).read_ph();
        assert!(matches!(result, Err(DriverError::StillProcessing)));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let mock = MockI2cBus::new();
        mock.queue_read_data(DEFAULT_ADDRESS, response("not-a-number"));

        let result = driver(&mock).read_ph();
        assert!(matches!(result, Err(DriverError::MalformedResponse(_))));
    }
}
