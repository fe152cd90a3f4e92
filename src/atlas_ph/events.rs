/// pHセンサーの校正イベント処理
///
/// 外部から届いたイベント要求を検証してドライバーへ振り分け、
/// `(メッセージ, ステータスコード)`の組を返します。コードは
/// 400（検証/モードエラー）、200（成功）、500（ドライバー障害）の
/// 固定語彙に従います。
use log::{debug, error, info};

use super::driver::{AtlasPhDriver, DriverError};
use crate::i2c::BusExecutor;
use crate::modes::Mode;

// イベント種別
pub const LOW_POINT_CALIBRATION_EVENT: &str = "Low Point Calibration";
pub const MID_POINT_CALIBRATION_EVENT: &str = "Mid Point Calibration";
pub const HIGH_POINT_CALIBRATION_EVENT: &str = "High Point Calibration";
pub const CLEAR_CALIBRATION_EVENT: &str = "Clear Calibration";

// 応答ステータスコード
pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_DRIVER_ERROR: u16 = 500;

// 校正点ごとの有効なpH範囲
const LOW_POINT_RANGE: (f64, f64) = (0.0, 4.0);
const MID_POINT_RANGE: (f64, f64) = (4.0, 10.0);
const HIGH_POINT_RANGE: (f64, f64) = (10.0, 14.0);

/// 校正イベント要求
#[derive(Debug, Clone)]
pub struct EventRequest {
    /// 要求種別
    pub request_type: String,
    /// 校正値（クリア要求では不要）
    pub value: Option<String>,
}

/// pHセンサーの校正イベント処理
pub struct AtlasPhEvents<B: BusExecutor> {
    driver: AtlasPhDriver<B>,
    mode: Mode,
}

impl<B: BusExecutor> AtlasPhEvents<B> {
    /// 新しいイベント処理を作成します
    pub fn new(driver: AtlasPhDriver<B>) -> Self {
        AtlasPhEvents {
            driver,
            mode: Mode::Normal,
        }
    }

    /// 現在の動作モード
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 動作モードを設定します
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// イベント要求を処理します
    pub fn process_event(&mut self, request: &EventRequest) -> (String, u16) {
        match request.request_type.as_str() {
            LOW_POINT_CALIBRATION_EVENT => self.process_low_point_calibration_event(request),
            MID_POINT_CALIBRATION_EVENT => self.process_mid_point_calibration_event(request),
            HIGH_POINT_CALIBRATION_EVENT => self.process_high_point_calibration_event(request),
            CLEAR_CALIBRATION_EVENT => self.process_clear_calibration_event(),
            _ => ("Unknown event request type".to_string(), STATUS_BAD_REQUEST),
        }
    }

    fn process_low_point_calibration_event(&mut self, request: &EventRequest) -> (String, u16) {
        info!("Processing low point calibration event");

        let value = match parse_value(request, LOW_POINT_RANGE) {
            Ok(value) => value,
            Err(response) => return response,
        };
        if let Some(response) = self.require_calibration_mode("take single point calibration") {
            return response;
        }

        match self.driver.take_low_point_calibration_reading(value) {
            Ok(()) => (
                "Successfully took low point calibration reading".to_string(),
                STATUS_OK,
            ),
            Err(e) => self.driver_failure("Unable to process low point calibration event", e),
        }
    }

    fn process_mid_point_calibration_event(&mut self, request: &EventRequest) -> (String, u16) {
        info!("Processing mid point calibration event");

        let value = match parse_value(request, MID_POINT_RANGE) {
            Ok(value) => value,
            Err(response) => return response,
        };
        if let Some(response) = self.require_calibration_mode("take single point calibration") {
            return response;
        }

        match self.driver.take_mid_point_calibration_reading(value) {
            Ok(()) => (
                "Successfully took mid point calibration reading".to_string(),
                STATUS_OK,
            ),
            Err(e) => self.driver_failure("Unable to process mid point calibration event", e),
        }
    }

    fn process_high_point_calibration_event(&mut self, request: &EventRequest) -> (String, u16) {
        info!("Processing high point calibration event");

        let value = match parse_value(request, HIGH_POINT_RANGE) {
            Ok(value) => value,
            Err(response) => return response,
        };
        if let Some(response) = self.require_calibration_mode("take single point calibration") {
            return response;
        }

        match self.driver.take_high_point_calibration_reading(value) {
            Ok(()) => (
                "Successfully took high point calibration reading".to_string(),
                STATUS_OK,
            ),
            Err(e) => self.driver_failure("Unable to process high point calibration event", e),
        }
    }

    fn process_clear_calibration_event(&mut self) -> (String, u16) {
        info!("Processing clear calibration event");

        if let Some(response) = self.require_calibration_mode("clear calibration") {
            return response;
        }

        match self.driver.clear_calibration_readings() {
            Ok(()) => (
                "Successfully cleared calibration readings".to_string(),
                STATUS_OK,
            ),
            Err(e) => self.driver_failure("Unable to process clear calibration event", e),
        }
    }

    fn require_calibration_mode(&self, action: &str) -> Option<(String, u16)> {
        if self.mode != Mode::Calibrate {
            let message = format!("Must be in calibration mode to {}", action);
            debug!("{}", message);
            return Some((message, STATUS_BAD_REQUEST));
        }
        None
    }

    fn driver_failure(&mut self, message: &str, error: DriverError) -> (String, u16) {
        error!("{}: {}", message, error);
        self.mode = Mode::Error;
        (message.to_string(), STATUS_DRIVER_ERROR)
    }
}

/// 要求から校正値を取り出し、範囲を検証します
fn parse_value(request: &EventRequest, (low, high): (f64, f64)) -> Result<f64, (String, u16)> {
    let raw = match &request.value {
        Some(raw) => raw,
        None => {
            let message = "Invalid request parameters: missing value".to_string();
            debug!("{}", message);
            return Err((message, STATUS_BAD_REQUEST));
        }
    };

    let value: f64 = match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            let message = format!("Invalid request value: `{}`", raw);
            debug!("{}", message);
            return Err((message, STATUS_BAD_REQUEST));
        }
    };

    if value < low || value > high {
        let message = format!("Invalid request value, not in range {}-{}", low, high);
        debug!("{}", message);
        return Err((message, STATUS_BAD_REQUEST));
    }

    Ok(value)
}
