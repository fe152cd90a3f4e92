/// デバイス単位のバス設定
use super::mux::MUX_CHANNEL_COUNT;

/// 設定エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("mux 0x{0:02X} configured without a channel")]
    MissingMuxChannel(u8),

    #[error("mux channel {0} out of range (0-7)")]
    InvalidMuxChannel(u8),
}

/// マルチプレクサ選択失敗時の扱い
///
/// 選択に失敗したまま操作を実行すると、直前に選択されていた
/// 別チャンネルのデバイスへコマンドが届いてしまう。既定では
/// 操作を実行せずエラーを返す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MuxFailurePolicy {
    /// 操作を実行せず`MuxError`を返す
    #[default]
    Abort,
    /// 警告ログを出して操作を続行する
    Proceed,
}

/// デバイス1台分のI2C設定
///
/// デバイス初期化時に作成され、以後不変。デバイスハンドルが
/// 生存期間を通して所有する。
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// 論理デバイス名（ログ用）
    pub name: String,
    /// バス番号（/dev/i2c-N）
    pub bus: u8,
    /// デバイスアドレス
    pub address: u16,
    /// 経由するマルチプレクサのアドレス
    pub mux: Option<u8>,
    /// マルチプレクサのチャンネル
    pub channel: Option<u8>,
    /// マルチプレクサ選択失敗時のポリシー
    pub mux_failure: MuxFailurePolicy,
}

impl DeviceConfig {
    /// マルチプレクサを経由しないデバイス設定を作成します
    pub fn new(name: &str, bus: u8, address: u16) -> Self {
        DeviceConfig {
            name: name.to_string(),
            bus,
            address,
            mux: None,
            channel: None,
            mux_failure: MuxFailurePolicy::default(),
        }
    }

    /// マルチプレクサ経由の接続を設定します
    pub fn with_mux(mut self, mux: u8, channel: u8) -> Self {
        self.mux = Some(mux);
        self.channel = Some(channel);
        self
    }

    /// マルチプレクサ選択失敗時のポリシーを設定します
    pub fn with_mux_failure(mut self, policy: MuxFailurePolicy) -> Self {
        self.mux_failure = policy;
        self
    }

    /// 設定の妥当性を検証します
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mux) = self.mux {
            match self.channel {
                None => return Err(ConfigError::MissingMuxChannel(mux)),
                Some(channel) if channel >= MUX_CHANNEL_COUNT => {
                    return Err(ConfigError::InvalidMuxChannel(channel));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_config_valid() {
        let config = DeviceConfig::new("atlas-ph", 1, 0x63);
        assert!(config.validate().is_ok());
        assert!(config.mux.is_none());
    }

    #[test]
    fn test_mux_config_valid() {
        let config = DeviceConfig::new("atlas-ph", 1, 0x63).with_mux(0x77, 4);
        assert!(config.validate().is_ok());
        assert_eq!(config.channel, Some(4));
    }

    #[test]
    fn test_mux_without_channel_rejected() {
        let mut config = DeviceConfig::new("atlas-ph", 1, 0x63);
        config.mux = Some(0x77);

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::MissingMuxChannel(0x77))));
    }

    #[test]
    fn test_channel_out_of_range_rejected() {
        let config = DeviceConfig::new("atlas-ph", 1, 0x63).with_mux(0x77, 8);

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidMuxChannel(8))));
    }

    #[test]
    fn test_default_policy_is_abort() {
        let config = DeviceConfig::new("atlas-ph", 1, 0x63);
        assert_eq!(config.mux_failure, MuxFailurePolicy::Abort);
    }
}
