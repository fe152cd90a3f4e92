pub mod config;
pub mod device;
pub mod mux;
pub mod transaction;

// 実機実装（I2Cデバイスドライバが存在するLinuxターゲットのみ）
#[cfg(target_os = "linux")]
pub mod linux;

// Mock実装（テストと非Linuxビルドで使用可能）
pub mod mock;

use self::transaction::Transaction;

/// バス操作の結果型
pub type BusResult<T> = Result<T, BusError>;

/// ゲート付きデバイス操作の結果型
pub type I2cResult<T> = Result<T, I2cError>;

/// バス実行器のエラーを表す列挙型
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// バスデバイスファイルを開けなかった
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// ioctl転送が失敗した
    #[error("I2C transfer failed on bus {bus}: {source}")]
    Transfer {
        bus: u8,
        #[source]
        source: std::io::Error,
    },

    /// デバイスが応答しなかった
    #[error("device 0x{address:02X} did not acknowledge")]
    Nack { address: u16 },

    /// メッセージを1つも含まないトランザクション
    #[error("transaction contains no messages")]
    EmptyTransaction,
}

/// マルチプレクサ操作のエラー
///
/// バスエラーとは別系統で伝搬する。チャンネル選択の失敗を
/// この層で握りつぶすことはない。
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("invalid mux channel {0} (expected 0-7)")]
    InvalidChannel(u8),

    #[error("failed to select channel {channel} on mux 0x{mux:02X} after {attempts} attempt(s)")]
    SelectFailed {
        mux: u8,
        channel: u8,
        attempts: u32,
        #[source]
        source: BusError,
    },
}

/// ゲート付き操作が返す統合エラー
#[derive(Debug, thiserror::Error)]
pub enum I2cError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Mux(#[from] MuxError),
}

/// バス実行器のトレイト
///
/// このトレイトを実装することで、実機用（ioctl）とテスト用（Mock）の
/// 実装を切り替えることができます。
pub trait BusExecutor {
    /// 組み立て済みトランザクションを1回のアトミックなバス操作として実行する。
    /// 呼び出しは完了または失敗までブロックする。
    fn submit(&mut self, transaction: &mut Transaction) -> BusResult<()>;
}
