/// マルチプレクサ制御
///
/// 複数デバイスが1つのマルチプレクサを共有するため、他デバイスの
/// 操作が別チャンネルへ切り替えている可能性がある。ゲート対象の
/// 操作の直前には毎回チャンネル選択を行う必要がある。
use log::{info, warn};

use super::transaction::Transaction;
use super::{BusExecutor, BusResult, MuxError};

/// マルチプレクサのチャンネル数（TCA9548系）
pub const MUX_CHANNEL_COUNT: u8 = 8;

/// `select_channel`自身の既定リトライ回数
///
/// 呼び出し側がリトライ値を解決できなかった場合（`None`）に適用される。
pub const MUX_DEFAULT_RETRY: u32 = 2;

/// ゲート対象となるバス操作
///
/// 既定リトライ回数を静的に宣言し、操作本体を提供する。デバイス
/// ハンドルの`run`がマルチプレクサ選択→操作本体の順で実行する。
pub trait GatedOperation {
    type Output;

    /// この操作が宣言する既定リトライ回数。未宣言なら`None`。
    fn default_retry(&self) -> Option<u32> {
        None
    }

    /// バス実行器上で操作本体を実行する
    fn execute(self, bus: &mut dyn BusExecutor) -> BusResult<Self::Output>;
}

/// マルチプレクサ選択に使うリトライ回数を解決します
///
/// 優先順位は明示指定→操作の宣言既定→`None`。`None`は
/// 「呼び出し先の固有ポリシーに任せる」を意味し、
/// `Some(0)`（リトライなし）とは区別される。
pub fn resolve_retry(explicit: Option<u32>, declared: Option<u32>) -> Option<u32> {
    explicit.or(declared)
}

/// マルチプレクサのチャンネルを選択します
///
/// チャンネルマスク`1 << channel`の1バイト書き込みを、
/// `1 + retry`回を上限に試行する。同一(アドレス, チャンネル)への
/// 再選択は冪等。
pub fn select_channel(
    bus: &mut dyn BusExecutor,
    mux: u8,
    channel: u8,
    retry: Option<u32>,
) -> Result<(), MuxError> {
    if channel >= MUX_CHANNEL_COUNT {
        return Err(MuxError::InvalidChannel(channel));
    }

    let attempts = 1 + retry.unwrap_or(MUX_DEFAULT_RETRY);
    let mask = 1u8 << channel;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut txn = Transaction::write(mux as u16, &[mask]);
        match bus.submit(&mut txn) {
            Ok(()) => {
                if attempt > 1 {
                    info!("mux 0x{:02X}: channel {} selected (attempt {})", mux, channel, attempt);
                }
                return Ok(());
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "mux 0x{:02X}: channel {} select failed (attempt {}/{}): {}",
                    mux, channel, attempt, attempts, e
                );
            }
            Err(e) => {
                warn!(
                    "mux 0x{:02X}: channel {} select failed (attempt {}/{}): {}",
                    mux, channel, attempt, attempts, e
                );
                return Err(MuxError::SelectFailed {
                    mux,
                    channel,
                    attempts,
                    source: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::mock::MockI2cBus;

    #[test]
    fn test_resolve_retry_precedence() {
        // 明示指定が宣言既定に優先する
        assert_eq!(resolve_retry(Some(3), Some(5)), Some(3));
        assert_eq!(resolve_retry(None, Some(5)), Some(5));
        assert_eq!(resolve_retry(None, None), None);
        // 明示的な0は「リトライなし」であってNoneではない
        assert_eq!(resolve_retry(Some(0), Some(5)), Some(0));
    }

    #[test]
    fn test_select_writes_channel_mask() {
        let mut bus = MockI2cBus::new();
        bus.register_mux(0x70);

        select_channel(&mut bus, 0x70, 5, Some(0)).unwrap();

        assert_eq!(bus.writes_to(0x70), vec![vec![0x20]]);
        assert_eq!(bus.selected_mask(0x70), Some(0x20));
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let mut bus = MockI2cBus::new();
        let result = select_channel(&mut bus, 0x70, 8, None);
        assert!(matches!(result, Err(MuxError::InvalidChannel(8))));
        // バスには触れない
        assert_eq!(bus.submission_count(), 0);
    }

    #[test]
    fn test_retry_until_success() {
        let mut bus = MockI2cBus::new();
        bus.register_mux(0x70);
        bus.fail_next_submits(0x70, 2);

        // 2回失敗後、3回目で成功する
        select_channel(&mut bus, 0x70, 0, Some(2)).unwrap();
        assert_eq!(bus.selected_mask(0x70), Some(0x01));
    }

    #[test]
    fn test_retry_exhausted() {
        let mut bus = MockI2cBus::new();
        bus.register_mux(0x70);
        bus.fail_next_submits(0x70, 3);

        let result = select_channel(&mut bus, 0x70, 0, Some(2));
        assert!(matches!(result, Err(MuxError::SelectFailed { attempts: 3, .. })));
    }

    #[test]
    fn test_intrinsic_retry_when_unconstrained() {
        // retry未指定時は固有ポリシー(MUX_DEFAULT_RETRY)で試行する
        let mut bus = MockI2cBus::new();
        bus.register_mux(0x70);
        bus.fail_next_submits(0x70, MUX_DEFAULT_RETRY);

        select_channel(&mut bus, 0x70, 1, None).unwrap();

        let mut bus = MockI2cBus::new();
        bus.register_mux(0x70);
        bus.fail_next_submits(0x70, MUX_DEFAULT_RETRY + 1);

        let result = select_channel(&mut bus, 0x70, 1, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_retry_is_single_attempt() {
        let mut bus = MockI2cBus::new();
        bus.register_mux(0x70);
        bus.fail_next_submits(0x70, 1);

        let result = select_channel(&mut bus, 0x70, 1, Some(0));
        assert!(matches!(result, Err(MuxError::SelectFailed { attempts: 1, .. })));
    }
}
