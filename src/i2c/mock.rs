/// テスト用のI2Cバス実行器モック
///
/// 実際のバスハードウェアを使わずにトランザクション実行をシミュレート
/// します。実行されたメッセージの記録、アドレス別の読み取りデータ
/// キュー、アドレス別の失敗注入、マルチプレクサのチャンネル状態追跡に
/// 対応し、テストで検証できます。
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::transaction::{MessageFlags, Transaction};
use super::{BusError, BusExecutor, BusResult};

/// 記録された1メッセージ分の転送内容
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub addr: u16,
    pub flags: MessageFlags,
    /// 書き込みは送信バイト列、読み取りは充填後のバッファ内容
    pub data: Vec<u8>,
}

impl RecordedMessage {
    /// 書き込みメッセージかどうか
    pub fn is_write(&self) -> bool {
        !self.flags.contains(MessageFlags::READ)
    }
}

/// テスト用のバス実行器モック
#[derive(Debug, Clone)]
pub struct MockI2cBus {
    /// 実行されたトランザクションの記録（トランザクション単位）
    submitted: Arc<Mutex<Vec<Vec<RecordedMessage>>>>,
    /// アドレス別の読み取りデータキュー（先頭から消費される）
    read_queues: Arc<Mutex<HashMap<u16, VecDeque<Vec<u8>>>>>,
    /// アドレス別の失敗注入カウンタ（残回数分submitが失敗する）
    failures: Arc<Mutex<HashMap<u16, u32>>>,
    /// 登録済みマルチプレクサと最後に選択されたチャンネルマスク
    mux_state: Arc<Mutex<HashMap<u16, Option<u8>>>>,
}

impl Default for MockI2cBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockI2cBus {
    /// 新しいモックを作成します
    pub fn new() -> Self {
        MockI2cBus {
            submitted: Arc::new(Mutex::new(Vec::new())),
            read_queues: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            mux_state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// テスト用: マルチプレクサのアドレスを登録します
    ///
    /// 登録済みアドレスへの1バイト書き込みはチャンネル選択として
    /// 追跡される。
    pub fn register_mux(&self, addr: u16) {
        self.mux_state.lock().unwrap().insert(addr, None);
    }

    /// テスト用: 読み取り要求に応答するデータをキューに追加します
    pub fn queue_read_data(&self, addr: u16, data: Vec<u8>) {
        self.read_queues
            .lock()
            .unwrap()
            .entry(addr)
            .or_default()
            .push_back(data);
    }

    /// テスト用: 指定アドレスへの次の`count`回のトランザクションを失敗させます
    pub fn fail_next_submits(&self, addr: u16, count: u32) {
        self.failures.lock().unwrap().insert(addr, count);
    }

    /// テスト用: 指定アドレス宛に記録された書き込みメッセージを取得します
    pub fn writes_to(&self, addr: u16) -> Vec<Vec<u8>> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .filter(|m| m.addr == addr && m.is_write())
            .map(|m| m.data.clone())
            .collect()
    }

    /// テスト用: 実行されたトランザクション数
    pub fn submission_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// テスト用: 記録された全トランザクション
    pub fn submissions(&self) -> Vec<Vec<RecordedMessage>> {
        self.submitted.lock().unwrap().clone()
    }

    /// テスト用: 記録をクリアします
    pub fn clear_submissions(&self) {
        self.submitted.lock().unwrap().clear();
    }

    /// テスト用: 登録済みマルチプレクサで最後に選択されたチャンネルマスク
    pub fn selected_mask(&self, mux: u16) -> Option<u8> {
        self.mux_state.lock().unwrap().get(&mux).copied().flatten()
    }
}

impl BusExecutor for MockI2cBus {
    fn submit(&mut self, transaction: &mut Transaction) -> BusResult<()> {
        if transaction.is_empty() {
            return Err(BusError::EmptyTransaction);
        }

        // 失敗注入: トランザクション内のいずれかのアドレスに残回数があれば失敗
        {
            let mut failures = self.failures.lock().unwrap();
            for msg in transaction.messages() {
                if let Some(remaining) = failures.get_mut(&msg.addr()) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(BusError::Nack { address: msg.addr() });
                    }
                }
            }
        }

        let mut record = Vec::new();
        for msg in transaction.messages_mut() {
            if msg.is_read() {
                // キューにデータがあればバッファへ充填（なければゼロのまま）
                let mut queues = self.read_queues.lock().unwrap();
                if let Some(data) = queues.get_mut(&msg.addr()).and_then(|q| q.pop_front()) {
                    let len = data.len().min(msg.len());
                    msg.bytes_mut()[..len].copy_from_slice(&data[..len]);
                }
            } else if msg.len() == 1 {
                // 登録済みマルチプレクサへの1バイト書き込みはチャンネル選択
                let mut mux_state = self.mux_state.lock().unwrap();
                if let Some(state) = mux_state.get_mut(&msg.addr()) {
                    *state = Some(msg.bytes()[0]);
                }
            }

            record.push(RecordedMessage {
                addr: msg.addr(),
                flags: msg.flags(),
                data: msg.bytes().to_vec(),
            });
        }
        self.submitted.lock().unwrap().push(record);
        Ok(())
    }
}
