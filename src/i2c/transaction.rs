/// I2Cトランザクション構築
///
/// アドレス付きメッセージの列から、カーネルのマルチメッセージioctlへ
/// そのまま渡せるトランザクションを組み立てます。この層は純粋な
/// データ組み立てのみを行い、I/Oは行いません。
use bitflags::bitflags;

/// 7bitアドレスマスク
///
/// R/Wビット込みの8bit表現で渡されたレガシーなアドレスも
/// エラーにせず黙って7bitへ丸める互換シム。
pub const SEVEN_BIT_ADDR_MASK: u16 = 0x7F;

bitflags! {
    /// カーネル`i2c_msg`のフラグワード
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MessageFlags: u16 {
        /// 読み取りメッセージ (I2C_M_RD)
        const READ = 0x0001;
        /// 10bitアドレッシング (I2C_M_TEN)
        const TEN_BIT_ADDR = 0x0010;
        /// リピートスタートを挿入しない (I2C_M_NOSTART)
        const NO_START = 0x4000;
    }
}

/// アドレス付きの単一メッセージ
///
/// バッファは転送中このメッセージが専有する。読み取りメッセージの
/// バッファは実行器がその場で上書きする。
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    addr: u16,
    flags: MessageFlags,
    buf: Vec<u8>,
}

impl Message {
    /// 書き込みメッセージを作成します
    pub fn write(addr: u16, bytes: &[u8]) -> Self {
        Message {
            addr: addr & SEVEN_BIT_ADDR_MASK,
            flags: MessageFlags::empty(),
            buf: bytes.to_vec(),
        }
    }

    /// `len`バイトの読み取りメッセージを作成します
    pub fn read(addr: u16, len: usize) -> Self {
        Message {
            addr: addr & SEVEN_BIT_ADDR_MASK,
            flags: MessageFlags::READ,
            buf: vec![0u8; len],
        }
    }

    /// ターゲットアドレス（7bitへマスク済み）
    pub fn addr(&self) -> u16 {
        self.addr
    }

    /// フラグワード
    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// 読み取りメッセージかどうか
    pub fn is_read(&self) -> bool {
        self.flags.contains(MessageFlags::READ)
    }

    /// バッファ長
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// バッファが空かどうか
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// バッファ内容への参照
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// 順序付きメッセージ列
///
/// 1回のバス操作としてアトミックに実行される。順序は保存され、
/// 意味を持つ（同一トランザクション内のwrite-readペアを要求する
/// デバイスがある）。
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    msgs: Vec<Message>,
}

impl Transaction {
    /// メッセージ列からトランザクションを作成します
    pub fn new(messages: Vec<Message>) -> Self {
        Transaction { msgs: messages }
    }

    /// 単一書き込みのトランザクションを作成します
    pub fn write(addr: u16, bytes: &[u8]) -> Self {
        Transaction::new(vec![Message::write(addr, bytes)])
    }

    /// 単一読み取りのトランザクションを作成します
    pub fn read(addr: u16, len: usize) -> Self {
        Transaction::new(vec![Message::read(addr, len)])
    }

    /// 書き込み→読み取りペアのトランザクションを作成します
    pub fn write_read(addr: u16, bytes: &[u8], read_len: usize) -> Self {
        Transaction::new(vec![Message::write(addr, bytes), Message::read(addr, read_len)])
    }

    /// メッセージ数
    pub fn count(&self) -> u32 {
        self.msgs.len() as u32
    }

    /// メッセージを含まないかどうか
    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    /// メッセージ列への参照
    pub fn messages(&self) -> &[Message] {
        &self.msgs
    }

    pub(crate) fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.msgs
    }

    /// ioctl ABI用の生メッセージレコード配列を作成します
    ///
    /// 返り値の各`buf`ポインタは`self`のバッファを指す。呼び出し側は
    /// 返り値が生きている間`self`を保持し、`I2cRdwrData`を組み立てて
    /// 提出する。
    pub fn raw_messages(&mut self) -> Vec<I2cMsg> {
        self.msgs
            .iter_mut()
            .map(|m| I2cMsg {
                addr: m.addr,
                flags: m.flags.bits(),
                len: m.buf.len() as u16,
                buf: m.buf.as_mut_ptr(),
            })
            .collect()
    }
}

/// Linux i2c-devのマルチメッセージioctl ABIと同一レイアウトの
/// メッセージレコード
#[repr(C)]
#[derive(Debug)]
pub struct I2cMsg {
    pub addr: u16,
    pub flags: u16,
    pub len: u16,
    pub buf: *mut u8,
}

/// `I2C_RDWR` ioctlへ渡すトップレベル構造体
///
/// `nmsgs`は`msgs`配列のレコード数と常に一致させること。
#[repr(C)]
#[derive(Debug)]
pub struct I2cRdwrData {
    pub msgs: *mut I2cMsg,
    pub nmsgs: u32,
}
