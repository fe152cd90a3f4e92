// I2Cバス・マルチプレクサ管理レイヤー
pub mod i2c;

// Atlas pHセンサーの周辺レイヤー（ドライバーと校正イベント）
pub mod atlas_ph;

// デバイス動作モード
pub mod modes;
