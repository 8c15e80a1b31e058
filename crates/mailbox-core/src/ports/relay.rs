//! Relay port - gateway への 1 回の配送
//!
//! scheduler はこの trait だけを知っている。本番は `impls::GatewayRelay`、
//! テストでは固定のレスポンスを返す stub を差し込む。

use async_trait::async_trait;

use crate::domain::RelayJob;
use crate::error::RelayError;

/// Relay は 1 件の配送を試みる
///
/// # 契約
/// - `Ok(status)` は gateway が 200/202 を返したときだけ
/// - それ以外のステータスも通信エラーも `Err` で返す（panic しない）
/// - 呼び出しは timeout で上限が決まっていること
#[async_trait]
pub trait Relay: Send + Sync {
    async fn attempt(&self, job: &RelayJob) -> Result<u16, RelayError>;
}
