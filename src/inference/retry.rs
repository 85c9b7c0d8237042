//! 一時的な失敗に対するリトライ（指数バックオフ + ジッター）

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::ClassifierError;
use crate::model::config::RetrySettings;

/// `attempt` 回目（0始まり）の失敗後の待ち時間
///
/// `base * 2^attempt` を `max` で頭打ちにし、その半分から全体までの間でランダムに選ぶ。
pub fn backoff_delay<R: Rng>(settings: &RetrySettings, attempt: u32, rng: &mut R) -> Duration {
    let exp = settings
        .base_delay_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(settings.max_delay_ms);
    let half = exp / 2;
    let jitter = if exp > half { rng.gen_range(0..=exp - half) } else { 0 };
    Duration::from_millis(half + jitter)
}

/// 一時的なエラーの間だけ `operation` を再試行する
pub async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ClassifierError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClassifierError>>,
{
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(settings, attempt, &mut rand::thread_rng());
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
