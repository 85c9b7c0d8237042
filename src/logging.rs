/// ログ基盤
///
/// tracingを使用した統一的なログ出力。`RUST_LOG` が設定されていればそちらを優先します。
/// ファイル出力時は tracing-appender の非同期ライターで日次ローテーションします。
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログファイル名の接頭辞
pub const LOG_FILE_PREFIX: &str = "signlink.log";

/// ログシステムを初期化
///
/// # Arguments
/// - `log_level`: ログレベル（"info", "debug", "trace"等）
/// - `json_format`: JSON形式で出力するか
/// - `log_dir`: ログファイル出力先（None = 標準出力）
///
/// # Returns
/// ファイル出力時は `Some(WorkerGuard)`。main関数終了まで保持すること（Drop時に残りを書き出す）。
/// 標準出力時、または既にsubscriberが設定済みの場合は `None`。
pub fn init_logging(log_level: &str, json_format: bool, log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let format = if json_format { "json" } else { "text" };

    // ディレクトリが作れなければ標準出力に切り替える
    let log_dir = log_dir.and_then(|dir| match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            eprintln!("⚠️ ログディレクトリを作成できません ({}): {}", dir.display(), e);
            None
        }
    });

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = tracing_subscriber::registry().with(env_filter);

            let result = if json_format {
                subscriber.with(fmt::layer().json().with_writer(non_blocking)).try_init()
            } else {
                subscriber
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_line_number(true)
                            .with_ansi(false)
                            .with_writer(non_blocking),
                    )
                    .try_init()
            };
            if result.is_err() {
                return None;
            }

            tracing::info!(level = log_level, format, dir = %dir.display(), "logging initialized (file)");
            Some(guard)
        }
        None => {
            let subscriber = tracing_subscriber::registry().with(env_filter);
            let result = if json_format {
                subscriber.with(fmt::layer().json()).try_init()
            } else {
                subscriber.with(fmt::layer().with_target(true)).try_init()
            };

            if result.is_ok() {
                tracing::info!(level = log_level, format, "logging initialized (stdout)");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_file_or_already_set() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let guard = init_logging("info", true, Some(log_dir.clone()));
        // ディレクトリはsubscriberの設定状況に関わらず作成される
        assert!(log_dir.exists());

        if let Some(guard) = guard {
            tracing::info!("file log");
            drop(guard);
            let entries = std::fs::read_dir(&log_dir).unwrap().count();
            assert!(entries > 0);
        }
    }

    #[test]
    fn test_second_init_returns_none() {
        let _first = init_logging("debug", false, None);
        assert!(init_logging("debug", false, None).is_none());
    }
}
