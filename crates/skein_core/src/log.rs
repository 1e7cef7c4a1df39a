//! # String Logging
//!
//! Leveled log output for pooled strings. The pool does no formatting of its
//! own; this resolves the handle and hands the bytes to `tracing`.

use std::borrow::Cow;

use tracing::Level;

use crate::handle::Handle;
use crate::pool::StringPool;

/// Emits a `tracing` event carrying the content of `handle`.
///
/// `file` and `line` identify the call site; [`crate::pool_log!`] fills them in.
/// Non-UTF-8 content is logged lossily. The invalid handle logs as `<invalid>`.
pub fn log_handle(pool: &StringPool, level: Level, file: &'static str, line: u32, handle: Handle) {
    let text = pool
        .bytes(handle)
        .map_or(Cow::Borrowed("<invalid>"), String::from_utf8_lossy);
    let len = pool.length_of(handle);
    let hash = pool.get_hash(handle);

    if level == Level::ERROR {
        tracing::error!(file, line, len, hash, "{text}");
    } else if level == Level::WARN {
        tracing::warn!(file, line, len, hash, "{text}");
    } else if level == Level::INFO {
        tracing::info!(file, line, len, hash, "{text}");
    } else if level == Level::DEBUG {
        tracing::debug!(file, line, len, hash, "{text}");
    } else {
        tracing::trace!(file, line, len, hash, "{text}");
    }
}

/// Logs a pooled string at the given level with the caller's location.
///
/// ```rust
/// use skein_core::{pool_log, StringPool};
/// use tracing::Level;
///
/// let pool = StringPool::new()?;
/// let name = pool.create_from_bytes(b"terrain.hdr");
/// pool_log!(&pool, Level::INFO, name);
/// # Ok::<(), skein_core::PoolError>(())
/// ```
#[macro_export]
macro_rules! pool_log {
    ($pool:expr, $level:expr, $handle:expr) => {
        $crate::log::log_handle($pool, $level, file!(), line!(), $handle)
    };
}
