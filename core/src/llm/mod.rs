//! Completion-service abstraction.
//!
//! The reasoning loop only needs `complete(prompt, stop) -> text`. The
//! trait seam keeps the HTTP client swappable and lets tests drive the
//! loop with scripted responses.

pub mod client;

pub use client::{LlamaClient, LlmConfig};

use crate::Result;
use async_trait::async_trait;
use tracing::warn;

/// A text-completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String>;
}

/// Attempts made against the completion service before giving up.
pub const MAX_COMPLETION_ATTEMPTS: usize = 3;

/// Literal answer used when every completion attempt failed. Returned as
/// text instead of an error so a dead model server degrades a turn rather
/// than crashing the session.
pub const UNRESPONSIVE_MESSAGE: &str =
    "Sorry, the server appears to be unresponsive. Please try again later.";

/// Call the completion service with a bounded retry. On exhaustion the
/// terminal [`UNRESPONSIVE_MESSAGE`] is returned as the completion text.
pub async fn complete_with_retry(
    service: &dyn CompletionService,
    prompt: &str,
    stop: &[String],
) -> String {
    for attempt in 1..=MAX_COMPLETION_ATTEMPTS {
        match service.complete(prompt, stop).await {
            Ok(text) => return text,
            Err(e) => {
                warn!(
                    target: "llm_client",
                    attempt,
                    max = MAX_COMPLETION_ATTEMPTS,
                    error = %e,
                    "Completion attempt failed"
                );
            }
        }
    }
    UNRESPONSIVE_MESSAGE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinervaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyService {
        calls: AtomicUsize,
        succeed_on: usize,
    }

    #[async_trait]
    impl CompletionService for FlakyService {
        async fn complete(&self, _prompt: &str, _stop: &[String]) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok("recovered".to_string())
            } else {
                Err(MinervaError::Completion("boom".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let svc = FlakyService {
            calls: AtomicUsize::new(0),
            succeed_on: 3,
        };
        let text = complete_with_retry(&svc, "p", &[]).await;
        assert_eq!(text, "recovered");
        assert_eq!(svc.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_to_terminal_message() {
        let svc = FlakyService {
            calls: AtomicUsize::new(0),
            succeed_on: usize::MAX,
        };
        let text = complete_with_retry(&svc, "p", &[]).await;
        assert_eq!(text, UNRESPONSIVE_MESSAGE);
        assert_eq!(svc.calls.load(Ordering::SeqCst), MAX_COMPLETION_ATTEMPTS);
    }
}
