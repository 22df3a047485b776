use crate::llm::{CompletionRequest, CompletionResponse, LLM};
use crate::{Error, Result};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps an [`LLM`] with a per attempt timeout and a bounded exponential
/// backoff. Only [`Error::is_transient`] failures are retried.
pub struct Retrying {
    inner: Arc<dyn LLM + Send + Sync>,
    timeout: Duration,
    backoff: ExponentialBuilder,
}

impl Retrying {
    pub fn new(
        inner: Arc<dyn LLM + Send + Sync>,
        timeout: Duration,
        max_retries: usize,
    ) -> Arc<Self> {
        Self::with_backoff(
            inner,
            timeout,
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_factor(2.0)
                .with_jitter()
                .with_max_times(max_retries),
        )
    }

    pub fn with_backoff(
        inner: Arc<dyn LLM + Send + Sync>,
        timeout: Duration,
        backoff: ExponentialBuilder,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner,
            timeout,
            backoff,
        })
    }
}

#[async_trait]
impl LLM for Retrying {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse> {
        let inner = &self.inner;
        let timeout = self.timeout;

        let attempt = move || async move {
            match tokio::time::timeout(timeout, inner.completion(request)).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            }
        };

        attempt
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(Error::is_transient)
            .notify(|err: &Error, dur: Duration| {
                warn!(error = %err, "llm call failed, retrying in {:?}", dur);
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::Retrying;
    use crate::llm::{CompletionRequest, CompletionResponse, LLM};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use backon::ExponentialBuilder;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails (or stalls) for the first `failures` calls, then answers.
    struct FlakyLLM {
        calls: AtomicUsize,
        failures: usize,
        stall: bool,
        transient: bool,
    }

    impl FlakyLLM {
        fn new(failures: usize, stall: bool, transient: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
                stall,
                transient,
            })
        }
    }

    #[async_trait]
    impl LLM for FlakyLLM {
        async fn completion<'a>(&self, _: CompletionRequest<'a>) -> Result<CompletionResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.stall {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                if self.transient {
                    return Err(Error::Timeout(Duration::from_secs(1)));
                }
                return Err(Error::LLMResponseError("bad request".to_string()));
            }
            Ok(CompletionResponse {
                content: format!("answer after {} calls", n + 1),
                tool_calls: vec![],
            })
        }
    }

    fn fast_backoff(max_times: usize) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(20))
            .with_max_times(max_times)
    }

    fn request() -> CompletionRequest<'static> {
        CompletionRequest {
            messages: &[],
            tools: &[],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() -> Result<()> {
        let flaky = FlakyLLM::new(2, false, true);
        let llm = Retrying::with_backoff(flaky.clone(), Duration::from_secs(5), fast_backoff(3));

        let res = llm.completion(request()).await?;

        assert_eq!(res.content, "answer after 3 calls");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_permanent_failures() {
        let flaky = FlakyLLM::new(1, false, false);
        let llm = Retrying::with_backoff(flaky.clone(), Duration::from_secs(5), fast_backoff(3));

        let res = llm.completion(request()).await;

        assert!(matches!(res, Err(Error::LLMResponseError(_))));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_slow_calls() {
        let flaky = FlakyLLM::new(10, true, true);
        let llm = Retrying::with_backoff(flaky.clone(), Duration::from_secs(5), fast_backoff(2));

        let res = llm.completion(request()).await;

        assert!(matches!(res, Err(Error::Timeout(d)) if d == Duration::from_secs(5)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }
}
