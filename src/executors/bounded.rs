//! 有界调用：重试 + 成本上限
//!
//! 每次尝试前检查累计成本是否已达上限；仅 Transient 错误会重试（线性退避）；
//! 所有尝试报告的成本累加进最终输出或失败。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::executors::{ExecutorError, ExecutorFailure, ExecutorOutput};

/// 单个执行器的策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorPolicy {
    /// 首次尝试之外的最大重试次数
    pub max_retries: u32,
    pub cost_ceiling_usd: f64,
    pub backoff: Duration,
}

impl ExecutorPolicy {
    pub fn new(max_retries: u32, cost_ceiling_usd: f64) -> Self {
        Self {
            max_retries,
            cost_ceiling_usd,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// 无重试、无上限（测试用）
    pub fn unbounded() -> Self {
        Self::new(0, f64::INFINITY)
    }
}

fn sanitize_cost(cost: f64) -> f64 {
    if cost.is_finite() && cost > 0.0 {
        cost
    } else {
        0.0
    }
}

/// 有界执行器：持有具体实现与策略
pub struct Bounded<T: ?Sized> {
    name: String,
    inner: Arc<T>,
    policy: ExecutorPolicy,
}

impl<T: ?Sized> Clone for Bounded<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: Arc::clone(&self.inner),
            policy: self.policy,
        }
    }
}

impl<T: ?Sized + Send + Sync> Bounded<T> {
    pub fn new(name: impl Into<String>, inner: Arc<T>, policy: ExecutorPolicy) -> Self {
        Self {
            name: name.into(),
            inner,
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &ExecutorPolicy {
        &self.policy
    }

    /// 在策略约束下调用执行器；attempt 收到实现与本次剩余预算
    pub async fn invoke<'a, R, F, Fut>(
        &'a self,
        mut attempt: F,
    ) -> Result<ExecutorOutput<R>, ExecutorFailure>
    where
        F: FnMut(&'a T, f64) -> Fut,
        Fut: Future<Output = Result<ExecutorOutput<R>, ExecutorError>>,
    {
        let ceiling = self.policy.cost_ceiling_usd;
        let mut spent = 0.0;
        let mut attempts: u32 = 0;

        loop {
            let remaining = ceiling - spent;
            if remaining <= 0.0 {
                return Err(self.failure(
                    attempts,
                    spent,
                    ExecutorError::CostCeiling {
                        ceiling_usd: ceiling,
                        spent_usd: spent,
                    },
                ));
            }

            attempts += 1;
            match attempt(self.inner.as_ref(), remaining).await {
                Ok(out) => {
                    spent += sanitize_cost(out.cost_usd);
                    if spent > ceiling {
                        tracing::warn!(
                            executor = %self.name,
                            spent_usd = spent,
                            ceiling_usd = ceiling,
                            "executor overran its cost ceiling on the final attempt"
                        );
                    }
                    return Ok(ExecutorOutput::new(out.value, spent));
                }
                Err(err) => {
                    spent += sanitize_cost(err.cost_usd());
                    if !err.is_transient() || attempts > self.policy.max_retries {
                        return Err(self.failure(attempts, spent, err));
                    }
                    tracing::warn!(
                        executor = %self.name,
                        attempt = attempts,
                        error = %err,
                        "transient executor failure, retrying"
                    );
                    if !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff * attempts).await;
                    }
                }
            }
        }
    }

    fn failure(&self, attempts: u32, spent: f64, source: ExecutorError) -> ExecutorFailure {
        ExecutorFailure {
            executor: self.name.clone(),
            attempts,
            cost_usd: spent,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        fail_first: usize,
        error: ExecutorError,
    }

    impl Flaky {
        async fn run(&self) -> Result<ExecutorOutput<&'static str>, ExecutorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(self.error.clone())
            } else {
                Ok(ExecutorOutput::new("ok", 0.01))
            }
        }
    }

    fn flaky(fail_first: usize, error: ExecutorError) -> Arc<Flaky> {
        Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            fail_first,
            error,
        })
    }

    #[tokio::test]
    async fn test_retries_transient_and_sums_cost() {
        let inner = flaky(2, ExecutorError::transient("503").with_cost(0.02));
        let bounded = Bounded::new("flaky", inner.clone(), ExecutorPolicy::new(2, 1.0));
        let out = bounded.invoke(|f, _| f.run()).await.unwrap();
        assert_eq!(out.value, "ok");
        assert!((out.cost_usd - 0.05).abs() < 1e-9);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = flaky(10, ExecutorError::transient("503").with_cost(0.01));
        let bounded = Bounded::new("flaky", inner.clone(), ExecutorPolicy::new(1, 1.0));
        let failure = bounded.invoke(|f, _| f.run()).await.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert!((failure.cost_usd - 0.02).abs() < 1e-9);
        assert!(failure.source.is_transient());
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let inner = flaky(10, ExecutorError::permanent("404"));
        let bounded = Bounded::new("flaky", inner.clone(), ExecutorPolicy::new(5, 1.0));
        let failure = bounded.invoke(|f, _| f.run()).await.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ceiling_stops_retries() {
        let inner = flaky(10, ExecutorError::transient("slow").with_cost(0.6));
        let bounded = Bounded::new("flaky", inner.clone(), ExecutorPolicy::new(5, 1.0));
        let failure = bounded.invoke(|f, _| f.run()).await.unwrap_err();
        // 0.6 + 0.6 之后剩余预算 <= 0，第三次尝试不会发生
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(failure.source, ExecutorError::CostCeiling { .. }));
        assert!((failure.cost_usd - 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remaining_budget_passed_to_attempt() {
        let inner = flaky(1, ExecutorError::transient("x").with_cost(0.25));
        let bounded = Bounded::new("flaky", inner, ExecutorPolicy::new(1, 1.0));
        let mut seen = Vec::new();
        bounded
            .invoke(|f, remaining| {
                seen.push(remaining);
                f.run()
            })
            .await
            .unwrap();
        assert_eq!(seen, vec![1.0, 0.75]);
    }
}
