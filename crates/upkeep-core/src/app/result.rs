//! ResultAggregator - 呼び出しごとの結果集計
//!
//! チェック呼び出しごとに 1 つ作り、ワーカーのコールバックと共有する。呼び出しが戻ったら破棄。

use parking_lot::Mutex;

use crate::observability::RunStats;

struct Inner<T, E> {
    successes: usize,
    failures: usize,
    last_err: Option<E>,
    values: Vec<T>,
}

/// Mutex で守ったバッチカウンタと結果
///
/// カウンタはキー数ではなくバッチ数。
pub struct ResultAggregator<T, E> {
    inner: Mutex<Inner<T, E>>,
}

impl<T: Clone, E: Clone> ResultAggregator<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                successes: 0,
                failures: 0,
                last_err: None,
                values: Vec::new(),
            }),
        }
    }

    pub fn add_successes(&self, n: usize) {
        self.inner.lock().successes += n;
    }

    pub fn add_failures(&self, n: usize) {
        self.inner.lock().failures += n;
    }

    /// 直近のエラーを記録（上書き）
    pub fn set_err(&self, err: E) {
        self.inner.lock().last_err = Some(err);
    }

    pub fn add(&self, value: T) {
        self.inner.lock().values.push(value);
    }

    pub fn successes(&self) -> usize {
        self.inner.lock().successes
    }

    pub fn failures(&self) -> usize {
        self.inner.lock().failures
    }

    pub fn total(&self) -> usize {
        let inner = self.inner.lock();
        inner.successes + inner.failures
    }

    /// `successes / total`（total が 0 なら 0）
    pub fn success_rate(&self) -> f64 {
        let inner = self.inner.lock();
        rate(inner.successes, inner.successes + inner.failures)
    }

    /// `failures / total`（total が 0 なら 0）
    pub fn failure_rate(&self) -> f64 {
        let inner = self.inner.lock();
        rate(inner.failures, inner.successes + inner.failures)
    }

    pub fn err(&self) -> Option<E> {
        self.inner.lock().last_err.clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.inner.lock().values.clone()
    }

    /// 結果を取り出して空にする
    pub fn take_values(&self) -> Vec<T> {
        std::mem::take(&mut self.inner.lock().values)
    }
}

impl<T: Clone, E: Clone + std::fmt::Display> ResultAggregator<T, E> {
    /// カウンタの一貫したスナップショット
    pub fn stats(&self) -> RunStats {
        let inner = self.inner.lock();
        let total = inner.successes + inner.failures;
        RunStats {
            successes: inner.successes,
            failures: inner.failures,
            success_rate: rate(inner.successes, total),
            failure_rate: rate(inner.failures, total),
            values: inner.values.len(),
            cache_hits: 0,
            last_error: inner.last_err.as_ref().map(ToString::to_string),
        }
    }
}

impl<T: Clone, E: Clone> Default for ResultAggregator<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
