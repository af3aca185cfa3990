//! Polling execution engine
//!
//! This module drives a probe until its success predicate holds, the call
//! budget is spent, or the deadline passes.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::types::{PollPolicy, StepKind};

use super::classify::{Classify, ErrorKind};
use super::error::PollError;
use super::observer::{NoOpObserver, PollObserver};
use super::strategies::StepStrategy;
use super::truthy::{is_truthy, Truthy};

/// Delay before the second call when none is configured
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Outcome of one probe call, as recorded when collecting values
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<T, E> {
    /// The probe returned a value
    Value(T),

    /// The probe failed with an error from the ignored set
    Ignored(E),
}

impl<T, E> Observed<T, E> {
    /// The returned value, if the call completed
    pub fn value(&self) -> Option<&T> {
        match self {
            Observed::Value(value) => Some(value),
            Observed::Ignored(_) => None,
        }
    }

    /// Take the returned value, if the call completed
    pub fn into_value(self) -> Option<T> {
        match self {
            Observed::Value(value) => Some(value),
            Observed::Ignored(_) => None,
        }
    }

    /// Check if this call failed with an ignored error
    pub fn is_ignored(&self) -> bool {
        matches!(self, Observed::Ignored(_))
    }

    /// Map the ignored error type
    pub fn map_err<F, E2>(self, f: F) -> Observed<T, E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Observed::Value(value) => Observed::Value(value),
            Observed::Ignored(err) => Observed::Ignored(f(err)),
        }
    }
}

/// Successful outcome of a polling run
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T, E> {
    /// The first value the predicate accepted
    Value(T),

    /// Every call's outcome in call order, ending with the accepted value
    Collected(Vec<Observed<T, E>>),
}

impl<T, E> Polled<T, E> {
    /// The accepted value
    pub fn value(&self) -> Option<&T> {
        match self {
            Polled::Value(value) => Some(value),
            Polled::Collected(values) => values.last().and_then(Observed::value),
        }
    }

    /// Take the accepted value
    pub fn into_value(self) -> Option<T> {
        match self {
            Polled::Value(value) => Some(value),
            Polled::Collected(mut values) => values.pop().and_then(Observed::into_value),
        }
    }

    /// Take the collected values
    ///
    /// A run without collection yields the single accepted value.
    pub fn into_values(self) -> Vec<Observed<T, E>> {
        match self {
            Polled::Value(value) => vec![Observed::Value(value)],
            Polled::Collected(values) => values,
        }
    }
}

/// Adapt a probe taking fixed arguments into a zero-argument probe
///
/// Every call receives a fresh clone of `args`.
///
/// # Example
///
/// ```rust
/// use exoscale_polling::{with_args, Poller, ProbeError};
///
/// async fn instance_state(zone: &str, id: &str) -> Result<String, ProbeError> {
///     Ok(format!("running in {zone} ({id})"))
/// }
///
/// # async fn example() {
/// let probe = with_args(
///     ("ch-gva-2".to_string(), "8a3f".to_string()),
///     |(zone, id): (String, String)| async move { instance_state(&zone, &id).await },
/// );
/// let state = Poller::builder().build().poll_truthy(probe).await;
/// # }
/// ```
pub fn with_args<A, F, Fut>(args: A, mut probe: F) -> impl FnMut() -> Fut
where
    A: Clone,
    F: FnMut(A) -> Fut,
{
    move || probe(args.clone())
}

/// Run a probe under a [`PollPolicy`]
///
/// This is a convenience function for one-off runs. For observers or a
/// custom step strategy, use [`PollerBuilder`].
///
/// # Example
///
/// ```rust,no_run
/// use exoscale_polling::poll::equals;
/// use exoscale_polling::{poll_with_policy, PollPolicy, ProbeError};
///
/// async fn example() {
///     let policy = PollPolicy {
///         max_tries: Some(10),
///         ..PollPolicy::default()
///     };
///
///     let state = poll_with_policy(
///         &policy,
///         || async { Ok::<_, ProbeError>("running") },
///         equals("running"),
///     )
///     .await;
/// }
/// ```
pub async fn poll_with_policy<F, Fut, T, E, P>(
    policy: &PollPolicy,
    probe: F,
    success: P,
) -> Result<Polled<T, E>, PollError<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
    P: Fn(&T) -> bool,
{
    Poller::from_policy(policy).poll(probe, success).await
}

/// Builder for configuring a [`Poller`]
///
/// # Example
///
/// ```rust
/// use exoscale_polling::poll::{linear_doubling, ErrorKind, PollerBuilder, TracingObserver};
/// use std::time::Duration;
///
/// let poller = PollerBuilder::new()
///     .with_max_tries(20)
///     .with_timeout(Duration::from_secs(300))
///     .with_step(linear_doubling)
///     .with_max_delay(Duration::from_secs(30))
///     .ignore(ErrorKind::Server)
///     .with_observer(TracingObserver::new("instance-running"))
///     .build();
/// ```
pub struct PollerBuilder<S = StepKind, O = NoOpObserver> {
    max_tries: Option<u32>,
    timeout: Option<Duration>,
    initial_delay: Duration,
    max_delay: Option<Duration>,
    step: S,
    ignore: HashSet<ErrorKind>,
    collect_values: bool,
    jitter: bool,
    observer: O,
}

impl Default for PollerBuilder<StepKind, NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl PollerBuilder<StepKind, NoOpObserver> {
    /// Create a new builder with default settings
    ///
    /// No call budget, no deadline, a constant one-second delay, nothing
    /// ignored and no collection.
    pub fn new() -> Self {
        Self {
            max_tries: None,
            timeout: None,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: None,
            step: StepKind::Constant,
            ignore: HashSet::new(),
            collect_values: false,
            jitter: false,
            observer: NoOpObserver,
        }
    }
}

impl<S, O> PollerBuilder<S, O> {
    /// Apply every setting of a policy, keeping the observer
    ///
    /// The policy's [`StepKind`] replaces the current strategy.
    pub fn with_policy(self, policy: &PollPolicy) -> PollerBuilder<StepKind, O> {
        PollerBuilder {
            max_tries: policy.max_tries,
            timeout: policy.timeout(),
            initial_delay: policy.initial_delay(),
            max_delay: policy.max_delay(),
            step: policy.step,
            ignore: policy.ignore.iter().copied().collect(),
            collect_values: policy.collect_values,
            jitter: policy.jitter,
            observer: self.observer,
        }
    }

    /// Set the call budget
    ///
    /// Zero means unbounded.
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = Some(max_tries);
        self
    }

    /// Set the wall-clock deadline, measured from the start of the run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the delay applied before the second call
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap every delay the step strategy computes
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Set the step strategy
    pub fn with_step<S2>(self, step: S2) -> PollerBuilder<S2, O> {
        PollerBuilder {
            max_tries: self.max_tries,
            timeout: self.timeout,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            step,
            ignore: self.ignore,
            collect_values: self.collect_values,
            jitter: self.jitter,
            observer: self.observer,
        }
    }

    /// Treat probe errors of this kind as unsuccessful calls instead of aborting
    pub fn ignore(mut self, kind: ErrorKind) -> Self {
        self.ignore.insert(kind);
        self
    }

    /// Ignore several error kinds at once
    pub fn ignore_all(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.ignore.extend(kinds);
        self
    }

    /// Return every observed value instead of only the accepted one
    pub fn with_collect_values(mut self, collect_values: bool) -> Self {
        self.collect_values = collect_values;
        self
    }

    /// Enable or disable jitter
    ///
    /// Jitter lengthens each sleep by up to 25%. The delay handed to the step
    /// strategy is never jittered. Disabled by default.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> PollerBuilder<S, O2> {
        PollerBuilder {
            max_tries: self.max_tries,
            timeout: self.timeout,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            step: self.step,
            ignore: self.ignore,
            collect_values: self.collect_values,
            jitter: self.jitter,
            observer,
        }
    }

    /// Build the poller
    pub fn build(self) -> Poller<S, O> {
        Poller {
            max_tries: self.max_tries.filter(|&n| n > 0),
            timeout: self.timeout,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            step: self.step,
            ignore: self.ignore,
            collect_values: self.collect_values,
            jitter: self.jitter,
            observer: self.observer,
        }
    }
}

/// A configured polling engine
///
/// A `Poller` holds configuration only; every call to [`Poller::poll`] is an
/// independent run, so one poller can drive concurrent runs.
pub struct Poller<S = StepKind, O = NoOpObserver> {
    max_tries: Option<u32>,
    timeout: Option<Duration>,
    initial_delay: Duration,
    max_delay: Option<Duration>,
    step: S,
    ignore: HashSet<ErrorKind>,
    collect_values: bool,
    jitter: bool,
    observer: O,
}

impl Poller<StepKind, NoOpObserver> {
    /// Create a builder with default settings
    pub fn builder() -> PollerBuilder<StepKind, NoOpObserver> {
        PollerBuilder::new()
    }

    /// Create a poller from a policy
    pub fn from_policy(policy: &PollPolicy) -> Self {
        PollerBuilder::new().with_policy(policy).build()
    }
}

impl<S, O> Poller<S, O>
where
    S: StepStrategy,
    O: PollObserver,
{
    /// The call budget, if bounded
    pub fn max_tries(&self) -> Option<u32> {
        self.max_tries
    }

    /// The deadline, if bounded
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Check if errors of this kind are retried
    pub fn ignores(&self, kind: ErrorKind) -> bool {
        self.ignore.contains(&kind)
    }

    /// Run the probe until `success` accepts its value
    ///
    /// The first call happens immediately. After every unsuccessful call the
    /// call budget is checked, then the deadline, then the run sleeps for the
    /// current delay and asks the step strategy for the next one.
    ///
    /// # Returns
    ///
    /// [`Polled::Value`] with the accepted value, or [`Polled::Collected`]
    /// with every call's outcome when collection is enabled.
    ///
    /// # Errors
    ///
    /// - [`PollError::MaxCallsExceeded`] once `max_tries` calls were made
    /// - [`PollError::Timeout`] once the elapsed time exceeds `timeout`
    /// - [`PollError::Probe`] as soon as the probe fails with an error whose
    ///   kind is not ignored
    pub async fn poll<F, Fut, T, E, P>(
        &self,
        mut probe: F,
        success: P,
    ) -> Result<Polled<T, E>, PollError<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        P: Fn(&T) -> bool,
    {
        let start = Instant::now();
        let mut delay = self.initial_delay;
        let mut calls: u32 = 0;
        let mut values: Option<Vec<Observed<T, E>>> = self.collect_values.then(Vec::new);

        loop {
            let call = calls.saturating_add(1);
            self.observer.on_call_start(call, self.max_tries);

            match probe().await {
                Ok(value) => {
                    if success(&value) {
                        self.observer.on_success(call, start.elapsed());
                        return Ok(match values {
                            Some(mut values) => {
                                values.push(Observed::Value(value));
                                Polled::Collected(values)
                            }
                            None => Polled::Value(value),
                        });
                    }
                    if let Some(values) = values.as_mut() {
                        values.push(Observed::Value(value));
                    }
                }
                Err(err) => {
                    let kind = err.kind();
                    if !self.ignore.contains(&kind) {
                        self.observer.on_aborted(call, kind, &err);
                        return Err(PollError::Probe(err));
                    }
                    self.observer.on_ignored_error(call, kind, &err);
                    if let Some(values) = values.as_mut() {
                        values.push(Observed::Ignored(err));
                    }
                }
            }

            calls = call;

            if let Some(max_tries) = self.max_tries {
                if calls >= max_tries {
                    let elapsed = start.elapsed();
                    self.observer.on_max_calls_exceeded(calls, elapsed);
                    return Err(PollError::max_calls_exceeded(calls, elapsed, values));
                }
            }

            let elapsed = start.elapsed();
            if let Some(timeout) = self.timeout {
                if elapsed > timeout {
                    self.observer.on_timeout(calls, elapsed);
                    return Err(PollError::timeout(elapsed, calls, values));
                }
            }

            let pause = self.jittered(delay);
            self.observer.on_retry(calls, pause, elapsed);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            delay = self.capped(self.step.next_delay(delay, calls));
        }
    }

    /// Run the probe until it returns a truthy value
    pub async fn poll_truthy<F, Fut, T, E>(&self, probe: F) -> Result<Polled<T, E>, PollError<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        T: Truthy,
    {
        self.poll(probe, |value: &T| is_truthy(value)).await
    }

    fn capped(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let range_ms = (delay.as_millis() / 4) as u64;
        if range_ms == 0 {
            return delay;
        }
        let jitter_ms = rand::rng().random_range(0..=range_ms);
        delay.saturating_add(Duration::from_millis(jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::observer::StatsObserver;
    use crate::poll::strategies::linear_doubling;
    use crate::poll::ProbeError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_builder() -> PollerBuilder {
        PollerBuilder::new().with_initial_delay(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success() {
        let observer = Arc::new(StatsObserver::new());
        let start = Instant::now();

        let result: Result<_, PollError<&str, ProbeError>> = quick_builder()
            .with_max_tries(3)
            .with_observer(observer.clone())
            .build()
            .poll(|| async { Ok("running") }, |state| *state == "running")
            .await;

        assert!(matches!(result, Ok(Polled::Value("running"))));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(observer.call_starts(), 1);
        assert_eq!(observer.successes(), 1);
        assert_eq!(observer.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_unsatisfied_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = quick_builder()
            .with_max_tries(5)
            .build()
            .poll_truthy(|| {
                let calls = calls_clone.clone();
                async move {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok::<_, ProbeError>(if call < 3 { 0 } else { 7 })
                }
            })
            .await;

        assert_eq!(result.unwrap().into_value(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_tries_exact() {
        let observer = Arc::new(StatsObserver::new());

        let result = quick_builder()
            .with_max_tries(4)
            .with_observer(observer.clone())
            .build()
            .poll_truthy(|| async { Ok::<_, ProbeError>(false) })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_max_calls_exceeded());
        assert_eq!(err.calls(), Some(4));
        assert!(err.values().is_none());
        assert_eq!(observer.call_starts(), 4);
        assert_eq!(observer.retries(), 3);
        assert_eq!(observer.max_calls_exceeded(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_tries_is_unbounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let poller = quick_builder().with_max_tries(0).build();
        assert_eq!(poller.max_tries(), None);

        let result = poller
            .poll_truthy(|| {
                let calls = calls_clone.clone();
                async move { Ok::<_, ProbeError>(calls.fetch_add(1, Ordering::SeqCst) >= 9) }
            })
            .await;

        assert_eq!(result.unwrap().into_value(), Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_before_first_call() {
        let start = Instant::now();
        let first_call_at = Arc::new(std::sync::Mutex::new(None));
        let first_call_clone = first_call_at.clone();

        let _ = PollerBuilder::new()
            .with_initial_delay(Duration::from_secs(5))
            .with_max_tries(1)
            .build()
            .poll_truthy(|| {
                first_call_clone
                    .lock()
                    .unwrap()
                    .get_or_insert_with(|| start.elapsed());
                async { Ok::<_, ProbeError>(0) }
            })
            .await;

        assert_eq!(*first_call_at.lock().unwrap(), Some(Duration::ZERO));
        // The budget ran out after the only call, so no sleep happened.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_doubling_with_cap() {
        let start = Instant::now();

        let result = PollerBuilder::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_step(linear_doubling)
            .with_max_delay(Duration::from_secs(3))
            .with_max_tries(5)
            .build()
            .poll_truthy(|| async { Ok::<_, ProbeError>(None::<u8>) })
            .await;

        assert!(result.unwrap_err().is_max_calls_exceeded());
        // Sleeps of 1s, 2s, 3s (capped from 4s) and 3s.
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    #[test]
    fn test_jitter_bounds() {
        let poller = PollerBuilder::new().with_jitter(true).build();
        let delay = Duration::from_millis(1000);

        for _ in 0..200 {
            let pause = poller.jittered(delay);
            assert!(pause >= delay);
            assert!(pause <= Duration::from_millis(1250));
        }
        assert_eq!(poller.jittered(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_jitter_disabled_by_default() {
        let poller = PollerBuilder::new().build();
        assert_eq!(
            poller.jittered(Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_with_args_clones_per_call() {
        let mut probe = with_args(vec![1, 2], |mut args: Vec<i32>| {
            args.push(3);
            std::future::ready(args)
        });

        // Each call starts from the original arguments.
        let first = probe();
        let second = probe();
        assert_eq!(first.into_inner(), vec![1, 2, 3]);
        assert_eq!(second.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_polled_accessors() {
        let polled: Polled<u8, ProbeError> = Polled::Collected(vec![
            Observed::Ignored(ProbeError::server("503")),
            Observed::Value(0),
            Observed::Value(5),
        ]);
        assert_eq!(polled.value(), Some(&5));
        assert_eq!(polled.into_value(), Some(5));

        let polled: Polled<u8, ProbeError> = Polled::Value(9);
        let values = polled.into_values();
        assert_eq!(values.len(), 1);
        assert!(matches!(values[0], Observed::Value(9)));
    }
}
