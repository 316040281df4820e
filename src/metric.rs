use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a single invocation of the action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The action completed and reported success.
    Success,
    /// The action completed but reported failure (for example returned `false`).
    Failure,
    /// The action returned an error or panicked.
    Error,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        matches!(self, Verdict::Success)
    }
}

/// Conversion from whatever the action resolves to into a [`Verdict`].
///
/// Implemented for the shapes an action usually has:
///
/// - `()` is always a success,
/// - `bool` is an explicit success/failure,
/// - `Result<T, E>` is an error on `Err` and defers to `T` on `Ok`.
///
/// ```
/// use volley::metric::{ActionOutput, Verdict};
///
/// assert_eq!(().verdict(), Verdict::Success);
/// assert_eq!(false.verdict(), Verdict::Failure);
/// assert_eq!(Ok::<bool, String>(true).verdict(), Verdict::Success);
/// assert_eq!(Err::<(), _>("boom").verdict(), Verdict::Error);
/// ```
pub trait ActionOutput: Send {
    fn verdict(&self) -> Verdict;
}

impl ActionOutput for () {
    fn verdict(&self) -> Verdict {
        Verdict::Success
    }
}

impl ActionOutput for bool {
    fn verdict(&self) -> Verdict {
        if *self {
            Verdict::Success
        } else {
            Verdict::Failure
        }
    }
}

impl<T, E> ActionOutput for Result<T, E>
where
    T: ActionOutput,
    E: Send,
{
    fn verdict(&self) -> Verdict {
        match self {
            Ok(inner) => inner.verdict(),
            Err(_) => Verdict::Error,
        }
    }
}

/// The measurement produced for one work item.
///
/// Outcomes are folded into the collector's aggregate state and dropped;
/// they are never attributed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub verdict: Verdict,
    /// Time spent inside the action. Zero when the action errored.
    pub execution_latency: Duration,
    /// Time between scheduling and the start of processing.
    pub queue_delay: Duration,
}

impl Outcome {
    /// Builds an outcome, zeroing the latency of errored invocations.
    pub fn new(verdict: Verdict, execution_latency: Duration, queue_delay: Duration) -> Self {
        let execution_latency = match verdict {
            Verdict::Error => Duration::ZERO,
            _ => execution_latency,
        };
        Self {
            verdict,
            execution_latency,
            queue_delay,
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_success()
    }
}
