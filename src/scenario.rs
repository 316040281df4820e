use std::{future::Future, marker::PhantomData};

use typed_builder::TypedBuilder;

use crate::{metric::ActionOutput, settings::Settings};

/// Everything a single run needs: a name, the action under load and the load shape.
///
/// The action is a zero-argument closure returning a future. It is cloned
/// into every worker, so anything expensive (clients, pools) should be built
/// once outside and captured by reference-counted handle.
///
/// ```
/// use std::time::Duration;
/// use volley::{ExecutionPlan, Settings};
///
/// let plan = ExecutionPlan::builder()
///     .name("ping")
///     .action(|| async { true })
///     .settings(
///         Settings::builder()
///             .concurrency(5)
///             .duration(Duration::from_secs(2))
///             .interval(Duration::from_millis(200))
///             .build(),
///     )
///     .build();
/// assert_eq!(plan.name, "ping");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ExecutionPlan<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    #[builder(setter(into))]
    pub name: String,
    pub action: F,
    pub settings: Settings,
    #[builder(default, setter(skip))]
    output: PhantomData<fn() -> Fut>,
}

impl<F, Fut> ExecutionPlan<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    pub fn new(name: impl Into<String>, settings: Settings, action: F) -> Self {
        Self {
            name: name.into(),
            action,
            settings,
            output: PhantomData,
        }
    }

    pub(crate) fn into_parts(self) -> (String, Settings, F) {
        (self.name, self.settings, self.action)
    }
}
