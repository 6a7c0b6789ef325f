//! Progress spinner that becomes no-op when the `progress` feature is disabled

use crate::construction::ConstructionStep;
use std::time::Duration;

#[cfg(feature = "progress")]
pub use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progress"))]
pub use self::noop::*;

#[cfg(not(feature = "progress"))]
mod noop {
    use std::time::Duration;

    /// No-op progress bar when `progress` feature is disabled
    #[derive(Clone)]
    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new_spinner() -> Self {
            ProgressBar
        }

        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn set_message(&self, _msg: impl Into<std::borrow::Cow<'static, str>>) {}
        pub fn enable_steady_tick(&self, _interval: Duration) {}
        pub fn finish_and_clear(&self) {}
    }

    /// No-op progress style
    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn default_spinner() -> Self {
            ProgressStyle
        }

        pub fn template(self, _template: &str) -> Result<Self, std::convert::Infallible> {
            Ok(self)
        }
    }
}

/// Spinner for a build, ticking until finished
pub fn build_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub fn step_message(step: ConstructionStep) -> &'static str {
    match step {
        ConstructionStep::Construct => "Constructing and merging preindexes...",
        ConstructionStep::Finalize => "Writing final index...",
        ConstructionStep::Finished => "Done",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_messages_differ() {
        assert_ne!(
            step_message(ConstructionStep::Construct),
            step_message(ConstructionStep::Finalize)
        );
    }
}
