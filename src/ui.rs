// Terminal feedback for the single run: a spinner while the pipeline is
// busy, then a one-line summary. indicatif hides the spinner when stderr is
// not a terminal, so cron runs stay quiet. Progress lines from the logger
// share stderr with the spinner, so the spinner only runs when this crate's
// `info!` output is filtered out.

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{log_enabled, Level};

use crate::api::WallPost;

/// Run `work` behind a spinner showing `message`.
pub fn with_spinner<T, F>(message: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    if !spinner_wanted() {
        return work();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let result = work();
    spinner.finish_and_clear();
    result
}

/// True unless the logger already reports pipeline progress at `info`.
pub fn spinner_wanted() -> bool {
    !log_enabled!(target: "xkcd_vk_poster", Level::Info)
}

pub fn summary(post: &WallPost) -> String {
    format!("Published wall post {}", post.post_id)
}
