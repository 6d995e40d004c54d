use std::borrow::Cow;

use indicatif::{ProgressBar, ProgressStyle};

/// Индикатор прогресса в стиле `сообщение: [####    ] 10/100`
pub(crate) fn progress_bar(len: usize, message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg}: {wide_bar} {pos}/{len} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar
}
