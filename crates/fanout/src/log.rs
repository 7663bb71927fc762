//! Progress presentation for long running distributions.
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::style::ProgressStyle;

/// Style a span as a bar counting reported entries.
///
/// The length grows with [`grow_bar`] as deferred entries are issued.
pub fn set_bar(span: &Span, msg: &str, len: u64) {
    let style = ProgressStyle::with_template(
        "{elapsed} ░ {prefix} ░ {bar:30.green/black} {pos}/{len} ░ {msg}",
    )
    .unwrap_or(ProgressStyle::default_bar())
    .progress_chars("█▒ ");
    span.pb_set_style(&style);
    span.pb_set_message(msg);
    span.pb_set_length(len);
}

/// Account for entries issued after the bar was created.
pub fn grow_bar(span: &Span, by: u64) {
    if by > 0 {
        span.pb_inc_length(by);
    }
}

/// Advance the bar by one reported entry.
pub fn tick(span: &Span) {
    span.pb_inc(1);
}
