//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash for main.css.
///
/// The hash is computed at build time from the CSS file content.
///
/// Usage in templates: `{{ ""|css_hash }}`
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Returns the content hash for cart.js.
///
/// Usage in templates: `{{ ""|js_hash }}`
#[askama::filter_fn]
pub fn js_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("JS_HASH"))
}

/// Badge class for an order status.
///
/// Usage in templates: `{{ order.status|status_class }}`
#[askama::filter_fn]
pub fn status_class(status: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(badge_for(&status.to_string()))
}

fn badge_for(status: &str) -> &'static str {
    match status {
        "Submitted" => "badge badge-info",
        "Processing" => "badge badge-warning",
        "PROCESSED" | "Completed" => "badge badge-success",
        "Cancelled" => "badge badge-danger",
        _ => "badge",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_for_status() {
        assert_eq!(badge_for("PROCESSED"), "badge badge-success");
        assert_eq!(badge_for("Cancelled"), "badge badge-danger");
        assert_eq!(badge_for("Unknown"), "badge");
    }
}
