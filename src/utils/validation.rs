use crate::error::{AppError, AppResult};

pub const MAX_TITLE_LEN: usize = 200;

pub fn validate_qty(qty: i32) -> AppResult<()> {
    if qty < 1 {
        return Err(AppError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// `price_cents × qty` with overflow reported as a validation error.
pub fn line_total_cents(price_cents: i64, qty: i32) -> AppResult<i64> {
    price_cents
        .checked_mul(i64::from(qty))
        .ok_or_else(|| AppError::ValidationError("Line total is too large".to_string()))
}

pub fn checked_sum_cents<I: IntoIterator<Item = i64>>(values: I) -> AppResult<i64> {
    values.into_iter().try_fold(0i64, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| AppError::ValidationError("Total is too large".to_string()))
    })
}

pub fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::ValidationError("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::ValidationError(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(20).clamp(1, 100)
}
