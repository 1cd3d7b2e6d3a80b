use serde::{Deserialize, Serialize};

pub const MB: u64 = 1024 * 1024;
pub const GB: u64 = 1024 * MB;

/// Byte budgets derived once from the process memory quota.
///
/// `app` is a share of `memory`; `index` and `query` are shares of `app`. The two child
/// budgets may overlap: together they are allowed to exceed `app`, which is why admission
/// always checks the combined usage against `app` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    pub memory: u64,
    pub app: u64,
    pub index: u64,
    pub query: u64,
}

impl Quotas {
    pub fn from_ratios(memory: u64, app_ratio: f64, index_ratio: f64, query_ratio: f64) -> Self {
        let (app, index, query) = compute_quotas(memory, app_ratio, index_ratio, query_ratio);
        Self {
            memory,
            app,
            index,
            query,
        }
    }
}

/// Derives `(app, index, query)` byte budgets from a total budget and three ratios.
///
/// Ratios are not validated. Results are truncated toward zero; negative or NaN products
/// become zero and products past `u64::MAX` saturate.
pub fn compute_quotas(
    total: u64,
    app_ratio: f64,
    index_ratio: f64,
    query_ratio: f64,
) -> (u64, u64, u64) {
    let app = scale(total, app_ratio);
    let index = scale(app, index_ratio);
    let query = scale(app, query_ratio);
    (app, index, query)
}

fn scale(bytes: u64, ratio: f64) -> u64 {
    // `as` saturates for floats: NaN -> 0, negative -> 0, overflow -> u64::MAX.
    ((bytes as f64) * ratio) as u64
}

/// Parses a byte count such as `4096`, `512MB`, `1.5GiB` or `2 g`.
///
/// Suffixes are case-insensitive and always binary multiples (`1KB == 1KiB == 1024`).
pub fn parse_byte_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty byte size".to_owned());
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = unit.trim().to_ascii_lowercase();

    let multiplier: u64 = match unit.as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => MB,
        "g" | "gb" | "gib" => GB,
        "t" | "tb" | "tib" => GB * 1024,
        other => return Err(format!("unknown byte size unit `{other}` in {trimmed:?}")),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("byte size {trimmed:?} overflows u64"));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid byte size {trimmed:?}"))?;
    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(format!("byte size {trimmed:?} overflows u64"));
    }
    Ok(bytes as u64)
}
