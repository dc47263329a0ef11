// Display helpers shared by the normalizer, facets and the CLI output
use chrono::{Duration, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// 150 -> "2h 30m", 120 -> "2h", 45 -> "45m", 0 -> "0m"
pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;

    if hours == 0 {
        format!("{}m", mins)
    } else if mins == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, mins)
    }
}

pub fn stops_label(stops: usize) -> String {
    match stops {
        0 => "Nonstop".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{} stops", n),
    }
}

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

// Whole units with thousands separators, e.g. 1250.4 USD -> "$1,250"
pub fn format_price(amount: f64, currency: &str) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0 { "-" } else { "" };
    match currency_symbol(currency) {
        Some(symbol) => format!("{}{}{}", sign, symbol, grouped),
        None => format!("{}{} {}", sign, currency, grouped),
    }
}

// Shift a YYYY-MM-DD date by a number of days; None if the input is not a date
pub fn add_days(date: &str, days: i64) -> Option<String> {
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    let shifted = parsed.checked_add_signed(Duration::days(days))?;
    Some(shifted.format(DATE_FORMAT).to_string())
}
