//! Alert message rendering (Telegram HTML).

use chrono::{DateTime, Utc};
use volume_core::{AlertLevel, VolumeObservation};

/// Quote assets with a dedicated Binance trade page form (`BASE_QUOTE`).
const TRADE_PAGE_QUOTES: [&str; 2] = ["USDC", "BTC"];

/// Format price with appropriate precision based on magnitude.
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "0".to_string();
    }
    let abs_price = price.abs();
    if abs_price >= 1000.0 {
        format!("{:.2}", price)
    } else if abs_price >= 1.0 {
        format!("{:.4}", price)
    } else if abs_price >= 0.01 {
        format!("{:.6}", price)
    } else {
        format!("{:.8}", price)
    }
}

/// Format a volume with thousands separators and two decimals.
pub fn format_volume(volume: f64) -> String {
    if !volume.is_finite() {
        return volume.to_string();
    }
    let fixed = format!("{:.2}", volume.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if volume < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn tradingview_url(symbol: &str) -> String {
    format!("https://www.tradingview.com/symbols/{symbol}/?exchange=BINANCE")
}

/// Binance spot trade page. Known quotes use the `BASE_QUOTE` path form.
pub fn binance_trade_url(symbol: &str) -> String {
    for quote in TRADE_PAGE_QUOTES {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return format!("https://www.binance.com/en/trade/{base}_{quote}");
            }
        }
    }
    format!("https://www.binance.com/en/trade/{symbol}")
}

/// Render a volume alert.
pub fn format_alert_message(
    observation: &VolumeObservation,
    level: &AlertLevel,
    now: DateTime<Utc>,
) -> String {
    let symbol = escape_html(&observation.symbol);
    let ratio = observation
        .ratio()
        .map(|r| format!("{:.2}x", r))
        .unwrap_or_else(|| "n/a".to_string());

    let mut msg = format!(
        "🚨 <b>Volume Alert - {}</b> 🚨\n\n\
         <b>Level:</b> {}\n\
         <b>Ratio:</b> {}\n\
         📊 <b>Current Volume:</b> {}\n\
         📈 <b>Baseline Mean Volume:</b> {}",
        symbol,
        escape_html(&level.id),
        ratio,
        format_volume(observation.current_volume),
        format_volume(observation.baseline_mean_volume),
    );

    if let Some(recent) = observation.recent {
        msg.push_str(&format!(
            "\n🕐 <b>Last 1h Volume:</b> {}\n\
             🕒 <b>Last 2h Volume:</b> {}\n\
             🕓 <b>Last 4h Volume:</b> {}",
            format_volume(recent.last_1h),
            format_volume(recent.last_2h),
            format_volume(recent.last_4h),
        ));
    }

    msg.push_str(&format!(
        "\n💹 <b>Open/Close:</b> {} → {}",
        format_price(observation.open_price),
        format_price(observation.close_price),
    ));

    msg.push_str(&format!(
        "\n\n<a href=\"{}\">Chart</a> | <a href=\"{}\">Trade</a>",
        escape_html(&tradingview_url(&observation.symbol)),
        escape_html(&binance_trade_url(&observation.symbol)),
    ));

    msg.push_str(&format!("\n\n⏰ {}", now.format("%Y-%m-%d %H:%M:%S UTC")));

    msg
}

/// Render the escalation summary for a cycle with delivery failures.
pub fn format_degraded_message(failed: &[(String, String)], now: DateTime<Utc>) -> String {
    let mut msg = format!(
        "⚠️ <b>Alert delivery degraded</b>\n\n{} alert(s) could not be delivered:",
        failed.len()
    );
    for (symbol, reason) in failed {
        msg.push_str(&format!(
            "\n• <b>{}</b>: {}",
            escape_html(symbol),
            escape_html(reason)
        ));
    }
    msg.push_str(&format!("\n\n⏰ {}", now.format("%Y-%m-%d %H:%M:%S UTC")));
    msg
}
