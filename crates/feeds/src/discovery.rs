//! Symbol discovery.
//!
//! Fetches the spot symbol list from Binance and keeps the pairs quoted in
//! the configured assets.

use crate::FetchError;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Suffixes marking leveraged tokens, which are never monitored.
const LEVERAGED_SUFFIXES: [&str; 4] = ["UP", "DOWN", "BEAR", "BULL"];

/// Spot symbol as listed by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExchangeSymbol {
    pub symbol: String,
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
    pub status: String,
}

impl ExchangeSymbol {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }

    pub fn is_leveraged(&self) -> bool {
        LEVERAGED_SUFFIXES
            .iter()
            .any(|suffix| self.base_asset.len() > suffix.len() && self.base_asset.ends_with(suffix))
    }
}

/// Keep trading, non-leveraged symbols quoted in one of `quote_assets`,
/// grouped by quote asset in the given order.
pub fn filter_symbols(symbols: &[ExchangeSymbol], quote_assets: &[String]) -> Vec<String> {
    quote_assets
        .iter()
        .flat_map(|quote| {
            symbols.iter().filter(move |s| {
                s.quote_asset.eq_ignore_ascii_case(quote) && s.is_trading() && !s.is_leveraged()
            })
        })
        .map(|s| s.symbol.clone())
        .collect()
}

/// Symbol discovery client.
pub struct SymbolDiscovery {
    client: reqwest::Client,
    base_url: String,
}

impl SymbolDiscovery {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch all listed spot symbols.
    pub async fn fetch_exchange_symbols(&self) -> Result<Vec<ExchangeSymbol>, FetchError> {
        #[derive(Debug, Deserialize)]
        struct ExchangeInfo {
            symbols: Vec<ExchangeSymbol>,
        }

        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(FetchError::Network(format!("HTTP {}", response.status())));
        }

        let info: ExchangeInfo = response.json().await?;
        Ok(info.symbols)
    }

    /// Fetch the monitored symbol set for the given quote assets.
    pub async fn fetch_symbols(&self, quote_assets: &[String]) -> Result<Vec<String>, FetchError> {
        let all = self.fetch_exchange_symbols().await?;
        let symbols = filter_symbols(&all, quote_assets);
        debug!(
            listed = all.len(),
            selected = symbols.len(),
            "Binance: discovered symbols"
        );
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sym(base: &str, quote: &str, status: &str) -> ExchangeSymbol {
        ExchangeSymbol {
            symbol: format!("{}{}", base, quote),
            base_asset: base.to_string(),
            quote_asset: quote.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_filter_symbols() {
        let listed = vec![
            sym("ETH", "BTC", "TRADING"),
            sym("SOL", "USDC", "TRADING"),
            sym("BTCUP", "USDC", "TRADING"),
            sym("XRPBEAR", "USDC", "TRADING"),
            sym("OLD", "USDC", "BREAK"),
            sym("DOGE", "USDT", "TRADING"),
            sym("SUPER", "USDC", "TRADING"),
        ];

        let quotes = vec!["USDC".to_string(), "BTC".to_string()];
        assert_eq!(
            filter_symbols(&listed, &quotes),
            vec!["SOLUSDC", "SUPERUSDC", "ETHBTC"]
        );
    }

    #[test]
    fn test_bare_suffix_is_not_leveraged() {
        // a base asset that *is* the suffix is a real token
        assert!(!sym("UP", "USDC", "TRADING").is_leveraged());
        assert!(sym("ETHDOWN", "USDC", "TRADING").is_leveraged());
    }

    #[test]
    fn test_deserialize_exchange_symbol() {
        let raw = r#"{
            "symbol": "BTCUSDC",
            "baseAsset": "BTC",
            "quoteAsset": "USDC",
            "status": "TRADING",
            "filters": []
        }"#;
        let parsed: ExchangeSymbol = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, sym("BTC", "USDC", "TRADING"));
    }
}
