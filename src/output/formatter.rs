use crate::model::TokenPrice;
use crate::paper_trading::ledger::ClosedTrade;
use serde_json::json;
use std::fmt;

/// Output format options for displaying price and trade data
#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// Compact single-line format
    Compact,
}

/// Formatter for displaying fused prices and simulated fills
pub struct OutputFormatter {
    format: OutputFormat,
    show_timestamps: bool,
    precision: usize,
}

impl OutputFormatter {
    /// Create new formatter with specified format
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            show_timestamps: true,
            precision: 8,
        }
    }

    /// Create formatter with custom settings
    pub fn with_settings(format: OutputFormat, show_timestamps: bool, precision: usize) -> Self {
        Self {
            format,
            show_timestamps,
            precision,
        }
    }

    /// Format a fused token price for display
    pub fn format_price(&self, price: &TokenPrice) -> String {
        match self.format {
            OutputFormat::Table => self.format_price_table(price),
            OutputFormat::Json => self.format_price_json(price),
            OutputFormat::Compact => self.format_price_compact(price),
        }
    }

    fn format_price_table(&self, price: &TokenPrice) -> String {
        let mut output = String::new();

        output.push_str("TOKEN PRICE\n");
        output.push_str("=".repeat(40).as_str());
        output.push('\n');

        output.push_str(&format!("Mint:         {}\n", price.mint));
        output.push_str(&format!(
            "Price (SOL):  {:.prec$}\n",
            price.price_sol,
            prec = self.precision
        ));

        if let Some(price_usd) = price.price_usd {
            output.push_str(&format!("Price (USD):  {:.2}\n", price_usd));
        }

        output.push_str(&format!("Source tier:  {:?}\n", price.source_tier));
        output.push_str(&format!("Confidence:   {:.2}\n", price.confidence));

        if let Some(pool) = price.best_pool {
            output.push_str(&format!("Best pool:    {}\n", pool));
        }

        if self.show_timestamps {
            output.push_str(&format!("Age:          {}ms\n", price.computed_at.age_ms()));
        }

        output.push_str("=".repeat(40).as_str());
        output
    }

    fn format_price_json(&self, price: &TokenPrice) -> String {
        let mut json_obj = json!({
            "type": "token_price",
            "mint": price.mint.to_string(),
            "price_sol": price.price_sol.to_string(),
            "price_usd": price.price_usd.map(|p| p.to_string()),
            "best_pool": price.best_pool.map(|p| p.to_string()),
            "source_tier": format!("{:?}", price.source_tier),
            "confidence": price.confidence.to_string(),
        });

        if self.show_timestamps {
            if let serde_json::Value::Object(ref mut map) = json_obj {
                map.insert("age_ms".to_string(), json!(price.computed_at.age_ms()));
            }
        }

        serde_json::to_string_pretty(&json_obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_price_compact(&self, price: &TokenPrice) -> String {
        format!(
            "{}: {:.prec$} SOL ({:?}, conf {:.2})",
            price.mint,
            price.price_sol,
            price.source_tier,
            price.confidence,
            prec = self.precision
        )
    }

    /// Format a simulated trade close for display
    pub fn format_closed_trade(&self, trade: &ClosedTrade) -> String {
        match self.format {
            OutputFormat::Table => self.format_closed_trade_table(trade),
            OutputFormat::Json => self.format_closed_trade_json(trade),
            OutputFormat::Compact => self.format_closed_trade_compact(trade),
        }
    }

    fn format_closed_trade_table(&self, trade: &ClosedTrade) -> String {
        let mut output = String::new();

        output.push_str("SIMULATED TRADE CLOSED\n");
        output.push_str("-".repeat(40).as_str());
        output.push('\n');

        output.push_str(&format!("Mint:       {}\n", trade.mint));
        output.push_str(&format!(
            "Entry:      {:.prec$} SOL\n",
            trade.entry_price_sol,
            prec = self.precision
        ));
        output.push_str(&format!(
            "Exit:       {:.prec$} SOL\n",
            trade.exit_price_sol,
            prec = self.precision
        ));
        output.push_str(&format!(
            "Realized:   {:.prec$} SOL\n",
            trade.realized_pnl_sol,
            prec = self.precision
        ));
        output.push_str(&format!("Reason:     {:?}\n", trade.reason));

        output.push_str("-".repeat(40).as_str());
        output
    }

    fn format_closed_trade_json(&self, trade: &ClosedTrade) -> String {
        let json_obj = json!({
            "type": "simulated_trade_closed",
            "mint": trade.mint.to_string(),
            "entry_price_sol": trade.entry_price_sol.to_string(),
            "exit_price_sol": trade.exit_price_sol.to_string(),
            "realized_pnl_sol": trade.realized_pnl_sol.to_string(),
            "reason": format!("{:?}", trade.reason),
        });

        serde_json::to_string_pretty(&json_obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_closed_trade_compact(&self, trade: &ClosedTrade) -> String {
        format!(
            "{}: {:.prec$} -> {:.prec$} SOL, pnl {:.prec$} SOL ({:?})",
            trade.mint,
            trade.entry_price_sol,
            trade.exit_price_sol,
            trade.realized_pnl_sol,
            trade.reason,
            prec = self.precision
        )
    }

    /// Format a "nothing yet" message for a mint with no price available
    pub fn format_no_price(&self, mint: &crate::model::Mint) -> String {
        match self.format {
            OutputFormat::Table => format!("No price available for {}\n{}", mint, "-".repeat(40)),
            OutputFormat::Json => json!({
                "type": "no_price",
                "mint": mint.to_string(),
            })
            .to_string(),
            OutputFormat::Compact => format!("No price: {}", mint),
        }
    }

    /// Format error message
    pub fn format_error(&self, error: &str) -> String {
        match self.format {
            OutputFormat::Table => format!("ERROR: {}\n{}", error, "!".repeat(error.len() + 7)),
            OutputFormat::Json => {
                let json_obj = json!({
                    "type": "error",
                    "message": error,
                });
                serde_json::to_string_pretty(&json_obj).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Compact => format!("ERROR: {}", error),
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Compact => write!(f, "compact"),
        }
    }
}
