use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

use crate::error::{JournalError, Result};
use crate::models::{EntryPatch, TradeRecord, WeekStats};
use crate::store::EntryStore;
use crate::week::{self, WeekKey};

const TIME_ALIASES: &[&str] = &["time", "open time", "time open", "date"];
const SYMBOL_ALIASES: &[&str] = &["symbol", "item", "instrument"];
const TYPE_ALIASES: &[&str] = &["type", "side", "direction"];
const VOLUME_ALIASES: &[&str] = &["volume", "lots", "size"];
const PROFIT_ALIASES: &[&str] = &["profit", "p/l", "p-l", "pnl", "p&l"];

/// Outcome of parsing a trade log, before week filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTradeLog {
    pub trades: Vec<TradeRecord>,
    /// Data rows dropped because their time could not be read
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeImportSummary {
    pub week: WeekKey,
    /// Rows parsed from the file, any week
    pub parsed: usize,
    pub skipped_rows: usize,
    pub stats: WeekStats,
    pub trades: Vec<TradeRecord>,
}

impl TradeImportSummary {
    pub fn message(&self) -> String {
        format!(
            "Imported {} trades for {} (PnL {:.2})",
            self.stats.number_of_trades, self.week, self.stats.pnl
        )
    }
}

/// User-facing notice for an import attempt
pub fn import_message(result: &Result<TradeImportSummary>) -> String {
    match result {
        Ok(summary) => summary.message(),
        Err(e) => format!("Import failed: {}", e),
    }
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    time: usize,
    symbol: Option<usize>,
    trade_type: Option<usize>,
    lots: Option<usize>,
    profit: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self> {
        let cells: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

        let time = find_column(&cells, TIME_ALIASES)
            .ok_or_else(|| JournalError::FormatError("missing Time column".to_string()))?;

        Ok(Self {
            time,
            symbol: find_column(&cells, SYMBOL_ALIASES),
            trade_type: find_column(&cells, TYPE_ALIASES),
            lots: find_column(&cells, VOLUME_ALIASES),
            profit: find_column(&cells, PROFIT_ALIASES),
        })
    }
}

fn find_column(cells: &[String], aliases: &[&str]) -> Option<usize> {
    cells.iter().position(|cell| aliases.contains(&cell.as_str()))
}

/// Broker timestamp forms, tried before the generic fallback
struct TimeParser {
    year_first: Regex,
    day_first: Regex,
}

impl TimeParser {
    fn new() -> Result<Self> {
        // "2024.01.05 10:30[:15]", "2024-01-05T10:30"
        let year_first = Regex::new(r"^(\d{4})[.\-](\d{1,2})[.\-](\d{1,2})[T ](\d{1,2}):(\d{2})(?::(\d{2}))?")
            .map_err(|e| JournalError::FormatError(e.to_string()))?;
        // "05.01.2024 10:30[:15]"
        let day_first = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})[T ](\d{1,2}):(\d{2})(?::(\d{2}))?")
            .map_err(|e| JournalError::FormatError(e.to_string()))?;

        Ok(Self { year_first, day_first })
    }

    fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        self.parse_year_first(value)
            .or_else(|| self.parse_day_first(value))
            .or_else(|| week::parse_datetime_like(value))
    }

    fn parse_year_first(&self, value: &str) -> Option<NaiveDateTime> {
        let caps = self.year_first.captures(value)?;
        build_datetime(
            caps.get(1)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
            caps.get(4)?.as_str(),
            caps.get(5)?.as_str(),
            caps.get(6).map(|m| m.as_str()),
        )
    }

    fn parse_day_first(&self, value: &str) -> Option<NaiveDateTime> {
        let caps = self.day_first.captures(value)?;
        build_datetime(
            caps.get(3)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(1)?.as_str(),
            caps.get(4)?.as_str(),
            caps.get(5)?.as_str(),
            caps.get(6).map(|m| m.as_str()),
        )
    }
}

fn build_datetime(
    year: &str,
    month: &str,
    day: &str,
    hour: &str,
    minute: &str,
    second: Option<&str>,
) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    let second = match second {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    date.and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, second)
}

/// Quote-aware split of one line: `"a,b"` is one field, `""` inside
/// quotes is a literal quote
fn split_row(line: &str) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|field| field.to_string()).collect(),
        Some(Err(e)) => {
            log::debug!("Unreadable trade log row {:?}: {}", line, e);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn cell(row: &[String], index: Option<usize>) -> &str {
    index
        .and_then(|i| row.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Strip thousands separators; anything unreadable counts as zero
fn parse_number(value: &str) -> f64 {
    value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Decode a broker trade-log export into trade records
pub fn parse_trade_log(content: &str) -> Result<ParsedTradeLog> {
    let mut lines = content
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}'))
        .filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| JournalError::FormatError("file contains no rows".to_string()))?;
    let columns = ColumnMap::from_header(&split_row(header))?;
    let parser = TimeParser::new()?;

    let mut trades = Vec::new();
    let mut skipped_rows = 0;

    for line in lines {
        let row = split_row(line);
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let Some(time) = parser.parse(cell(&row, Some(columns.time))) else {
            skipped_rows += 1;
            continue;
        };

        trades.push(TradeRecord {
            time,
            symbol: cell(&row, columns.symbol).to_string(),
            trade_type: cell(&row, columns.trade_type).to_string(),
            lots: parse_number(cell(&row, columns.lots)).max(0.0),
            profit: parse_number(cell(&row, columns.profit)),
        });
    }

    if skipped_rows > 0 {
        log::info!("Skipped {} trade log rows with unreadable times", skipped_rows);
    }

    Ok(ParsedTradeLog { trades, skipped_rows })
}

/// Trades inside the week, Monday 00:00 through Sunday 23:59:59.999
pub fn trades_in_week(trades: &[TradeRecord], week: &WeekKey) -> Vec<TradeRecord> {
    trades.iter().filter(|t| week.contains(t.time)).cloned().collect()
}

pub fn summarize(parsed: &ParsedTradeLog, week: WeekKey) -> TradeImportSummary {
    let trades = trades_in_week(&parsed.trades, &week);
    TradeImportSummary {
        week,
        parsed: parsed.trades.len(),
        skipped_rows: parsed.skipped_rows,
        stats: WeekStats::from_trades(&trades),
        trades,
    }
}

/// Parse without touching the store
pub fn preview_trade_log(content: &str, week: WeekKey) -> Result<TradeImportSummary> {
    let parsed = parse_trade_log(content)?;
    Ok(summarize(&parsed, week))
}

/// Replace the week's trades and stats with the in-week rows of `content`.
/// On error the store is left untouched.
pub fn import_trade_log(store: &mut EntryStore, week: WeekKey, content: &str) -> Result<TradeImportSummary> {
    let summary = preview_trade_log(content, week)?;

    store.update(week, EntryPatch::trades(summary.trades.clone(), summary.stats));
    log::info!(
        "Trade log import: {} of {} rows in {}, PnL {:.2}",
        summary.stats.number_of_trades,
        summary.parsed,
        week,
        summary.stats.pnl
    );

    Ok(summary)
}

pub fn read_trade_log_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| JournalError::FormatError(format!("cannot read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::MemoryCache;
    use chrono::{Datelike, TimeZone, Utc};
    use std::sync::Arc;

    fn week() -> WeekKey {
        WeekKey::parse("2026-10-12_2026-10-18").unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    fn store() -> EntryStore {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap());
        EntryStore::new(Arc::new(MemoryCache::new()), Arc::new(clock))
    }

    #[test]
    fn test_missing_time_column_is_format_error() {
        let result = parse_trade_log("Symbol,Type,Profit\nEURUSD,buy,10\n");
        match result {
            Err(JournalError::FormatError(msg)) => assert!(msg.contains("missing Time column")),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_input_is_format_error() {
        assert!(matches!(parse_trade_log("\r\n\n   \n"), Err(JournalError::FormatError(_))));
    }

    #[test]
    fn test_unparsable_time_row_is_skipped() {
        let csv = "Time,Symbol,Profit\nyesterday-ish,EURUSD,10\n2026.10.13 10:00,GBPUSD,5\n";
        let parsed = parse_trade_log(csv).unwrap();

        assert_eq!(parsed.trades.len(), 1);
        assert_eq!(parsed.trades[0].symbol, "GBPUSD");
        assert_eq!(parsed.skipped_rows, 1);
    }

    #[test]
    fn test_non_numeric_profit_defaults_to_zero() {
        let csv = "Time,Symbol,Volume,Profit\n2026.10.13 10:00,EURUSD,abc,n/a\n";
        let trade = &parse_trade_log(csv).unwrap().trades[0];

        assert_eq!(trade.profit, 0.0);
        assert_eq!(trade.lots, 0.0);
    }

    #[test]
    fn test_quoted_fields_and_thousands_separators() {
        let csv = "\u{feff}\"Open Time\",\"Item\",\"Side\",\"Size\",\"P/L\"\r\n\
                   \"2026-10-13 09:15:30\",\"US30 \"\"cash\"\", index\",\"sell\",\"1,000\",\"-1,234.50\"\r\n";
        let trade = &parse_trade_log(csv).unwrap().trades[0];

        assert_eq!(trade.time, at(2026, 10, 13, 9, 15, 30));
        assert_eq!(trade.symbol, "US30 \"cash\", index");
        assert_eq!(trade.trade_type, "sell");
        assert_eq!(trade.lots, 1000.0);
        assert_eq!(trade.profit, -1234.5);
    }

    #[test]
    fn test_day_first_and_generic_dates() {
        let csv = "Date,Profit\n13.10.2026 08:05,1\n2026-10-14T16:45:10,2\n10/15/2026,3\n";
        let parsed = parse_trade_log(csv).unwrap();
        let times: Vec<NaiveDateTime> = parsed.trades.iter().map(|t| t.time).collect();

        assert_eq!(
            times,
            vec![
                at(2026, 10, 13, 8, 5, 0),
                at(2026, 10, 14, 16, 45, 10),
                at(2026, 10, 15, 0, 0, 0),
            ]
        );
    }

    #[test]
    fn test_first_matching_time_column_wins() {
        let csv = "Date,Time,Profit\n2026.10.13 08:00,2026.10.20 08:00,1\n";
        let trade = &parse_trade_log(csv).unwrap().trades[0];
        assert_eq!(trade.time.day(), 13);
    }

    #[test]
    fn test_all_empty_rows_are_skipped_silently() {
        let csv = "Time,Profit\n,\n\" \",\"\"\n2026.10.13 10:00,1\n";
        let parsed = parse_trade_log(csv).unwrap();
        assert_eq!(parsed.trades.len(), 1);
        assert_eq!(parsed.skipped_rows, 0);
    }

    #[test]
    fn test_pnl_sums_and_rounds_in_week_trades() {
        let csv = "Time,Profit\n\
                   2026.10.12 09:00,10.005\n\
                   2026.10.14 09:00,5.00\n\
                   2026.10.16 09:00,-2.005\n\
                   2026.10.19 09:00,1000\n";
        let summary = preview_trade_log(csv, week()).unwrap();

        assert_eq!(summary.stats.number_of_trades, 3);
        assert_eq!(summary.stats.pnl, 13.0);
        assert_eq!(summary.parsed, 4);
    }

    #[test]
    fn test_week_boundaries_are_inclusive() {
        let csv = "Time,Profit\n\
                   2026.10.11 23:59:59,1\n\
                   2026.10.12 00:00:00,2\n\
                   2026.10.18 23:59:59,4\n\
                   2026.10.19 00:00:00,8\n";
        let summary = preview_trade_log(csv, week()).unwrap();

        assert_eq!(summary.stats.number_of_trades, 2);
        assert_eq!(summary.stats.pnl, 6.0);
    }

    #[test]
    fn test_import_keeps_only_current_week_rows() {
        let mut store = store();
        let current = WeekKey::current(store.clock());
        assert_eq!(current, week());
        let today = store.clock().today();

        let csv = format!(
            "Time,Symbol,Type,Volume,Profit\n\
             {} 09:30:00,EURUSD,buy,1.00,120.50\n\
             {} 14:10,GBPUSD,sell,0.50,-20.25\n\
             {} 10:00:00,EURUSD,buy,1.00,50\n",
            current.start().format("%Y.%m.%d"),
            today.format("%Y.%m.%d"),
            (current.start() - chrono::TimeDelta::days(365)).format("%Y.%m.%d"),
        );

        let summary = import_trade_log(&mut store, current, &csv).unwrap();
        let entry = store.get(&current);

        assert_eq!(summary.stats.number_of_trades, 2);
        assert_eq!(entry.stats.number_of_trades, 2);
        assert_eq!(entry.stats.pnl, 100.25);
        assert_eq!(entry.trades.len(), 2);
        assert!(entry.trades.iter().all(|t| current.contains(t.time)));
        assert_eq!(summary.message(), format!("Imported 2 trades for {} (PnL 100.25)", current));
    }

    #[test]
    fn test_reimport_replaces_previous_trades() {
        let mut store = store();
        import_trade_log(&mut store, week(), "Time,Profit\n2026.10.13 10:00,1\n2026.10.13 11:00,2\n").unwrap();
        import_trade_log(&mut store, week(), "Time,Profit\n2026.10.14 10:00,7\n").unwrap();

        let entry = store.get(&week());
        assert_eq!(entry.trades.len(), 1);
        assert_eq!(entry.stats.pnl, 7.0);
    }

    #[test]
    fn test_failed_import_leaves_state_untouched() {
        let mut store = store();
        import_trade_log(&mut store, week(), "Time,Profit\n2026.10.13 10:00,1\n").unwrap();
        let before = store.get(&week());

        let result = import_trade_log(&mut store, week(), "Symbol,Profit\nEURUSD,5\n");
        assert!(import_message(&result).starts_with("Import failed: "));
        assert_eq!(store.get(&week()), before);
    }

    #[test]
    fn test_unreadable_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_trade_log_file(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(JournalError::FormatError(_))));
    }
}
