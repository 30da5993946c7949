//! Append-only CSV trade journal with daily rotation.
//!
//! One row per attempted or rollback leg, flushed and synced on every write
//! so rows survive a crash. A failed write is reported to the caller and
//! logged, but never interrupts trading.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info};

use crate::execution::types::TradeRecord;

const HEADER: &str = "trade_id,parent_trade_id,trade_type,symbol,side,intended_price,intended_qty,actual_price,actual_qty,status,pnl,pnl_pct,timestamp";

struct JournalFile {
    file: Option<File>,
    /// UTC `YYYYMMDD` the open file belongs to.
    date: String,
}

pub struct TradeJournal {
    dir: PathBuf,
    inner: Mutex<JournalFile>,
    sequence_counter: AtomicU64,
}

impl TradeJournal {
    /// Create the output directory if needed; files are opened lazily on
    /// the first record of each UTC day.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating trade log directory {}", dir.display()))?;
        info!("[Journal] writing trade logs under {}", dir.display());
        Ok(Self {
            dir,
            inner: Mutex::new(JournalFile {
                file: None,
                date: String::new(),
            }),
            sequence_counter: AtomicU64::new(0),
        })
    }

    /// Allocate the parent id tying all rows of one arbitrage cycle
    /// together.
    pub fn start_sequence(&self) -> String {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis();
        let n = self.sequence_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ARB_{ms}_{n}")
    }

    /// Append one row, rotating to a new file when the UTC date changed.
    pub fn record(&self, record: &TradeRecord) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        let result = self.write_locked(&mut inner, record);
        if let Err(err) = &result {
            error!("[Journal] write failed for trade {}: {err:#}", record.trade_id);
        } else {
            debug!("[Journal] recorded trade {} ({})", record.trade_id, record.leg);
        }
        result
    }

    fn write_locked(&self, inner: &mut JournalFile, record: &TradeRecord) -> Result<()> {
        let today = Utc::now().format("%Y%m%d").to_string();
        if inner.file.is_none() || inner.date != today {
            self.rotate(inner, today)?;
        }

        let file = inner.file.as_mut().expect("rotate leaves a file open");
        let row = format!(
            "{},{},{},{},{},{:.8},{:.8},{:.8},{:.8},{},{:.8},{:.4},{}\n",
            escape_csv(&record.trade_id),
            escape_csv(&record.parent_trade_id),
            record.leg,
            escape_csv(&record.symbol),
            record.side,
            record.intended_price,
            record.intended_qty,
            record.actual_price,
            record.actual_qty,
            record.status,
            record.pnl,
            record.pnl_pct,
            record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        );
        file.write_all(row.as_bytes()).context("appending trade row")?;
        file.flush().context("flushing trade row")?;
        file.sync_data().context("syncing trade log")?;
        Ok(())
    }

    fn rotate(&self, inner: &mut JournalFile, date: String) -> Result<()> {
        if let Some(old) = inner.file.take() {
            // Best effort on the outgoing file; the new one is what matters.
            let _ = old.sync_data();
        }

        let path = self.dir.join(format!("trades_{date}.csv"));
        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening trade log {}", path.display()))?;

        if is_new {
            writeln!(file, "{HEADER}").context("writing trade log header")?;
            file.flush().context("flushing trade log header")?;
            info!("[Journal] created trade log {}", path.display());
        } else {
            info!("[Journal] appending to trade log {}", path.display());
        }

        inner.file = Some(file);
        inner.date = date;
        Ok(())
    }

    /// Path the journal would write to right now, for tests and tooling.
    pub fn current_path(&self) -> PathBuf {
        self.dir
            .join(format!("trades_{}.csv", Utc::now().format("%Y%m%d")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Quote a field if it contains a comma, quote, or line break; double any
/// embedded quotes.
fn escape_csv(field: &str) -> String {
    let needs_quotes = field
        .chars()
        .any(|c| matches!(c, ',' | '"' | '\n' | '\r'));
    if !needs_quotes {
        return field.to_owned();
    }

    let mut out = String::with_capacity(field.len() + 2);
    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}
