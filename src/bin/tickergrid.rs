//! Live ticker table in the terminal.
//!
//! Connects to a row-update stream (or falls back to REST polling) and
//! keeps an ANSI table synchronized with it: green/red flashes on price
//! moves, freshness marks on the timestamp column, pinned rows on top.
//!
//! Usage:
//!   TICKER_FEED_URL=wss://... cargo run --bin tickergrid

use anyhow::Result;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tickergrid::bin_common::{shutdown_signal, AppSettings, BinaryRunner, RunConfig};
use tickergrid::streamlink::{FeedConfig, WireMessage};
use tickergrid::tickertable::{
    CellClass, CellHandle, EngineConfig, FieldName, FilePreferenceStore, Key, PollSource,
    RowHandle, StreamSource, TableView, TickerEngine, UpdateSource,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Minimum gap between full repaints of the terminal
const PAINT_INTERVAL: Duration = Duration::from_millis(250);

const CELL_WIDTH: usize = 14;

fn class_color(class: CellClass) -> &'static str {
    match class {
        CellClass::Up => "\x1B[32m",
        CellClass::Down => "\x1B[31m",
        CellClass::Fresh => "\x1B[36m",
        CellClass::Stale => "\x1B[90m",
        CellClass::Neutral => "",
    }
}

#[derive(Debug, Clone)]
struct Cell {
    field: FieldName,
    text: String,
    class: CellClass,
}

/// ANSI terminal implementation of the view abstraction
struct ConsoleView {
    next_handle: u64,
    rows: Vec<RowHandle>,
    row_cells: HashMap<RowHandle, Vec<CellHandle>>,
    cells: HashMap<CellHandle, Cell>,
    last_paint: Instant,
}

impl ConsoleView {
    fn new() -> Self {
        Self {
            next_handle: 0,
            rows: Vec::new(),
            row_cells: HashMap::new(),
            cells: HashMap::new(),
            last_paint: Instant::now() - PAINT_INTERVAL,
        }
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Repaint the whole table, throttled to keep the terminal readable
    fn maybe_paint(&mut self) {
        if self.last_paint.elapsed() < PAINT_INTERVAL {
            return;
        }
        self.last_paint = Instant::now();

        let mut out = String::from("\x1B[2J\x1B[1;1H");
        out.push_str("════════════════════════════════════════════════════════════════════════\n");
        out.push_str("  TICKERGRID - Press Ctrl+C to stop\n");
        out.push_str("════════════════════════════════════════════════════════════════════════\n");

        if let Some(first) = self.rows.first() {
            if let Some(cells) = self.row_cells.get(first) {
                out.push_str(" ");
                for cell in cells {
                    if let Some(c) = self.cells.get(cell) {
                        out.push_str(&format!(" {:>width$}", c.field, width = CELL_WIDTH));
                    }
                }
                out.push('\n');
            }
        }

        for row in &self.rows {
            let Some(cells) = self.row_cells.get(row) else { continue };
            out.push_str(" ");
            for cell in cells {
                if let Some(c) = self.cells.get(cell) {
                    out.push_str(&format!(
                        " {}{:>width$}\x1B[0m",
                        class_color(c.class),
                        c.text,
                        width = CELL_WIDTH
                    ));
                }
            }
            out.push('\n');
        }

        print!("{}", out);
        let _ = io::stdout().flush();
    }
}

impl TableView for ConsoleView {
    fn create_row(&mut self, _key: &Key) -> RowHandle {
        let handle = RowHandle(self.handle());
        self.rows.push(handle);
        self.row_cells.insert(handle, Vec::new());
        handle
    }

    fn create_cell(&mut self, row: RowHandle, field: &FieldName) -> CellHandle {
        let handle = CellHandle(self.handle());
        self.cells.insert(
            handle,
            Cell {
                field: field.clone(),
                text: String::new(),
                class: CellClass::Neutral,
            },
        );
        self.row_cells.entry(row).or_default().push(handle);
        handle
    }

    fn set_cell_text(&mut self, cell: CellHandle, text: &str) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.text = text.to_string();
        }
        self.maybe_paint();
    }

    fn set_cell_class(&mut self, cell: CellHandle, class: CellClass) {
        if let Some(c) = self.cells.get_mut(&cell) {
            c.class = class;
        }
        self.maybe_paint();
    }

    fn remove_all_rows(&mut self) {
        self.rows.clear();
        self.row_cells.clear();
        self.cells.clear();
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn build_source(settings: &AppSettings) -> Box<dyn UpdateSource> {
    if let Some(url) = &settings.feed_url {
        info!("[Main] Streaming from {}", url);
        let mut config = FeedConfig::new(url.clone());
        if let Some(sub) = &settings.subscription {
            config = config.with_subscription(WireMessage::Text(sub.clone()));
        }
        Box::new(StreamSource::connect(config))
    } else {
        let url = settings
            .poll_url
            .clone()
            .unwrap_or_default();
        info!("[Main] Polling {}", url);
        Box::new(PollSource::start(url, settings.poll_interval))
    }
}

struct TickergridApp {
    config: RunConfig,
    settings: AppSettings,
}

impl BinaryRunner for TickergridApp {
    fn config(&self) -> &RunConfig {
        &self.config
    }

    async fn run(&mut self) -> Result<()> {
        let prefs = Arc::new(FilePreferenceStore::new(&self.settings.prefs_path));
        let source = build_source(&self.settings);

        let engine =
            TickerEngine::start(EngineConfig::default(), source, ConsoleView::new(), prefs);

        shutdown_signal().await;
        info!("[Main] Shutdown requested");
        engine.stop().await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let settings = AppSettings::from_env()?;
    let mut app = TickergridApp {
        config: RunConfig::new("tickergrid"),
        settings,
    };
    app.execute().await
}
