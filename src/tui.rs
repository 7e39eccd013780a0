use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Terminal;

use crate::detection;
use crate::generator::MarketGenerator;
use crate::latency::{format_latency, RecomputeTracker};
use crate::types::{Analysis, AnalysisConfig, MarketRecord};

const STD_THRESHOLD_RANGE: (f64, f64) = (1.0, 5.0);
const VOLUME_MULTIPLIER_RANGE: (f64, f64) = (1.0, 10.0);
const DAY_TICK: Duration = Duration::from_secs(1);

struct App {
    records: Vec<MarketRecord>,
    config: AnalysisConfig,
    analysis: Analysis,
    tracker: RecomputeTracker,
    generator: Option<MarketGenerator>,
    uptime: Instant,
    last_day_tick: Instant,
    scroll_offset: usize,
    should_quit: bool,
}

impl App {
    fn new(
        records: Vec<MarketRecord>,
        config: AnalysisConfig,
        generator: Option<MarketGenerator>,
    ) -> Self {
        let mut tracker = RecomputeTracker::new();
        let started = Instant::now();
        let analysis = detection::analyze(&records, &config);
        tracker.record(started);
        Self {
            records,
            config,
            analysis,
            tracker,
            generator,
            uptime: Instant::now(),
            last_day_tick: Instant::now(),
            scroll_offset: 0,
            should_quit: false,
        }
    }

    /// Every dataset or threshold change is a full recompute.
    fn recompute(&mut self) {
        let started = Instant::now();
        self.analysis = detection::analyze(&self.records, &self.config);
        self.tracker.record(started);
    }

    fn adjust_std_threshold(&mut self, delta: f64) {
        let (lo, hi) = STD_THRESHOLD_RANGE;
        self.config.std_threshold = (self.config.std_threshold + delta).clamp(lo, hi);
        self.recompute();
    }

    fn adjust_volume_multiplier(&mut self, delta: f64) {
        let (lo, hi) = VOLUME_MULTIPLIER_RANGE;
        self.config.volume_multiplier = (self.config.volume_multiplier + delta).clamp(lo, hi);
        self.recompute();
    }
}

pub fn run(
    records: Vec<MarketRecord>,
    config: AnalysisConfig,
    generator: Option<MarketGenerator>,
    duration: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, records, config, generator, duration);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    records: Vec<MarketRecord>,
    config: AnalysisConfig,
    generator: Option<MarketGenerator>,
    duration: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(records, config, generator);
    let run_duration = if duration == 0 {
        Duration::from_secs(3600)
    } else {
        Duration::from_secs(duration)
    };

    while !app.should_quit && app.uptime.elapsed() < run_duration {
        terminal.draw(|f| draw(f, &app))?;

        // Handle input
        if event::poll(Duration::from_millis(150))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                        KeyCode::Up => {
                            if app.scroll_offset > 0 {
                                app.scroll_offset -= 1;
                            }
                        }
                        KeyCode::Down => {
                            app.scroll_offset = app.scroll_offset.saturating_add(1);
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_std_threshold(0.25),
                        KeyCode::Char('-') => app.adjust_std_threshold(-0.25),
                        KeyCode::Char(']') => app.adjust_volume_multiplier(0.5),
                        KeyCode::Char('[') => app.adjust_volume_multiplier(-0.5),
                        _ => {}
                    }
                }
            }
        }

        // Live mode: append one generated trading day per tick.
        if app.last_day_tick.elapsed() >= DAY_TICK {
            if let Some(gen) = app.generator.as_mut() {
                let day = gen.generate_day();
                app.records.extend(day);
                app.last_day_tick = Instant::now();
                app.recompute();
            }
        }
    }

    Ok(())
}

fn draw(f: &mut ratatui::Frame, app: &App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // header
            Constraint::Min(10),    // alert tables
            Constraint::Length(10), // buzzing + baselines
        ])
        .split(size);

    draw_header(f, app, chunks[0]);
    draw_alert_tables(f, app, chunks[1]);
    draw_buzzing_and_baselines(f, app, chunks[2]);
}

fn draw_header(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let elapsed = app.uptime.elapsed().as_secs();
    let stats = app.tracker.stats();
    let header = vec![
        Span::styled(
            " stock-buzz-detect ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            format!("Buzzing: {}", app.analysis.summary.buzzing.len()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" | "),
        Span::styled(
            format!(
                "Records: {} / Securities: {}",
                app.analysis.filtered.len(),
                app.analysis.groups.len()
            ),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" | "),
        Span::raw(format!(
            "k={:.2} m={:.1}",
            app.config.std_threshold, app.config.volume_multiplier
        )),
        Span::raw(" | "),
        Span::raw(format!("recompute p50={}", format_latency(stats.p50_us))),
        Span::raw(" | "),
        Span::raw(format!("Uptime: {elapsed}s")),
        Span::raw(" | "),
        Span::styled(
            "q=quit  +/-=std  [/]=vol  Up/Down=scroll",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    let p = Paragraph::new(Line::from(header))
        .block(Block::default().borders(Borders::ALL).title(" Screener "));
    f.render_widget(p, area);
}

fn draw_alert_tables(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let max_visible = (area.height as usize).saturating_sub(3);
    let summary = &app.analysis.summary;

    // Price alerts, latest first
    let price_rows: Vec<Row> = summary
        .price_alerts
        .iter()
        .rev()
        .skip(app.scroll_offset)
        .take(max_visible)
        .map(|rec| {
            let band = app
                .analysis
                .groups
                .get(&rec.security_id)
                .map(|g| g.baseline.band(app.config.std_threshold));
            let band_str = match band {
                Some((upper, lower)) => format!("[{lower:.1}, {upper:.1}]"),
                None => "-".to_string(),
            };
            Row::new(vec![
                Cell::from(rec.date.to_string()),
                Cell::from(format!("{:<10}", rec.symbol)),
                Cell::from(Span::styled(
                    format!("{:.2}", rec.price),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Cell::from(band_str),
            ])
        })
        .collect();

    let price_table = Table::new(
        price_rows,
        [
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Min(16),
        ],
    )
    .header(
        Row::new(vec!["DATE", "TICKER", "PRICE", "BAND"])
            .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::White)),
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Price Alerts ({}) ",
        summary.price_alerts.len()
    )));
    f.render_widget(price_table, chunks[0]);

    // Volume spikes, latest first
    let volume_rows: Vec<Row> = summary
        .volume_spikes
        .iter()
        .rev()
        .skip(app.scroll_offset)
        .take(max_visible)
        .map(|rec| {
            let ratio = app
                .analysis
                .groups
                .get(&rec.security_id)
                .map(|g| g.baseline.mean_volume)
                .filter(|mean| *mean > 0.0)
                .map(|mean| format!("{:.1}x", rec.volume as f64 / mean))
                .unwrap_or_else(|| "-".to_string());
            Row::new(vec![
                Cell::from(rec.date.to_string()),
                Cell::from(format!("{:<10}", rec.symbol)),
                Cell::from(Span::styled(
                    rec.volume.to_string(),
                    Style::default().fg(Color::Yellow),
                )),
                Cell::from(ratio),
            ])
        })
        .collect();

    let volume_table = Table::new(
        volume_rows,
        [
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(12),
            Constraint::Min(6),
        ],
    )
    .header(
        Row::new(vec!["DATE", "TICKER", "VOLUME", "x AVG"])
            .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::White)),
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Volume Spikes ({}) ",
        summary.volume_spikes.len()
    )));
    f.render_widget(volume_table, chunks[1]);
}

fn draw_buzzing_and_baselines(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let summary = &app.analysis.summary;
    let max_visible = (area.height as usize).saturating_sub(3);

    // Buzzing securities
    let buzz_rows: Vec<Row> = summary
        .buzzing
        .iter()
        .take(max_visible)
        .map(|id| {
            let group = app.analysis.groups.get(id);
            let symbol = summary.symbols.get(id).cloned().unwrap_or_default();
            let alert_count = group
                .map(|g| g.flags.iter().filter(|fl| fl.price_alert).count())
                .unwrap_or(0);
            Row::new(vec![
                Cell::from(Span::styled(
                    format!("{symbol:<10}"),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )),
                Cell::from(id.clone()),
                Cell::from(alert_count.to_string()),
            ])
        })
        .collect();

    let buzz_table = Table::new(
        buzz_rows,
        [
            Constraint::Length(11),
            Constraint::Length(14),
            Constraint::Min(6),
        ],
    )
    .header(
        Row::new(vec!["TICKER", "ISIN", "ALERTS"])
            .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::White)),
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Buzzing ({}) ",
        summary.buzzing.len()
    )));
    f.render_widget(buzz_table, chunks[0]);

    // Baselines per security
    let base_rows: Vec<Row> = app
        .analysis
        .groups
        .values()
        .take(max_visible)
        .map(|g| {
            let color = if g.has_price_alert() {
                Color::Yellow
            } else {
                Color::White
            };
            let std = if g.baseline.std_price.is_nan() {
                "-".to_string()
            } else {
                format!("{:.2}", g.baseline.std_price)
            };
            Row::new(vec![
                Cell::from(Span::styled(format!("{:<10}", g.symbol), Style::default().fg(color))),
                Cell::from(format!("{:.2}", g.baseline.mean_price)),
                Cell::from(std),
                Cell::from(format!("{:.0}", g.baseline.mean_volume)),
                Cell::from(g.records.len().to_string()),
            ])
        })
        .collect();

    let base_table = Table::new(
        base_rows,
        [
            Constraint::Length(11),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Min(5),
        ],
    )
    .header(
        Row::new(vec!["TICKER", "MEAN", "STD", "MEAN VOL", "N"])
            .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::White)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Baselines "));
    f.render_widget(base_table, chunks[1]);
}
