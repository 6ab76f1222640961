use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use std::time::Duration;

use clap::Args;
use pomotick_core::{Bridge, Database, Event, Reply, Request, SettingsStore, TimerEngine, TimerSnapshot};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Args)]
pub struct RunArgs {
    /// Start the first focus segment right away
    #[arg(long)]
    start: bool,
    /// Suppress state events that only move the countdown
    #[arg(long)]
    quiet_ticks: bool,
}

/// Event lines produced by listeners, written after the current command.
type Outbox = Rc<RefCell<Vec<String>>>;

pub fn run(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(args));
    // A blocked stdin read cannot be cancelled; don't wait for it.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn serve(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let store = SettingsStore::open_default()?;
    let engine = TimerEngine::new(store.settings().clone())
        .with_tick_interval(store.config().tick_interval_ms);
    let mut bridge = Bridge::new(engine).with_settings_store(store);
    match Database::open() {
        Ok(db) => bridge = bridge.with_history(db),
        Err(e) => tracing::warn!(error = %e, "focus history unavailable"),
    }

    let outbox: Outbox = Rc::default();
    let _state_events = {
        let outbox = Rc::clone(&outbox);
        let quiet_ticks = args.quiet_ticks;
        let last_printed = RefCell::new(None::<TimerSnapshot>);
        bridge.engine().subscribe(move |state| {
            let suppress = quiet_ticks
                && last_printed
                    .borrow()
                    .as_ref()
                    .is_some_and(|prev| only_countdown_moved(prev, &state));
            if suppress {
                return;
            }
            push_event(&outbox, &Event::state_changed(state.clone()));
            *last_printed.borrow_mut() = Some(state);
        })
    };
    let _focus_events = {
        let outbox = Rc::clone(&outbox);
        bridge
            .engine()
            .on_focus_completed(move |completed| push_event(&outbox, &Event::focus_completed(completed)))
    };

    let mut stdout = tokio::io::stdout();
    if args.start {
        bridge.handle(Request::Start);
        write_pending(&mut stdout, &outbox).await?;
    }

    // Raw segments: a line that is not UTF-8 gets an error reply, not a shutdown.
    let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker: Option<Interval> = None;

    tracing::info!("timer ready");
    loop {
        sync_ticker(bridge.engine().ticker_interval(), &mut ticker);

        tokio::select! {
            segment = lines.next_segment() => {
                let Some(raw) = segment? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if raw.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                tracing::debug!(request = %String::from_utf8_lossy(&raw).trim(), "received");
                let reply = bridge.handle_raw_line(&raw);
                write_pending(&mut stdout, &outbox).await?;
                write_line(&mut stdout, &serde_json::to_string(&reply)?).await?;
                if reply.is_closed() {
                    break;
                }
            }
            _ = next_tick(&mut ticker) => {
                bridge.engine_mut().tick();
                write_pending(&mut stdout, &outbox).await?;
            }
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    if !bridge.engine().is_disposed() {
        bridge.dispose();
        write_line(&mut stdout, &serde_json::to_string(&Reply::Closed)?).await?;
    }
    Ok(())
}

fn push_event(outbox: &Outbox, event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => outbox.borrow_mut().push(line),
        Err(e) => tracing::warn!(error = %e, "failed to encode event"),
    }
}

fn only_countdown_moved(prev: &TimerSnapshot, next: &TimerSnapshot) -> bool {
    prev.mode == next.mode
        && prev.status == next.status
        && prev.completed_focus == next.completed_focus
        && prev.duration_ms == next.duration_ms
        && prev.settings == next.settings
}

/// Keep the local interval in step with the engine's ticker.
fn sync_ticker(wanted: Option<Duration>, ticker: &mut Option<Interval>) {
    match (wanted, ticker.as_ref()) {
        (None, _) => *ticker = None,
        (Some(period), Some(current)) if current.period() == period => {}
        (Some(period), _) => {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *ticker = Some(interval);
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn write_pending(stdout: &mut Stdout, outbox: &Outbox) -> std::io::Result<()> {
    let pending = std::mem::take(&mut *outbox.borrow_mut());
    for line in pending {
        write_line(stdout, &line).await?;
    }
    Ok(())
}

async fn write_line(stdout: &mut Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
