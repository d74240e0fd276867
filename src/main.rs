use anyhow::{bail, Context, Result};
use clap::Parser;
use posture_sentinel::alerts::{AlertMessage, Notifier, Permission, SoundOutput};
use posture_sentinel::clock::{Clock, ManualClock};
use posture_sentinel::error::AlertError;
use posture_sentinel::inference::ReplayDetector;
use posture_sentinel::scheduler::{ManualTicker, TickId, TickRequest, Visibility};
use posture_sentinel::stats::format_duration;
use posture_sentinel::store::JsonFileStore;
use posture_sentinel::tone::Tone;
use posture_sentinel::{Config, Driver, Ports};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "posture-sentinel", about = "Posture monitoring from recorded pose landmarks")]
struct Args {
    #[arg(long, value_name = "PATH", default_value = "posture-sentinel.toml")]
    config: PathBuf,
    /// JSON-lines landmark recording to play back
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,
    /// Overrides the configured sensitivity (20-80, step 5)
    #[arg(long)]
    sensitivity: Option<u8>,
    /// Print every frame report as a JSON line
    #[arg(long)]
    json: bool,
    /// Write the default configuration to --config and exit
    #[arg(long)]
    write_default_config: bool,
}

/// Reports tones instead of playing them.
struct LoggedSound;

impl SoundOutput for LoggedSound {
    fn play(&mut self, tone: &Tone) -> Result<(), AlertError> {
        log::info!("alert tone ({} ms, peak {:.3})", tone.duration().as_millis(), tone.peak());
        Ok(())
    }
}

/// Prints notifications to stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&mut self, message: &AlertMessage) -> Result<(), AlertError> {
        println!("[{}] {}", message.title, message.body);
        Ok(())
    }
}

fn next_due(ticker: &ManualTicker, now_ms: u64) -> Option<(TickId, u64)> {
    ticker.take().map(|req| match req {
        TickRequest::Frame(id) => (id, now_ms),
        TickRequest::Timeout(id, delay) => (id, now_ms + delay.as_millis() as u64),
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.write_default_config {
        Config::default().save(&args.config)?;
        println!("Wrote {}", args.config.display());
        return Ok(());
    }

    let mut config = Config::load_or_default(&args.config)?;
    if let Some(s) = args.sensitivity {
        config.sensitivity = s;
    }
    let settings = config.settings()?;

    let Some(replay) = args.replay else {
        bail!("no pose source: pass --replay <PATH> with a landmark recording");
    };
    let detector = ReplayDetector::load(&replay).with_context(|| format!("loading {}", replay.display()))?;
    let timeline: Vec<(u64, bool)> = detector.records().iter().map(|r| (r.t, r.visible)).collect();
    let Some(&(start_ms, _)) = timeline.first() else {
        bail!("{} holds no frames", replay.display());
    };

    log::info!("Posture Sentinel replaying {} frame(s) from {}", timeline.len(), replay.display());

    let clock = ManualClock::local(start_ms);
    let ticker = ManualTicker::new();
    let mut driver = Driver::new(
        settings,
        Ports {
            detector: Box::new(detector),
            clock: Box::new(clock.clone()),
            ticker: Box::new(ticker.clone()),
            store: Box::new(JsonFileStore::new(&config.ledger_path)),
            sound: Box::new(LoggedSound),
            notifier: Box::new(ConsoleNotifier),
        },
    );

    driver.start()?;
    let mut due = next_due(&ticker, start_ms);

    for (t, visible) in timeline {
        clock.set(t);
        driver.set_visibility(if visible { Visibility::Visible } else { Visibility::Hidden });
        // A cadence switch replaces the outstanding request
        if let Some(replaced) = next_due(&ticker, t) {
            due = Some(replaced);
        }

        let Some((id, at)) = due else { break };
        if at > t {
            continue;
        }

        if let Some(report) = driver.on_tick(id) {
            if args.json {
                println!("{}", serde_json::to_string(&report)?);
            } else if let Some(previous) = report.previous {
                println!("{:>10} ms  {} -> {}", report.timestamp_ms, previous.label(), report.status.label());
            }
        }
        due = next_due(&ticker, t);
    }

    if let Some(session) = driver.session() {
        println!(
            "Session: good {}, bad {}, score {}%",
            format_duration(session.good_ms()),
            format_duration(session.bad_ms()),
            session.score()
        );
    }
    for day in driver.weekly_summary() {
        if day.total_ms() > 0 {
            println!(
                "{}  good {:>8}  bad {:>8}  {:>3}%",
                day.date,
                format_duration(day.good_duration_ms),
                format_duration(day.bad_duration_ms),
                day.score()
            );
        }
    }

    driver.stop();
    log::debug!("replay finished at {}", clock.now_ms());
    Ok(())
}
