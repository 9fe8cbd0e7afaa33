//! Watershed: Main Entry Point
//!
//! Hexagonal architecture; two runtimes share one core.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SysfsPwm / SimPwm / LEDC   LogEventSink   JsonFile / Nvs      │
//! │  (OutputFactory)            (EventSink)    (ConfigPort)        │
//! │  SystemClock · LocalWallClock · ConfigWatcher · Watchdog       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  host:  BlockingController (worker thread)             │    │
//! │  │  esp32: TickDriver ▸ PumpService (timer events)        │    │
//! │  │         Schedule · FSM · Fader · ConfigStore           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    esp::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    host::run()
}

// ── ESP32: timer-driven tick runtime ──────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Arc;

    use anyhow::Result;
    use log::{debug, error, info, warn};

    use watershed::adapters::log_sink::LogEventSink;
    use watershed::adapters::nvs::NvsConfig;
    use watershed::adapters::time::{LocalWallClock, SystemClock};
    use watershed::app::blocking::HARDWARE_RETRY_MS;
    use watershed::app::events::AppEvent;
    use watershed::app::ports::{
        Clock, ConfigPort, EventSink, OutputFactory, PumpOutput, WallClock,
    };
    use watershed::app::service::PumpService;
    use watershed::app::status::RuntimeStatus;
    use watershed::app::tick::TickDriver;
    use watershed::config::PumpConfig;
    use watershed::drivers::hw_init::{BoardPump, LedcOutputFactory};
    use watershed::drivers::hw_timer;
    use watershed::drivers::watchdog::Watchdog;
    use watershed::events::{self, Event};
    use watershed::store::ConfigStore;

    /// Main-loop yield between queue drains.
    const LOOP_YIELD_MS: u64 = 10;

    pub fn run() -> Result<()> {
        // ── 1. ESP-IDF bootstrap ──────────────────────────────────
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;

        info!("╔══════════════════════════════════════╗");
        info!("║  Watershed v{}                        ║", env!("CARGO_PKG_VERSION"));
        info!("╚══════════════════════════════════════╝");

        // ── 2. Load config from NVS (or defaults) ─────────────────
        let nvs = match NvsConfig::new() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("NVS init failed ({}), running with defaults and no persistence", e);
                None
            }
        };
        let config = match nvs.as_ref().map(ConfigPort::load) {
            Some(Ok(cfg)) => cfg,
            Some(Err(e)) => {
                warn!("NVS config load failed ({}), using defaults", e);
                PumpConfig::default()
            }
            None => PumpConfig::default(),
        };
        let store = ConfigStore::new(config);

        // ── 3. Core + adapters ────────────────────────────────────
        let clock = SystemClock::new();
        let wall = LocalWallClock::new();
        let mut sink = LogEventSink::new();
        let mut factory = LedcOutputFactory::new();
        let mut output: Option<(u8, BoardPump)> = None;
        let mut retry_at_ms: u64 = 0;

        let status = Arc::new(RuntimeStatus::new());
        let service = PumpService::new(store.read(), clock.now_ms());
        let mut driver = TickDriver::new(Watchdog::new(), service, Arc::clone(&status));
        driver.start(&mut sink);

        hw_timer::start_timers();
        info!("System ready. Entering event loop.");

        // ── 4. Event loop ─────────────────────────────────────────
        loop {
            events::drain_events(|event| match event {
                Event::ControlTick => {
                    let cfg = store.read();
                    let now_ms = clock.now_ms();

                    if output.as_ref().is_some_and(|(pin, _)| *pin != cfg.pump_pin) {
                        if let Some((old_pin, mut old)) = output.take() {
                            info!("Pump output: pin {} -> {}, reopening", old_pin, cfg.pump_pin);
                            old.close();
                        }
                    }
                    if output.is_none() && now_ms >= retry_at_ms {
                        match factory.open(cfg.pump_pin) {
                            Ok(out) => {
                                sink.emit(&AppEvent::OutputOpened { pin: cfg.pump_pin });
                                driver.output_replaced();
                                output = Some((cfg.pump_pin, out));
                            }
                            Err(e) => {
                                error!("Pump output: {} (retrying in {} ms)", e, HARDWARE_RETRY_MS);
                                sink.emit(&AppEvent::OutputFault(e));
                                retry_at_ms = now_ms + HARDWARE_RETRY_MS;
                            }
                        }
                    }

                    match output.as_mut() {
                        Some((_, out)) => {
                            driver.on_tick(cfg, now_ms, wall.local_now(), out, &mut sink)
                        }
                        None => driver.skip_tick(),
                    }
                }

                Event::ConfigCheck => {
                    let live = status.snapshot();
                    debug!("STATUS | phase={} speed={:.3}", live.phase, live.speed);
                    let Some(nvs) = nvs.as_ref() else { return };
                    match nvs.load() {
                        Ok(cfg) if *store.read() != cfg => {
                            store.publish(cfg);
                            sink.emit(&AppEvent::ConfigReloaded);
                        }
                        Ok(_) => {}
                        Err(e) => warn!("NVS config check failed: {}", e),
                    }
                }
            });

            std::thread::sleep(std::time::Duration::from_millis(LOOP_YIELD_MS));
        }
    }
}

// ── Host: blocking worker thread + config file hot reload ─────

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::{self, JoinHandle};

    use anyhow::{Context, Result, anyhow, bail};
    use clap::{Parser, Subcommand};
    use log::{info, warn};

    use watershed::adapters::json_file::JsonFileConfig;
    use watershed::adapters::log_sink::LogEventSink;
    use watershed::adapters::sim_pwm::SimOutputFactory;
    use watershed::adapters::status_file::{StatusFile, unix_now_ms};
    use watershed::adapters::sysfs_pwm::SysfsPwmFactory;
    use watershed::adapters::time::{LocalWallClock, SystemClock};
    use watershed::adapters::watcher::ConfigWatcher;
    use watershed::app::blocking::BlockingController;
    use watershed::app::commands::{AppCommand, FormUpdate};
    use watershed::app::ports::{Clock, ConfigPort, OutputFactory, WallClock};
    use watershed::app::settings::SettingsService;
    use watershed::app::status::RuntimeStatus;
    use watershed::config::PumpConfig;
    use watershed::store::ConfigStore;

    /// How often the watcher thread checks the config file.
    const WATCH_POLL_MS: u64 = 250;

    #[derive(Parser)]
    #[command(name = "watershed", version, about = "Scheduled pump controller")]
    struct Cli {
        /// Path to the JSON config file.
        #[arg(long, default_value = "config.json")]
        config: PathBuf,

        /// Drive an in-memory PWM instead of /sys/class/pwm.
        #[arg(long)]
        simulate: bool,

        #[command(subcommand)]
        command: Option<Command>,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Run the pump controller (default).
        Run,
        /// Print the current status as JSON.
        Status,
        /// Flip manual mode.
        ToggleManual,
        /// Flip flush mode.
        ToggleFlush,
        /// Flip the schedule on or off.
        ToggleEnabled,
        /// Update fields, e.g. `set interval_ms=6000 active_days=Mon,Fri`.
        Set {
            #[arg(required = true, value_name = "KEY=VALUE")]
            assignments: Vec<String>,
        },
    }

    pub fn run() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let cli = Cli::parse();
        let file = JsonFileConfig::new(&cli.config);

        match cli.command.unwrap_or(Command::Run) {
            Command::Run => run_daemon(file, cli.simulate),
            Command::Status => print_status(file),
            Command::ToggleManual => apply(file, AppCommand::ToggleManual),
            Command::ToggleFlush => apply(file, AppCommand::ToggleFlush),
            Command::ToggleEnabled => apply(file, AppCommand::ToggleEnabled),
            Command::Set { assignments } => {
                let mut form = FormUpdate::new();
                for arg in &assignments {
                    if form.push_assignment(arg).is_none() {
                        bail!("expected KEY=VALUE, got {:?}", arg);
                    }
                }
                let current = file.load()?;
                form.complete_schedule_group(&current);
                apply(file, AppCommand::Update(form))
            }
        }
    }

    fn settings(file: JsonFileConfig) -> Result<SettingsService<JsonFileConfig>> {
        let store = Arc::new(ConfigStore::new(file.load()?));
        Ok(SettingsService::new(store, file))
    }

    fn apply(file: JsonFileConfig, cmd: AppCommand) -> Result<()> {
        let path = file.path().display().to_string();
        let config = settings(file)?
            .handle(cmd)
            .with_context(|| format!("updating {}", path))?;
        println!("{}", serde_json::to_string_pretty(&*config)?);
        Ok(())
    }

    /// Phase and speed come from the daemon's status file and are left out
    /// when no controller is running against this config.
    fn print_status(file: JsonFileConfig) -> Result<()> {
        let runtime = StatusFile::beside(file.path()).read(unix_now_ms());
        let report = settings(file)?.status(LocalWallClock::new().local_now(), runtime);
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    fn run_daemon(file: JsonFileConfig, simulate: bool) -> Result<()> {
        info!("Watershed v{} starting", env!("CARGO_PKG_VERSION"));

        let initial = file.load().unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            PumpConfig::default()
        });
        let store = Arc::new(ConfigStore::new(initial));
        let status = Arc::new(RuntimeStatus::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        {
            let shutdown = Arc::clone(&shutdown);
            ctrlc::set_handler(move || {
                shutdown.store(true, Ordering::Relaxed);
            })
            .context("installing signal handler")?;
        }

        let pump = if simulate {
            spawn_pump(SimOutputFactory::new(), &store, &status, &shutdown)?
        } else {
            spawn_pump(SysfsPwmFactory::default(), &store, &status, &shutdown)?
        };
        let watch = {
            let (store, status, shutdown) =
                (Arc::clone(&store), Arc::clone(&status), Arc::clone(&shutdown));
            thread::Builder::new()
                .name("config-watch".into())
                .spawn(move || watch_config(file, store, status, shutdown))?
        };

        pump.join().map_err(|_| anyhow!("pump thread panicked"))?;
        shutdown.store(true, Ordering::Relaxed);
        watch.join().map_err(|_| anyhow!("config-watch thread panicked"))?;
        info!("Watershed stopped");
        Ok(())
    }

    fn spawn_pump<F>(
        factory: F,
        store: &Arc<ConfigStore>,
        status: &Arc<RuntimeStatus>,
        shutdown: &Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>>
    where
        F: OutputFactory + Send + 'static,
    {
        let (store, status, shutdown) =
            (Arc::clone(store), Arc::clone(status), Arc::clone(shutdown));
        thread::Builder::new().name("pump".into()).spawn(move || {
            BlockingController::new(
                store,
                factory,
                SystemClock::new(),
                LocalWallClock::new(),
                LogEventSink::new(),
            )
            .with_status(status)
            .with_shutdown(shutdown)
            .run_forever();
        })
    }

    /// Polls the config file for edits and keeps the status file fresh
    /// for `watershed status`.
    fn watch_config(
        file: JsonFileConfig,
        store: Arc<ConfigStore>,
        status: Arc<RuntimeStatus>,
        shutdown: Arc<AtomicBool>,
    ) {
        let clock = SystemClock::new();
        let mut sink = LogEventSink::new();
        let mut watcher = ConfigWatcher::new(&file);
        let mut status_file = StatusFile::beside(file.path());
        while !shutdown.load(Ordering::Relaxed) {
            watcher.poll(clock.now_ms(), &file, &store, &mut sink);
            if let Err(e) = status_file.publish(status.snapshot(), unix_now_ms()) {
                warn!("Status: cannot write {}: {}", status_file.path().display(), e);
            }
            clock.sleep_ms(WATCH_POLL_MS);
        }
        status_file.remove();
    }
}
