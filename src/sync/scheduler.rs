//! Daily sync scheduler.
//!
//! One long-lived thread waits on a monitor (mutex + condvar) for either
//! the configured daily HH:MM or a manual trigger, then runs the daily
//! task sequence: sync-check, optional certificate revalidation, optional
//! auto-reconcile. A warm-up sync-check runs 10 seconds after startup.
//! At most one daily run is in flight; triggers arriving mid-run execute
//! once the current run completes. The monitor mutex is never held across
//! the tasks themselves.

use {
    crate::store::SyncConfig,
    chrono::{Local, NaiveDate},
    std::{
        sync::{Arc, Condvar, Mutex},
        thread::JoinHandle,
        time::Duration,
    },
    tracing::{error, info},
};

const WARMUP_DELAY: Duration = Duration::from_secs(10);

/// Callbacks the scheduler drives. The reconcile callback is only invoked
/// when the latest sync-check reported discrepancies; wiring that
/// condition is the container's job.
pub struct DailyTasks {
    pub sync_check: Box<dyn Fn() + Send + Sync>,
    pub revalidate: Box<dyn Fn() + Send + Sync>,
    pub reconcile:  Box<dyn Fn() + Send + Sync>,
}

struct State {
    running:              bool,
    force_daily:          bool,
    sync_in_progress:     bool,
    last_daily_sync_date: Option<NaiveDate>,
    config:               SyncConfig,
}

struct Monitor {
    state: Mutex<State>,
    wake:  Condvar,
}

pub struct SyncScheduler {
    monitor: Arc<Monitor>,
    tasks:   Arc<DailyTasks>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

fn seconds_until(hour: u32, minute: u32) -> Duration {
    let now = Local::now().naive_local();
    let today = now.date().and_hms_opt(hour, minute, 0).unwrap_or(now);
    let target = if today <= now {
        today + chrono::Duration::days(1)
    } else {
        today
    };
    (target - now).to_std().unwrap_or(Duration::from_secs(60))
}

impl SyncScheduler {
    pub fn new(config: SyncConfig, tasks: DailyTasks) -> Self {
        Self {
            monitor: Arc::new(Monitor {
                state: Mutex::new(State {
                    running: false,
                    force_daily: false,
                    sync_in_progress: false,
                    last_daily_sync_date: None,
                    config,
                }),
                wake:  Condvar::new(),
            }),
            tasks:   Arc::new(tasks),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Start the warm-up and daily threads.
    pub fn start(&self) {
        {
            let mut state = self.monitor.state.lock().expect("scheduler monitor");
            if state.running {
                return;
            }
            state.running = true;
        }

        let warmup = {
            let monitor = Arc::clone(&self.monitor);
            let tasks = Arc::clone(&self.tasks);
            std::thread::spawn(move || {
                let state = monitor.state.lock().expect("scheduler monitor");
                let (state, _) = monitor
                    .wake
                    .wait_timeout_while(state, WARMUP_DELAY, |s| s.running)
                    .expect("scheduler monitor");
                let still_running = state.running;
                drop(state);
                if still_running {
                    info!("performing initial sync check after startup");
                    (tasks.sync_check)();
                }
            })
        };

        let daily = {
            let monitor = Arc::clone(&self.monitor);
            let tasks = Arc::clone(&self.tasks);
            std::thread::spawn(move || daily_loop(&monitor, &tasks))
        };

        let mut threads = self.threads.lock().expect("scheduler threads");
        threads.push(warmup);
        threads.push(daily);
        info!("sync scheduler started");
    }

    /// Stop the loop and join the threads.
    pub fn stop(&self) {
        {
            let mut state = self.monitor.state.lock().expect("scheduler monitor");
            state.running = false;
        }
        self.monitor.wake.notify_all();
        let mut threads = self.threads.lock().expect("scheduler threads");
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
        info!("sync scheduler stopped");
    }

    /// Manual trigger: run the daily sequence as soon as the current run
    /// (if any) finishes.
    pub fn trigger_daily_sync(&self) {
        {
            let mut state = self.monitor.state.lock().expect("scheduler monitor");
            state.force_daily = true;
        }
        self.monitor.wake.notify_all();
    }

    /// Stop the loop, swap the configuration, restart.
    pub fn reload(&self, config: SyncConfig) {
        self.stop();
        {
            let mut state = self.monitor.state.lock().expect("scheduler monitor");
            state.config = config;
            state.force_daily = false;
        }
        self.start();
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.monitor
            .state
            .lock()
            .map(|state| state.sync_in_progress)
            .unwrap_or(false)
    }
}

fn daily_loop(monitor: &Monitor, tasks: &DailyTasks) {
    let (enabled, hour, minute) = {
        let state = monitor.state.lock().expect("scheduler monitor");
        (
            state.config.daily_sync_enabled,
            state.config.daily_sync_hour,
            state.config.daily_sync_minute,
        )
    };
    if !enabled {
        info!("daily sync disabled by configuration");
        return;
    }
    info!("daily sync scheduled at {hour:02}:{minute:02}");

    loop {
        let wait = seconds_until(hour, minute);
        info!(
            "next daily sync in {}s ({}h {}m)",
            wait.as_secs(),
            wait.as_secs() / 3600,
            (wait.as_secs() % 3600) / 60
        );

        let state = monitor.state.lock().expect("scheduler monitor");
        let (mut state, _) = monitor
            .wake
            .wait_timeout_while(state, wait, |s| s.running && !s.force_daily)
            .expect("scheduler monitor");
        if !state.running {
            break;
        }

        let today = Local::now().date_naive();
        let due = state.force_daily || state.last_daily_sync_date != Some(today);
        if !due {
            continue;
        }
        state.force_daily = false;
        state.last_daily_sync_date = Some(today);
        state.sync_in_progress = true;
        let (revalidate, reconcile) = (
            state.config.revalidate_certs_on_sync,
            state.config.auto_reconcile,
        );
        // The monitor is released for the duration of the tasks.
        drop(state);

        info!("=== starting daily sync tasks ===");
        (tasks.sync_check)();
        if revalidate {
            (tasks.revalidate)();
        }
        if reconcile {
            (tasks.reconcile)();
        }
        info!("=== daily sync tasks completed ===");

        match monitor.state.lock() {
            Ok(mut state) => state.sync_in_progress = false,
            Err(poisoned) => {
                error!("scheduler monitor poisoned");
                poisoned.into_inner().sync_in_progress = false;
            }
        }
    }
}
