use crate::env;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug)]
struct Logger {
    level: LevelFilter,
    term_level: LevelFilter,
    file_level: LevelFilter,
    log_file: Option<Mutex<File>>,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if record.level() <= self.file_level
            && let Some(log_file) = &self.log_file
        {
            let mut log_file = log_file.lock().unwrap_or_else(|e| e.into_inner());
            let out = format!(
                "{now} {level:<5} {target} {args}",
                now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level = record.level(),
                target = record.target(),
                args = record.args()
            );
            let _ = writeln!(log_file, "{out}");
        }
        if record.level() <= self.term_level {
            eprintln!("{}", self.render(record));
        }
    }

    fn flush(&self) {}
}

static LOGGER: Lazy<Logger> = Lazy::new(Logger::init);

impl Logger {
    fn init() -> Self {
        let term_level = *env::HUGO_MANAGER_LOG;
        let file_level = *env::HUGO_MANAGER_LOG_FILE_LEVEL;

        let log_file = env::HUGO_MANAGER_LOG_FILE.as_ref().and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(Mutex::new(file)),
                Err(err) => {
                    eprintln!(
                        "hugo-manager: could not open log file {}: {err}",
                        path.display()
                    );
                    None
                }
            }
        });
        let file_level = if log_file.is_some() {
            file_level
        } else {
            LevelFilter::Off
        };

        Self {
            level: term_level.max(file_level),
            term_level,
            file_level,
            log_file,
        }
    }

    fn render(&self, record: &Record) -> String {
        let level = match record.level() {
            Level::Error => console::style("ERROR").red().bold(),
            Level::Warn => console::style("WARN").yellow().bold(),
            Level::Info => console::style("INFO").cyan(),
            Level::Debug => console::style("DEBUG").blue(),
            Level::Trace => console::style("TRACE").magenta(),
        };
        let prefix = console::style("hugo-manager").dim();
        if self.term_level >= LevelFilter::Debug {
            let target = console::style(record.target()).dim();
            format!("{prefix} {level} {target} {}", record.args())
        } else {
            format!("{prefix} {level} {}", record.args())
        }
    }
}

pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if let Err(err) = log::set_logger(&*LOGGER).map(|()| log::set_max_level(LOGGER.level)) {
            eprintln!("hugo-manager: could not initialize logger: {err}");
        }
    });
}
