use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub type LineSubscriber = Box<dyn Fn(&str) + Send>;

/// Run-scoped line logger shared by the runner and parallel workers.
/// Every line goes to the console, to the run log file when one is open,
/// and to each registered subscriber.
pub struct RunLogger {
    test_name: String,
    file: Mutex<Option<BufWriter<fs::File>>>,
    subscribers: Mutex<Vec<LineSubscriber>>,
}

impl RunLogger {
    /// Console-only logger, used by tests and embedded hosts.
    pub fn console(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            file: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Opens `<dir>/<test_name>_results.log` alongside the console sink.
    /// Falls back to console-only output when the file cannot be created.
    pub fn with_log_dir(test_name: impl Into<String>, dir: &Path) -> Self {
        let test_name = test_name.into();
        let writer = match fs::create_dir_all(dir) {
            Ok(()) => {
                let path = dir.join(format!("{test_name}_results.log"));
                match fs::File::create(&path) {
                    Ok(file) => Some(BufWriter::new(file)),
                    Err(err) => {
                        eprintln!("[warn] failed to create log file {:?}: {err}", path);
                        None
                    }
                }
            }
            Err(err) => {
                eprintln!("[warn] failed to create log directory {:?}: {err}", dir);
                None
            }
        };
        Self {
            test_name,
            file: Mutex::new(writer),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn add_subscriber(&self, subscriber: LineSubscriber) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    // A panicking subscriber or writer poisons its lock; the run keeps
    // going, so later lines recover the guard instead of vanishing.
    pub fn log(&self, line: &str) {
        let stamped = format!("{} {}", timestamp(), line);
        println!("{stamped}");
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = guard.as_mut() {
            if let Err(err) = writeln!(writer, "{stamped}") {
                eprintln!("[warn] failed to write log line: {err}");
            }
        }
        drop(guard);
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for subscriber in subscribers.iter() {
            subscriber(&stamped);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(&format!("INFO  {message}"));
    }

    pub fn warn(&self, message: &str) {
        self.log(&format!("WARN  {message}"));
    }

    pub fn error(&self, message: &str) {
        self.log(&format!("ERROR {message}"));
    }

    pub fn debug(&self, message: &str) {
        self.log(&format!("DEBUG {message}"));
    }

    pub fn pass(&self, label: &str, name: &str) {
        self.log(&format!("PASS  {label}: {name}"));
    }

    pub fn fail(&self, label: &str, name: &str, detail: &str) {
        self.log(&format!("FAIL  {label}: {name}: {detail}"));
    }

    pub fn skip(&self, label: &str, name: &str) {
        self.log(&format!("SKIP  {label}: {name}"));
    }

    pub fn step_start(&self, label: &str, name: &str, negative: bool) {
        if negative {
            self.log(&format!("[NEGATIVE TEST] {label}: {name}"));
        } else {
            self.log(&format!("{label}: {name}"));
        }
    }

    pub fn run_start(&self) {
        self.log(&format!("===== {}: START =====", self.test_name));
    }

    pub fn run_end(&self, result: &str) {
        self.log(&format!("===== {}: RESULT: {result} =====", self.test_name));
    }

    /// Flushes the log file and drops all subscribers. Called once when
    /// the run finishes; further lines stay console-only.
    pub fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = guard.as_mut() {
            if let Err(err) = writer.flush() {
                eprintln!("[warn] failed to flush log file: {err}");
            }
        }
        *guard = None;
        drop(guard);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collector() -> (Arc<Mutex<Vec<String>>>, LineSubscriber) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let subscriber: LineSubscriber = Box::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        });
        (lines, subscriber)
    }

    #[test]
    fn subscribers_receive_every_line() {
        let logger = RunLogger::console("tc_demo");
        let (lines, subscriber) = collector();
        logger.add_subscriber(subscriber);

        logger.info("link up");
        logger.warn("retrying");

        let captured = lines.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert!(captured[0].contains("INFO  link up"));
        assert!(captured[1].contains("WARN  retrying"));
    }

    #[test]
    fn negative_steps_are_flagged_in_the_banner() {
        let logger = RunLogger::console("tc_demo");
        let (lines, subscriber) = collector();
        logger.add_subscriber(subscriber);

        logger.step_start("STEP 2", "ping unreachable host", true);
        let captured = lines.lock().unwrap();
        assert!(captured[0].contains("[NEGATIVE TEST] STEP 2: ping unreachable host"));
    }

    #[test]
    fn close_drops_subscribers() {
        let logger = RunLogger::console("tc_demo");
        let (lines, subscriber) = collector();
        logger.add_subscriber(subscriber);

        logger.info("before close");
        logger.close();
        logger.info("after close");

        assert_eq!(lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn logging_continues_after_a_subscriber_panic_poisons_the_lock() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let logger = RunLogger::console("tc_poison");
        let armed = Arc::new(AtomicBool::new(true));
        let trigger = Arc::clone(&armed);
        logger.add_subscriber(Box::new(move |_line: &str| {
            if trigger.swap(false, Ordering::SeqCst) {
                panic!("subscriber choked");
            }
        }));
        let (lines, subscriber) = collector();
        logger.add_subscriber(subscriber);

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            logger.info("poisons the lock");
        }));
        assert!(first.is_err());

        logger.info("still delivered");
        let captured = lines.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].contains("still delivered"));
    }

    #[test]
    fn file_logger_writes_the_run_log() {
        let dir = std::env::temp_dir().join(format!("benchrun_log_{}", std::process::id()));
        let logger = RunLogger::with_log_dir("tc_file", &dir);
        logger.run_start();
        logger.info("hello");
        logger.close();

        let contents = std::fs::read_to_string(dir.join("tc_file_results.log")).unwrap();
        assert!(contents.contains("===== tc_file: START ====="));
        assert!(contents.contains("INFO  hello"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn logging_from_many_threads_does_not_drop_lines() {
        let logger = Arc::new(RunLogger::console("tc_threads"));
        let (lines, subscriber) = collector();
        logger.add_subscriber(subscriber);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let logger = Arc::clone(&logger);
                scope.spawn(move || {
                    for i in 0..25 {
                        logger.info(&format!("worker {worker} line {i}"));
                    }
                });
            }
        });

        assert_eq!(lines.lock().unwrap().len(), 100);
    }
}
