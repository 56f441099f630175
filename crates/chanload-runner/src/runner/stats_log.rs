use anyhow::Context;
use chanload::FetchSample;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Append-only log of successful subscription listings.
///
/// One line per listing: `<unix_nanos> <entries> <latency_ms>`. Samples are
/// queued to a dedicated writer thread, so recording never touches the file
/// on the caller's thread. The buffer is flushed whenever the queue drains
/// and when the log is dropped.
pub struct SubscriptionLog {
    tx: Option<mpsc::UnboundedSender<FetchSample>>,
    writer: Option<JoinHandle<()>>,
}

impl SubscriptionLog {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| {
                format!("failed to open subscription stats log `{}`", path.display())
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let path = path.to_owned();
        let writer = std::thread::Builder::new()
            .name("chanload-stats-log".into())
            .spawn(move || write_loop(&path, BufWriter::new(file), rx))
            .context("failed to spawn subscription stats writer")?;

        Ok(Self {
            tx: Some(tx),
            writer: Some(writer),
        })
    }

    pub fn record(&self, sample: &FetchSample) {
        if let Some(tx) = &self.tx {
            if tx.send(*sample).is_err() {
                tracing::warn!("Subscription stats writer is gone, dropping sample");
            }
        }
    }
}

impl Drop for SubscriptionLog {
    fn drop(&mut self) {
        // Closing the channel ends the write loop after it drains.
        drop(self.tx.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::warn!("Subscription stats writer panicked");
            }
        }
    }
}

fn write_loop(
    path: &Path,
    mut out: BufWriter<File>,
    mut rx: mpsc::UnboundedReceiver<FetchSample>,
) {
    while let Some(sample) = rx.blocking_recv() {
        let mut result = write_sample(&mut out, &sample);
        while let Ok(sample) = rx.try_recv() {
            result = result.and(write_sample(&mut out, &sample));
        }
        if let Err(err) = result.and_then(|()| out.flush()) {
            tracing::warn!(
                "Failed to write subscription stats to `{}`: {err}",
                path.display()
            );
        }
    }
}

fn write_sample(out: &mut impl Write, sample: &FetchSample) -> std::io::Result<()> {
    writeln!(
        out,
        "{} {} {}",
        sample.completed_at_nanos, sample.entries, sample.latency_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_sample() {
        let path = std::env::temp_dir().join(format!(
            "chanload-stats-{}-{}.log",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let log = SubscriptionLog::open(&path).unwrap();
            log.record(&FetchSample {
                completed_at_nanos: 1_700_000_000_000_000_000,
                entries: 3,
                latency_ms: 12,
            });
        }
        // Reopening appends rather than truncating.
        let log = SubscriptionLog::open(&path).unwrap();
        log.record(&FetchSample {
            completed_at_nanos: 1_700_000_000_500_000_000,
            entries: 1,
            latency_ms: 4,
        });
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(
            contents,
            "1700000000000000000 3 12\n1700000000500000000 1 4\n"
        );
    }

    #[test]
    fn concurrent_records_all_land_on_drop() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 250;

        let path = std::env::temp_dir().join(format!(
            "chanload-stats-{}-{}.log",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);

        let log = SubscriptionLog::open(&path).unwrap();
        std::thread::scope(|s| {
            for t in 0..THREADS {
                let log = &log;
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        log.record(&FetchSample {
                            completed_at_nanos: (t * PER_THREAD + i) as u128,
                            entries: t,
                            latency_ms: i as u64,
                        });
                    }
                });
            }
        });
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(contents.lines().count(), THREADS * PER_THREAD);
        assert!(contents.lines().all(|line| line.split(' ').count() == 3));
    }
}
