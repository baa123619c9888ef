use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::MakeWriter;

enum LogTask {
    Write(Vec<u8>),
    Flush,
    Reopen,
    Terminal,
}

/// Appends formatted log lines to a file from a background task so that
/// request handlers never block on log I/O.
pub struct LogWriter {
    path: PathBuf,
    sender: mpsc::Sender<LogTask>,
    task: Mutex<Option<JoinHandle<anyhow::Result<()>>>>,
}

pub struct Writer<'a> {
    sender: &'a mpsc::Sender<LogTask>,
}

impl Write for Writer<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .try_send(LogTask::Write(buf.to_vec()))
            .map_err(|_| io::Error::other("Failed to send log task"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sender
            .try_send(LogTask::Flush)
            .map_err(|_| io::Error::other("Failed to send flush task"))
    }
}

/// Handle given to the `fmt` layer; every event becomes one write task.
#[derive(Clone)]
pub struct FileWriter {
    sender: mpsc::Sender<LogTask>,
}

impl<'a> MakeWriter<'a> for FileWriter {
    type Writer = Writer<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        Writer {
            sender: &self.sender,
        }
    }
}

impl LogWriter {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = Self::open_file(&path)?;
        let (sender, mut tasks) = mpsc::channel::<LogTask>(1024);
        let task_path = path.clone();
        let handle = tokio::spawn(async move {
            while let Some(task) = tasks.recv().await {
                match task {
                    LogTask::Write(buf) => {
                        if let Err(err) = file.write_all(&buf) {
                            eprintln!("Failed to write to log file: {err}");
                        }
                    }
                    LogTask::Flush => {
                        if let Err(err) = file.flush() {
                            eprintln!("Failed to flush log file: {err}");
                        }
                    }
                    // a failed reopen keeps the previous handle
                    LogTask::Reopen => match Self::open_file(&task_path) {
                        Ok(reopened) => file = reopened,
                        Err(err) => eprintln!("Failed to reopen log file: {err:?}"),
                    },
                    LogTask::Terminal => break,
                }
            }
            file.flush()?;
            Ok::<_, anyhow::Error>(())
        });
        Ok(Self {
            path,
            sender,
            task: Mutex::new(Some(handle)),
        })
    }

    fn open_file(path: &Path) -> anyhow::Result<File> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("Failed to open log file '{path:?}'"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_writer(&self) -> FileWriter {
        FileWriter {
            sender: self.sender.clone(),
        }
    }

    /// Reopen the log file, used after external rotation.
    pub fn reopen(&self) -> anyhow::Result<()> {
        self.sender
            .try_send(LogTask::Reopen)
            .map_err(|_| anyhow::anyhow!("Failed to send log task"))
    }

    fn terminal(&self) {
        if self.sender.try_send(LogTask::Terminal).is_err() {
            eprintln!("Failed to stop log writer for '{:?}'", self.path);
        }
    }

    /// Stop the background task after the queued lines are written.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let Some(task) = self.task.lock().ok().and_then(|mut task| task.take()) else {
            return Ok(());
        };
        self.terminal();
        task.await?
    }
}
