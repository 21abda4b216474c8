use crate::config::{RemoteControlConfig, SessionInfo};
use cvep_timing::{HighPrecisionTimer, Timer};
use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;
use tracing::info;

/// Text-command client for the recording application's remote-control port.
///
/// Each command is followed by a pause so the recorder can act on it before
/// the next one arrives; `start` and `stop` wait longest.
#[derive(Debug)]
pub struct LabRecorder<W: Write, T: Timer = HighPrecisionTimer> {
    stream: W,
    settle: Duration,
    timer: T,
}

impl LabRecorder<TcpStream> {
    pub fn connect(config: &RemoteControlConfig) -> io::Result<Self> {
        let stream = TcpStream::connect(&config.address)?;
        info!(address = %config.address, "connected to recorder remote control");
        Ok(Self::new(
            stream,
            Duration::from_millis(config.settle_ms),
            HighPrecisionTimer::new(),
        ))
    }
}

impl<W: Write, T: Timer> LabRecorder<W, T> {
    pub fn new(stream: W, settle: Duration, timer: T) -> Self {
        Self {
            stream,
            settle,
            timer,
        }
    }

    /// Recording lands in `root/sub-S/ses-N/sub-S_ses-N_run-R_task-T.xdf`.
    pub fn set_filename(&mut self, root: &str, info: &SessionInfo) -> io::Result<()> {
        let cmd = format!(
            "filename {{root:{root}}} {{task:{}}} {{run:{:x}}} {{participant:{}}} {{session:{}}}\n",
            info.task, info.run, info.subject, info.session
        );
        self.send(&cmd, 1)
    }

    /// Refreshes the recorder's stream list.
    pub fn update(&mut self) -> io::Result<()> {
        self.send("update\n", 2)
    }

    pub fn start(&mut self) -> io::Result<()> {
        self.send("start\n", 5)
    }

    pub fn stop(&mut self) -> io::Result<()> {
        self.send("stop\n", 5)
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    fn send(&mut self, cmd: &str, settle_units: u32) -> io::Result<()> {
        self.stream.write_all(cmd.as_bytes())?;
        self.stream.flush()?;
        if !self.settle.is_zero() {
            self.timer.sleep(self.settle * settle_units);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvep_timing::ManualTimer;

    #[test]
    fn writes_newline_terminated_commands() {
        let info = SessionInfo {
            run: 10,
            ..SessionInfo::default()
        };
        let mut recorder = LabRecorder::new(Vec::new(), Duration::ZERO, ManualTimer::new());
        recorder.set_filename("data", &info).unwrap();
        recorder.update().unwrap();
        recorder.start().unwrap();
        recorder.stop().unwrap();
        let sent = String::from_utf8(recorder.into_inner()).unwrap();
        assert_eq!(
            sent,
            "filename {root:data} {task:cvep} {run:a} {participant:sub-01} {session:01}\n\
             update\nstart\nstop\n"
        );
    }

    #[test]
    fn settle_pauses_go_through_the_timer() {
        let timer = ManualTimer::new();
        let mut recorder = LabRecorder::new(Vec::new(), Duration::from_millis(100), timer.clone());
        recorder.set_filename("data", &SessionInfo::default()).unwrap();
        assert_eq!(timer.now(), 100_000_000);
        recorder.update().unwrap();
        recorder.start().unwrap();
        assert_eq!(timer.now(), 800_000_000);
        recorder.stop().unwrap();
        assert_eq!(timer.elapsed(0), Duration::from_millis(1300));
    }
}
