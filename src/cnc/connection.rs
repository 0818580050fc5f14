use std::{collections::VecDeque, time::Duration};

use anyhow::{bail, Context};
use tokio::{
    io::{split, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    select,
    time::{interval, sleep, MissedTickBehavior},
};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, warn};

use crate::{config::TrackerConfig, util::format_bytes::format_bytes};

use super::grbl::{
    messages::GrblMessage,
    realtime::RealtimeCommand,
    tracker::{MachineTracker, TrackerSnapshot},
};

/// Opens the port 8N1 and pulses DTR, which resets Arduino based controllers.
pub async fn open_and_reset_serial(
    path: &str,
    baud_rate: u32,
) -> Result<(impl AsyncRead, impl AsyncWrite), tokio_serial::Error> {
    let mut port = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(30))
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()?;
    port.write_data_terminal_ready(false)?;
    sleep(Duration::from_millis(2)).await;
    port.write_data_terminal_ready(true)?;
    Ok(split(port))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines_sent: usize,
    pub lines_rejected: usize,
}

/*
    Streams `program` to the controller without overrunning its receive buffer: a line is written
only once the tracker says it fits, every received line goes through the tracker, the controller is
polled with `?` and the simulation ticked on their own intervals. Returns once every line has been
answered. `on_snapshot` sees each snapshot that differs from the previous one.
*/
pub async fn stream_program<Read, Write>(
    reader: Read,
    mut writer: Write,
    program: impl IntoIterator<Item = String>,
    tracker: &mut MachineTracker,
    config: &TrackerConfig,
    mut on_snapshot: impl FnMut(&TrackerSnapshot),
) -> anyhow::Result<StreamSummary>
where
    Read: AsyncRead + Unpin,
    Write: AsyncWrite + Unpin,
{
    config.validate()?;
    let mut lines = BufReader::new(reader).lines();
    info!("waiting for greeting");
    loop {
        match lines.next_line().await.context("reading from controller")? {
            Some(line) => {
                if let GrblMessage::GrblGreeting(version) = tracker.receive_message(&line) {
                    info!("connected to Grbl {}", version);
                    break;
                }
            }
            None => bail!("controller closed the connection before greeting"),
        }
    }

    let mut pending: VecDeque<Vec<u8>> = program
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .map(|mut line| {
            line.push('\n');
            line.into_bytes()
        })
        .collect();
    let mut summary = StreamSummary::default();
    let mut last_snapshot = tracker.snapshot();
    on_snapshot(&last_snapshot);
    let mut status_poll = interval(config.status_poll_interval());
    status_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut simulation_tick = interval(config.tick_interval());
    simulation_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        while let Some(next) = pending.front() {
            if tracker.would_overflow(next) {
                if tracker.buffer().pending_size() == 0 {
                    bail!("line {} does not fit in the controller buffer", format_bytes(next));
                }
                break;
            }
            writer.write_all(next).await.context("writing to controller")?;
            summary.lines_sent += 1;
            if tracker.send_command(next).is_err() {
                summary.lines_rejected += 1;
            }
            pending.pop_front();
        }
        writer.flush().await.context("writing to controller")?;
        if pending.is_empty() && tracker.buffer().pending_size() == 0 {
            info!("program finished: {:?}", summary);
            return Ok(summary);
        }

        select! {
            line = lines.next_line() => match line.context("reading from controller")? {
                Some(line) => {
                    debug!("received {:?}", line);
                    if let GrblMessage::GrblGreeting(_) = tracker.receive_message(&line) {
                        warn!("controller reset while streaming; {} lines not sent", pending.len());
                        bail!("controller reset while streaming");
                    }
                }
                None => bail!("controller disconnected"),
            },
            _ = status_poll.tick() => {
                let query = [RealtimeCommand::StatusReport.byte()];
                writer.write_all(&query).await.context("writing to controller")?;
                writer.flush().await.context("writing to controller")?;
                // Realtime bytes never fail to classify.
                let _ = tracker.send_command(&query);
            },
            _ = simulation_tick.tick() => {
                tracker.tick();
                let snapshot = tracker.snapshot();
                if snapshot != last_snapshot {
                    on_snapshot(&snapshot);
                    last_snapshot = snapshot;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    use super::*;

    // Answers `?` with a status report and every newline-terminated line with `ok`.
    async fn fake_controller(stream: DuplexStream) -> Vec<String> {
        let (reader, mut writer) = split(stream);
        let mut reader = BufReader::new(reader);
        let mut received = vec![];
        let mut line = vec![];
        if writer.write_all(b"\r\nGrbl 1.1h ['$' for help]\r\n").await.is_err() {
            return received;
        }
        loop {
            let mut byte = [0u8];
            match reader.read(&mut byte).await {
                Ok(0) | Err(_) => return received,
                Ok(_) => (),
            }
            let reply: &[u8] = match byte[0] {
                b'?' => b"<Idle|MPos:1.000,2.000,3.000|Bf:15,128>\r\n",
                b'\n' => {
                    received.push(String::from_utf8_lossy(&line).into_owned());
                    line.clear();
                    b"ok\r\n"
                }
                other => {
                    line.push(other);
                    continue;
                }
            };
            if writer.write_all(reply).await.is_err() {
                return received;
            }
        }
    }

    fn test_config() -> TrackerConfig {
        TrackerConfig {
            tick_interval_ms: 5,
            status_poll_interval_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn streams_program_and_waits_for_every_ack() {
        let (host, controller) = duplex(1024);
        let controller = tokio::spawn(fake_controller(controller));
        let (reader, writer) = split(host);
        let config = test_config();
        let mut tracker = MachineTracker::new(&config);
        let program = ["G21", "  ", "G1 X1 F600", "G1 X2.5.1", "G1 Y1"].map(String::from);
        let mut snapshots = vec![];
        let summary = stream_program(reader, writer, program, &mut tracker, &config, |snapshot| {
            snapshots.push(snapshot.clone())
        })
        .await
        .unwrap();

        assert_eq!(
            summary,
            StreamSummary {
                lines_sent: 4,
                lines_rejected: 1
            }
        );
        assert_eq!(tracker.buffer().pending_size(), 0);
        assert!(!snapshots.is_empty());
        let received = controller.await.unwrap();
        assert_eq!(received, vec!["G21", "G1 X1 F600", "G1 X2.5.1", "G1 Y1"]);
    }

    #[tokio::test]
    async fn oversized_line_is_an_error() {
        let (host, controller) = duplex(1024);
        let controller = tokio::spawn(fake_controller(controller));
        let (reader, writer) = split(host);
        let config = test_config();
        let mut tracker = MachineTracker::new(&config);
        let program = vec![format!("G1 X1 ({})", "x".repeat(200))];
        let result = stream_program(reader, writer, program, &mut tracker, &config, |_| ()).await;
        assert!(result.is_err());
        assert!(controller.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_intervals_are_rejected_before_streaming() {
        let (host, controller) = duplex(1024);
        let controller = tokio::spawn(fake_controller(controller));
        let (reader, writer) = split(host);
        let config = TrackerConfig {
            status_poll_interval_ms: 0,
            ..Default::default()
        };
        let mut tracker = MachineTracker::new(&config);
        let program = vec!["G21".to_string()];
        let result = stream_program(reader, writer, program, &mut tracker, &config, |_| ()).await;
        assert!(result.is_err());
        assert!(controller.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnect_before_greeting_is_an_error() {
        let (host, controller) = duplex(1024);
        drop(controller);
        let (reader, writer) = split(host);
        let config = test_config();
        let mut tracker = MachineTracker::new(&config);
        let result = stream_program(reader, writer, Vec::new(), &mut tracker, &config, |_| ()).await;
        assert!(result.is_err());
    }
}
