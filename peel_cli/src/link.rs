//! Stdin/stdout bridge for the host link, with an optional force-log tee.
//!
//! A reader thread feeds stdin bytes through a channel so the kernel's
//! non-blocking `read_byte` never waits on the terminal. Lines that carry a
//! force sample ("<position>,<newtons>") are also appended to a CSV log when
//! one is configured.

use std::io::{Read, Write};
use std::path::Path;
use std::thread;

use crossbeam_channel as xch;
use peel_traits::HostLink;

pub struct StdioLink {
    rx: xch::Receiver<u8>,
    force_log: Option<csv::Writer<std::fs::File>>,
}

impl StdioLink {
    /// Spawn the stdin reader and open the force log, if requested.
    pub fn spawn(force_log: Option<&Path>) -> eyre::Result<Self> {
        let (tx, rx) = xch::unbounded::<u8>();
        thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                let mut stdin = std::io::stdin().lock();
                let mut buf = [0u8; 256];
                loop {
                    match stdin.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            for b in &buf[..n] {
                                if tx.send(*b).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            })
            .map_err(|e| eyre::eyre!("spawn stdin reader: {e}"))?;

        let force_log = match force_log {
            Some(path) => {
                let fresh = !path.exists();
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| eyre::eyre!("open force log {:?}: {}", path, e))?;
                let mut wtr = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file);
                if fresh {
                    wtr.write_record(["position", "newtons"])
                        .map_err(|e| eyre::eyre!("write force log header: {e}"))?;
                }
                Some(wtr)
            }
            None => None,
        };

        Ok(Self { rx, force_log })
    }

    fn tee_force_sample(&mut self, line: &str) {
        let Some(wtr) = self.force_log.as_mut() else {
            return;
        };
        let Some((pos, newtons)) = parse_force_line(line) else {
            return;
        };
        let rec = [pos.to_string(), newtons.to_string()];
        if let Err(e) = wtr.write_record(&rec).and_then(|()| wtr.flush().map_err(Into::into)) {
            tracing::warn!(error = %e, "force log write failed");
        }
    }
}

fn parse_force_line(line: &str) -> Option<(u32, f32)> {
    let (pos, newtons) = line.split_once(',')?;
    Some((pos.parse().ok()?, newtons.parse().ok()?))
}

impl HostLink for StdioLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.try_recv().ok()
    }

    fn write_line(&mut self, line: &str) {
        self.tee_force_sample(line);
        let mut out = std::io::stdout().lock();
        // Best effort, like a UART with no flow control.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}
