// src/pacing/driver.rs
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::core::error::{GovernorError, GovernorResult};
use crate::core::logging::{ComponentLogger, LogContext};

use super::pacer::{CaptureCallback, CapturedFrame, FramePacer, FrameScheduler, PacerStats};

pub enum PacerCommand {
    Start(CaptureCallback),
    Pause(bool),
    SetMaxFramerateFps(u32),
    FrameCaptured(Option<CapturedFrame>),
    Stats(Sender<PacerStats>),
    Shutdown,
}

/// Cloneable sender side of a [`PacerDriver`]. Safe to use from any thread.
#[derive(Clone)]
pub struct PacerHandle {
    name: String,
    commands: Sender<PacerCommand>,
}

impl PacerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start<F>(&self, capture_callback: F) -> GovernorResult<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.send(PacerCommand::Start(Box::new(capture_callback)))
    }

    pub fn pause(&self, pause: bool) -> GovernorResult<()> {
        self.send(PacerCommand::Pause(pause))
    }

    pub fn set_max_framerate_fps(&self, max_framerate_fps: u32) -> GovernorResult<()> {
        self.send(PacerCommand::SetMaxFramerateFps(max_framerate_fps))
    }

    pub fn frame_captured(&self, frame: Option<CapturedFrame>) -> GovernorResult<()> {
        self.send(PacerCommand::FrameCaptured(frame))
    }

    pub fn stats(&self) -> GovernorResult<PacerStats> {
        let (tx, rx) = channel::bounded(1);
        self.send(PacerCommand::Stats(tx))?;
        rx.recv()
            .map_err(|_| GovernorError::pacer_stopped(&self.name))
    }

    fn send(&self, command: PacerCommand) -> GovernorResult<()> {
        self.commands
            .send(command)
            .map_err(|_| GovernorError::pacer_stopped(&self.name))
    }
}

/// Runs a [`FramePacer`] on its own thread.
///
/// Every pacer call, timer firings included, happens on that thread; other
/// threads talk to it through a [`PacerHandle`].
pub struct PacerDriver {
    handle: PacerHandle,
    thread: Option<JoinHandle<()>>,
}

impl PacerDriver {
    pub fn spawn(name: &str) -> GovernorResult<Self> {
        let (tx, rx) = channel::unbounded();
        let pacer_name = name.to_string();
        let thread = thread::Builder::new()
            .name(format!("pacer-{}", name))
            .spawn(move || run(FramePacer::new(&pacer_name), rx))
            .map_err(|e| GovernorError::with_context(format!("spawning pacer '{}'", name), e))?;

        let driver = Self {
            handle: PacerHandle {
                name: name.to_string(),
                commands: tx,
            },
            thread: Some(thread),
        };
        driver.info("driver started");
        Ok(driver)
    }

    pub fn handle(&self) -> PacerHandle {
        self.handle.clone()
    }

    /// Stops the pacer thread and waits for it. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.handle.commands.send(PacerCommand::Shutdown);
        if thread.join().is_err() {
            self.error("pacer thread panicked");
        } else {
            self.info("driver stopped");
        }
    }
}

impl Drop for PacerDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ComponentLogger for PacerDriver {
    fn log_context(&self) -> LogContext {
        LogContext::new("PacerDriver", &self.handle.name)
    }
}

fn run(mut pacer: FramePacer, commands: Receiver<PacerCommand>) {
    loop {
        let received = match pacer.next_wakeup() {
            Some(deadline) => match commands.recv_deadline(deadline) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        if let Some(command) = received {
            if !apply(&mut pacer, command) {
                break;
            }
        }
        // A steady stream of commands must not starve the capture timer.
        pacer.poll();
    }
    pacer.debug("command loop finished");
}

fn apply(pacer: &mut FramePacer, command: PacerCommand) -> bool {
    match command {
        PacerCommand::Start(callback) => pacer.start(callback),
        PacerCommand::Pause(pause) => pacer.pause(pause),
        PacerCommand::SetMaxFramerateFps(fps) => pacer.set_max_framerate_fps(fps),
        PacerCommand::FrameCaptured(frame) => pacer.on_frame_captured(frame.as_ref()),
        PacerCommand::Stats(reply) => {
            let _ = reply.send(pacer.stats());
        }
        PacerCommand::Shutdown => return false,
    }
    true
}
