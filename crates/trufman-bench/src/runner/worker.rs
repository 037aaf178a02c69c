//! One thread per seat. The runner hands each worker a snapshot and waits for
//! the answer; the worker never touches the table itself.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use trufman_bot::{CancelFlag, Decision, Policy};
use trufman_core::game::snapshot::RoundSnapshot;
use trufman_core::model::bid::Bid;
use trufman_core::model::player::PlayerPosition;
use trufman_core::model::suit::Suit;
use trufman_core::model::trick::CompletedTrick;

enum Command {
    Bid(Box<RoundSnapshot>),
    Play(Box<RoundSnapshot>),
    ObserveBids([Bid; 4]),
    ObserveTrick(Box<CompletedTrick>, Suit),
    RoundEnd([u8; 4], [i32; 4]),
    Reset(bool),
}

enum Reply {
    Bid(Option<Bid>),
    Play(Option<Decision>),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker for {seat} stopped unexpectedly")]
    Disconnected { seat: PlayerPosition },
    #[error("worker for {seat} answered a different request")]
    UnexpectedReply { seat: PlayerPosition },
}

pub struct AgentWorker {
    seat: PlayerPosition,
    agent: &'static str,
    commands: Option<Sender<Command>>,
    replies: Receiver<Reply>,
    cancel: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

impl AgentWorker {
    /// Moves `policy` onto its own thread. `cancel` is checked by in-flight evaluations.
    pub fn spawn(policy: Box<dyn Policy>, cancel: CancelFlag) -> io::Result<Self> {
        let seat = policy.seat();
        let agent = policy.name();
        let (command_tx, command_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let thread_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("trufman-seat-{}", seat.index()))
            .spawn(move || serve(policy, command_rx, reply_tx, thread_cancel))?;
        Ok(Self {
            seat,
            agent,
            commands: Some(command_tx),
            replies: reply_rx,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn seat(&self) -> PlayerPosition {
        self.seat
    }

    pub fn agent(&self) -> &'static str {
        self.agent
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn bid(&self, snapshot: &RoundSnapshot) -> Result<Option<Bid>, WorkerError> {
        self.send(Command::Bid(Box::new(snapshot.clone())))?;
        match self.receive()? {
            Reply::Bid(bid) => Ok(bid),
            Reply::Play(_) => Err(WorkerError::UnexpectedReply { seat: self.seat }),
        }
    }

    /// Blocks until the evaluation finishes or observes the cancel flag.
    pub fn play(&self, snapshot: &RoundSnapshot) -> Result<Option<Decision>, WorkerError> {
        self.send(Command::Play(Box::new(snapshot.clone())))?;
        match self.receive()? {
            Reply::Play(decision) => Ok(decision),
            Reply::Bid(_) => Err(WorkerError::UnexpectedReply { seat: self.seat }),
        }
    }

    pub fn observe_bids(&self, bids: [Bid; 4]) -> Result<(), WorkerError> {
        self.send(Command::ObserveBids(bids))
    }

    pub fn observe_trick(&self, trick: &CompletedTrick, trump: Suit) -> Result<(), WorkerError> {
        self.send(Command::ObserveTrick(Box::new(trick.clone()), trump))
    }

    pub fn round_end(&self, tricks_won: [u8; 4], deltas: [i32; 4]) -> Result<(), WorkerError> {
        self.send(Command::RoundEnd(tricks_won, deltas))
    }

    pub fn reset(&self, hard: bool) -> Result<(), WorkerError> {
        self.send(Command::Reset(hard))
    }

    /// Drains queued observations, then joins the thread.
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), WorkerError> {
        self.commands.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WorkerError::Disconnected { seat: self.seat }),
            None => Ok(()),
        }
    }

    fn send(&self, command: Command) -> Result<(), WorkerError> {
        self.commands
            .as_ref()
            .ok_or(WorkerError::Disconnected { seat: self.seat })?
            .send(command)
            .map_err(|_| WorkerError::Disconnected { seat: self.seat })
    }

    fn receive(&self) -> Result<Reply, WorkerError> {
        self.replies
            .recv()
            .map_err(|_| WorkerError::Disconnected { seat: self.seat })
    }
}

impl Drop for AgentWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn serve(mut policy: Box<dyn Policy>, commands: Receiver<Command>, replies: Sender<Reply>, cancel: CancelFlag) {
    for command in commands {
        let reply = match command {
            Command::Bid(snapshot) => Some(Reply::Bid(policy.choose_bid(&snapshot))),
            Command::Play(snapshot) => Some(Reply::Play(policy.choose_play(&snapshot, &cancel))),
            Command::ObserveBids(bids) => {
                policy.observe_bids(&bids);
                None
            }
            Command::ObserveTrick(trick, trump) => {
                policy.observe_trick(&trick, trump);
                None
            }
            Command::RoundEnd(tricks_won, deltas) => {
                policy.observe_round_end(&tricks_won, &deltas);
                None
            }
            Command::Reset(hard) => {
                policy.reset(hard);
                None
            }
        };
        if let Some(reply) = reply {
            if replies.send(reply).is_err() {
                break;
            }
        }
    }
}
