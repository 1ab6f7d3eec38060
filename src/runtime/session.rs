//! One local replica and any number of remote replicas, driven frame by frame.
//!
//! Only `Success` is replicated. The local replica is its single writer; each
//! remote receives changes through its own channel after a fixed frame delay.

use std::collections::VecDeque;

use crate::graph::Controller;
use crate::logging;

use super::replica::{FrameInput, FrameReport, Replica};

/// Delayed one-way delivery of the synchronized `Success` value.
#[derive(Debug, Clone)]
pub struct ReplicationChannel {
    delay_frames: u64,
    pending: VecDeque<(u64, bool)>,
    last_published: bool,
}

impl ReplicationChannel {
    pub fn new(delay_frames: u64) -> Self {
        Self {
            delay_frames,
            pending: VecDeque::new(),
            last_published: false,
        }
    }

    pub fn delay_frames(&self) -> u64 {
        self.delay_frames
    }

    /// Queues `value` if it differs from the last published value.
    /// Returns the delivery frame when something was queued.
    pub fn publish(&mut self, frame: u64, value: bool) -> Option<u64> {
        if value == self.last_published {
            return None;
        }
        self.last_published = value;
        let deliver_at = frame + self.delay_frames;
        self.pending.push_back((deliver_at, value));
        Some(deliver_at)
    }

    /// Latest value due at or before `frame`, if any.
    pub fn deliver(&mut self, frame: u64) -> Option<bool> {
        let mut latest = None;
        while let Some(&(at, value)) = self.pending.front() {
            if at > frame {
                break;
            }
            self.pending.pop_front();
            latest = Some(value);
        }
        latest
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub local: FrameReport,
    pub remotes: Vec<FrameReport>,
}

#[derive(Debug, Clone)]
pub struct Session {
    local: Replica,
    remotes: Vec<(Replica, ReplicationChannel)>,
    frame: u64,
}

impl Session {
    /// `remote_delays[i]` is the replication delay, in frames, of remote `i`.
    pub fn new(controller: &Controller, remote_delays: &[u64]) -> Self {
        let remotes = remote_delays
            .iter()
            .enumerate()
            .map(|(i, &delay)| {
                (
                    Replica::new(&format!("remote-{i}"), controller, false),
                    ReplicationChannel::new(delay),
                )
            })
            .collect();
        Self {
            local: Replica::new("local", controller, true),
            remotes,
            frame: 0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn local(&self) -> &Replica {
        &self.local
    }

    pub fn remotes(&self) -> impl Iterator<Item = &Replica> {
        self.remotes.iter().map(|(r, _)| r)
    }

    /// Steps the local replica with `input`, publishes `Success`, then steps
    /// every remote after applying whatever replication is due this frame.
    pub fn step(&mut self, input: FrameInput) -> SessionReport {
        self.frame += 1;
        let local = self.local.step(input);
        let success = self.local.success();

        let mut remotes = Vec::with_capacity(self.remotes.len());
        for (replica, channel) in self.remotes.iter_mut() {
            if let Some(deliver_at) = channel.publish(self.frame, success) {
                logging::log_success_published(self.frame, deliver_at);
            }
            if let Some(value) = channel.deliver(self.frame) {
                replica.set_synced_success(value);
                logging::log_success_delivered(replica.id(), self.frame);
            }
            remotes.push(replica.step(FrameInput::idle(input.dt)));
        }

        SessionReport { local, remotes }
    }

    /// True when every remote agrees with the local `Success` value.
    pub fn converged(&self) -> bool {
        let success = self.local.success();
        self.remotes().all(|r| r.success() == success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delays_and_dedupes() {
        let mut ch = ReplicationChannel::new(3);
        assert_eq!(ch.publish(1, false), None);
        assert_eq!(ch.publish(2, true), Some(5));
        assert_eq!(ch.publish(3, true), None);
        assert_eq!(ch.deliver(4), None);
        assert_eq!(ch.deliver(5), Some(true));
        assert_eq!(ch.in_flight(), 0);
    }

    #[test]
    fn test_channel_delivers_latest_due() {
        let mut ch = ReplicationChannel::new(0);
        ch.publish(1, true);
        ch.publish(1, false);
        assert_eq!(ch.deliver(1), Some(false));
    }
}
