use std::sync::atomic::{AtomicI32, Ordering};

use crate::domain::{RequestContext, TrackerId};
use crate::platform::ResultCode;
use crate::registry::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Token identifying one pending completion in the platform's shared pool.
pub struct CompletionToken(i32);

impl CompletionToken {
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

#[derive(Debug)]
/// Mints completion tokens.
///
/// The platform collapses pending completions that share a token, so every
/// target gets a fresh one. The counter wraps around after `2^32` tokens.
pub struct CompletionTokens {
    next: AtomicI32,
}

impl Default for CompletionTokens {
    fn default() -> Self {
        Self::starting_at(i32::MIN)
    }
}

impl CompletionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    pub fn next_token(&self) -> CompletionToken {
        CompletionToken(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Correlation data attached to every completion target of a send.
pub struct CompletionExtras {
    pub tracker: TrackerId,
    pub number: String,
    pub message: String,
    pub request: RequestContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Extras as they come back on a completion broadcast; any field may be missing.
pub struct BroadcastExtras {
    pub tracker_id: Option<usize>,
    pub number: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<i32>,
    pub process_id: Option<u64>,
}

impl BroadcastExtras {
    /// `None` if any expected field is missing.
    pub fn parse(self) -> Option<CompletionExtras> {
        Some(CompletionExtras {
            tracker: TrackerId::new(self.tracker_id?),
            number: self.number?,
            message: self.message?,
            request: RequestContext::new(self.request_id?, self.process_id?),
        })
    }
}

impl From<CompletionExtras> for BroadcastExtras {
    fn from(value: CompletionExtras) -> Self {
        Self {
            tracker_id: Some(value.tracker.slot()),
            number: Some(value.number),
            message: Some(value.message),
            request_id: Some(value.request.request_id),
            process_id: Some(value.request.process_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the platform should broadcast back once a segment reaches `phase`.
pub struct CompletionTarget {
    pub token: CompletionToken,
    pub phase: Phase,
    pub extras: CompletionExtras,
}

impl CompletionTarget {
    /// The broadcast the platform emits when this target completes with `result`.
    pub fn broadcast(&self, result: ResultCode) -> Broadcast {
        Broadcast::Completion {
            phase: self.phase,
            result,
            extras: Some(self.extras.clone().into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A decoded incoming message.
pub struct IncomingSms {
    pub sender: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// System broadcast delivered to the bridge.
pub enum Broadcast {
    /// One or more messages arrived.
    Received(Vec<IncomingSms>),
    /// A segment reached the SENT or DELIVERED phase.
    Completion {
        phase: Phase,
        result: ResultCode,
        /// `None` when the broadcast carried no extras at all.
        extras: Option<BroadcastExtras>,
    },
}
