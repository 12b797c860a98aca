//! Room actor: an isolated Tokio task that owns one room's member set.
//!
//! Register, unregister and broadcast all travel through a single ordered
//! mailbox, so a member registered before a broadcast is always a
//! candidate recipient of it. Cancellation is a separate signal that the
//! loop checks ahead of the mailbox.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use roomcast_protocol::RoomId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{RoomConfig, RoomError, RoomState};

/// Counter for generating unique member IDs.
static NEXT_MEMBER_ID: AtomicU64 = AtomicU64::new(1);

/// Sending end of a member's outbound queue. Only the room holds one.
pub type OutboundSender = mpsc::Sender<Bytes>;

/// Receiving end of a member's outbound queue, drained by the client.
pub type OutboundReceiver = mpsc::Receiver<Bytes>;

/// Identifies one membership in a room.
///
/// A user who opens two tabs is two members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u64);

impl MemberId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_MEMBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// What a room stores per client.
#[derive(Debug)]
pub struct Member {
    id: MemberId,
    outbound: OutboundSender,
}

impl Member {
    pub fn new(id: MemberId, outbound: OutboundSender) -> Self {
        Self { id, outbound }
    }

    /// Creates a member with a fresh id and a bounded outbound queue of
    /// `capacity` payloads.
    ///
    /// The queue closes once the room lets go of the member (unregister,
    /// eviction or room shutdown), which is how the receiving side learns
    /// it is out.
    pub fn channel(capacity: usize) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(MemberId::next(), tx), rx)
    }

    pub fn id(&self) -> MemberId {
        self.id
    }
}

/// Commands sent to a room actor through its mailbox.
pub(crate) enum RoomCommand {
    /// Add a member. Replaces any earlier member with the same id.
    Register(Member),

    /// Remove a member and close its queue. No-op if absent.
    Unregister(MemberId),

    /// Offer a payload to every member without waiting.
    Broadcast(Bytes),

    /// Request a snapshot of the room.
    Info { reply: oneshot::Sender<RoomInfo> },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    /// The room's ID.
    pub room_id: RoomId,
    /// Current lifecycle state.
    pub state: RoomState,
    /// Number of members currently registered.
    pub member_count: usize,
    /// Registered members, in ascending id order.
    pub members: Vec<MemberId>,
}

/// Handle to a running room actor.
///
/// Cheap to clone. Every operation fails with [`RoomError::Unavailable`]
/// once the room has stopped.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
    cancel: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("state", &self.state())
            .finish()
    }
}

impl RoomHandle {
    /// Returns the room's ID.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Adds a member to the room.
    ///
    /// Waits only for mailbox space; the member is in the room once every
    /// command queued before this one has been handled.
    pub async fn register(&self, member: Member) -> Result<(), RoomError> {
        self.send(RoomCommand::Register(member)).await
    }

    /// Removes a member from the room, closing its outbound queue.
    pub async fn unregister(&self, member_id: MemberId) -> Result<(), RoomError> {
        self.send(RoomCommand::Unregister(member_id)).await
    }

    /// Fans a payload out to every member registered at the time the room
    /// handles it.
    pub async fn broadcast(&self, payload: impl Into<Bytes>) -> Result<(), RoomError> {
        self.send(RoomCommand::Broadcast(payload.into())).await
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Info { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to stop. Returns immediately.
    ///
    /// Commands still in the mailbox are discarded and every member is
    /// evicted.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Returns `true` once the room's control loop has exited.
    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn state(&self) -> RoomState {
        if self.is_stopped() {
            RoomState::Stopped
        } else {
            RoomState::Running
        }
    }

    /// Waits until the room's control loop has exited.
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }

    /// Returns `true` if both handles drive the same room instance.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    members: HashMap<MemberId, OutboundSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    cancel: watch::Receiver<bool>,
}

impl RoomActor {
    /// Runs the actor loop until cancelled or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut self.cancel) => {
                    tracing::info!(room_id = %self.room_id, "room cancelled");
                    break;
                }
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => {
                        tracing::debug!(room_id = %self.room_id, "all room handles dropped");
                        break;
                    }
                },
            }
        }

        self.evict_all();
        // Closing the mailbox here, before the task finishes, is what
        // `RoomHandle::is_stopped` observes.
        self.receiver.close();
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Register(member) => {
                self.members.insert(member.id, member.outbound);
                tracing::debug!(
                    room_id = %self.room_id,
                    member_id = %member.id,
                    members = self.members.len(),
                    "member registered"
                );
            }
            RoomCommand::Unregister(member_id) => {
                if self.members.remove(&member_id).is_some() {
                    tracing::debug!(
                        room_id = %self.room_id,
                        %member_id,
                        members = self.members.len(),
                        "member unregistered"
                    );
                }
            }
            RoomCommand::Broadcast(payload) => self.broadcast(payload),
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
        }
    }

    /// Offers the payload to every member without blocking. Members whose
    /// queue is full are evicted; members whose queue is already closed
    /// are dropped quietly.
    fn broadcast(&mut self, payload: Bytes) {
        let room_id = &self.room_id;
        self.members
            .retain(|member_id, outbound| match outbound.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        %room_id,
                        %member_id,
                        "outbound queue full, evicting member"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%room_id, %member_id, "outbound queue closed, dropping member");
                    false
                }
            });
    }

    fn evict_all(&mut self) {
        let evicted = self.members.len();
        self.members.clear();
        if evicted > 0 {
            tracing::debug!(room_id = %self.room_id, evicted, "evicted all members");
        }
    }

    fn info(&self) -> RoomInfo {
        let mut members: Vec<MemberId> = self.members.keys().copied().collect();
        members.sort_unstable();
        RoomInfo {
            room_id: self.room_id.clone(),
            state: RoomState::Running,
            member_count: members.len(),
            members,
        }
    }
}

/// Resolves once the cancel flag is set or every handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `config.mailbox_size` bounds the mailbox; senders wait when it is full.
pub(crate) fn spawn_room(room_id: RoomId, config: &RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_size.max(1));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let actor = RoomActor {
        room_id: room_id.clone(),
        members: HashMap::new(),
        receiver: rx,
        cancel: cancel_rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
        cancel: Arc::new(cancel_tx),
    }
}
