use std::{
    fmt::Write as _,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::debug;

use crate::sources::Track;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`TrackQueue`].
///
/// Background appends carry the id of the queue they were started for, so a
/// session can tell when the queue has been discarded in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeId(usize);

#[derive(Debug)]
struct Node {
    track: Track,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// Ordered playback queue with a movable cursor.
///
/// Nodes live in an arena and are linked by index. Moving the cursor never
/// removes nodes, so everything played stays reachable through [`retreat`].
///
/// [`retreat`]: TrackQueue::retreat
#[derive(Debug)]
pub struct TrackQueue {
    id: QueueId,
    nodes: Vec<Node>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    current: Option<NodeId>,
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            id: QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed)),
            nodes: Vec::new(),
            head: None,
            tail: None,
            current: None,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a track at the tail. The first track added becomes current.
    pub fn append(&mut self, track: Track) {
        let id = NodeId(self.nodes.len());
        debug!("add {} to playlist", track.title());

        self.nodes.push(Node {
            track,
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(tail) => self.nodes[tail.0].next = Some(id),
            None => {
                self.head = Some(id);
                self.current = Some(id);
            }
        }
        self.tail = Some(id);
    }

    /// Adds a track at the head, ahead of everything already queued.
    pub fn push_front(&mut self, track: Track) {
        let id = NodeId(self.nodes.len());
        debug!("push {} to the front of the playlist", track.title());

        self.nodes.push(Node {
            track,
            prev: None,
            next: self.head,
        });

        match self.head {
            Some(head) => self.nodes[head.0].prev = Some(id),
            None => {
                self.tail = Some(id);
                self.current = Some(id);
            }
        }
        self.head = Some(id);
    }

    /// Moves the cursor forward. `None` at the tail, cursor unchanged.
    pub fn advance(&mut self) -> Option<Track> {
        let next = self.current.and_then(|current| self.nodes[current.0].next);
        match next {
            Some(next) => {
                self.current = Some(next);
                Some(self.nodes[next.0].track.clone())
            }
            None => {
                debug!("there is no next song in the playlist");
                None
            }
        }
    }

    /// Moves the cursor backward. `None` at the head, cursor unchanged.
    pub fn retreat(&mut self) -> Option<Track> {
        let prev = self.current.and_then(|current| self.nodes[current.0].prev);
        match prev {
            Some(prev) => {
                self.current = Some(prev);
                Some(self.nodes[prev.0].track.clone())
            }
            None => {
                debug!("there is no previous song in the playlist");
                None
            }
        }
    }

    pub fn current_track(&self) -> Option<Track> {
        self.current.map(|current| self.nodes[current.0].track.clone())
    }

    /// 1-based position of the cursor counted from the head.
    pub fn position(&self) -> Option<usize> {
        let current = self.current?;
        self.node_ids().position(|id| id == current).map(|index| index + 1)
    }

    /// Tracks in order from the head, independent of the cursor.
    pub fn iter(&self) -> impl Iterator<Item = &Track> + '_ {
        self.node_ids().map(move |id| &self.nodes[id.0].track)
    }

    /// Human readable listing: a header line, then one title per line from the head.
    pub fn render(&self) -> String {
        let mut out = String::from("\tPlaylist:\n");
        for track in self.iter() {
            let _ = writeln!(out, "{}", track.title());
        }
        out
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.head, move |id| self.nodes[id.0].next)
    }
}
