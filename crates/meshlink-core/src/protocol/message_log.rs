//! Append-only session log
//!
//! Entries are grouped into immutable chunks of [`CHUNK_LEN`] shared between
//! the live state and every snapshot taken from it. Cloning a log copies one
//! pointer plus the open tail, so publishing a snapshot per step stays cheap
//! however long the session runs.

use core::ops::Index;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::protocol::message::Message;

/// Entries per sealed chunk
pub const CHUNK_LEN: usize = 64;

type Chunk = Arc<[Arc<Message>]>;

/// Messages in local arrival order
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    sealed: Arc<Vec<Chunk>>,
    tail: Vec<Arc<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LEN + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sealed.is_empty() && self.tail.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Message>> {
        let sealed_len = self.sealed.len() * CHUNK_LEN;
        if index < sealed_len {
            self.sealed
                .get(index / CHUNK_LEN)
                .and_then(|chunk| chunk.get(index % CHUNK_LEN))
        } else {
            self.tail.get(index - sealed_len)
        }
    }

    pub fn last(&self) -> Option<&Arc<Message>> {
        self.tail
            .last()
            .or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<Message>> + '_ {
        self.sealed
            .iter()
            .flat_map(|chunk| chunk.iter())
            .chain(self.tail.iter())
    }

    pub fn to_vec(&self) -> Vec<Arc<Message>> {
        self.iter().cloned().collect()
    }

    pub(crate) fn push(&mut self, message: Arc<Message>) {
        self.tail.push(message);
        if self.tail.len() == CHUNK_LEN {
            let chunk: Chunk = core::mem::take(&mut self.tail).into();
            // Copies the chunk list only while a snapshot still shares it
            Arc::make_mut(&mut self.sealed).push(chunk);
        }
    }
}

impl Index<usize> for MessageLog {
    type Output = Arc<Message>;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(message) => message,
            None => panic!("log index {} out of range for length {}", index, self.len()),
        }
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Arc<Message>;
    type IntoIter = Box<dyn DoubleEndedIterator<Item = &'a Arc<Message>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Serialize for MessageLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
