//! Synthesized audio storage.
//!
//! A call turn that synthesizes speech places the clip in the [`AudioCache`]
//! through an [`AudioLease`]. The lease is the scoped handle for the clip:
//! dropping it on any exit path (vendor error, downstream failure, timeout,
//! cancellation) removes the entry. Once the telephony markup that
//! references the clip has been composed the lease is
//! [published](AudioLease::publish), handing the entry over to the cache's
//! TTL so the telephony provider can fetch it.
//!
//! Keys are derived from a per-request id, never from the caller's number,
//! so two near-simultaneous calls from the same caller cannot collide.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::error::VoiceError;

pub const CONTENT_TYPE_MPEG: &str = "audio/mpeg";
pub const CONTENT_TYPE_WAV: &str = "audio/wav";

/// A rendered piece of audio and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl AudioClip {
    pub fn mpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: CONTENT_TYPE_MPEG,
        }
    }

    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: CONTENT_TYPE_WAV,
        }
    }
}

/// Wraps raw mono s16le PCM in a 44-byte RIFF/WAVE header.
pub fn wrap_pcm_as_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[derive(Debug)]
struct Entry {
    clip: AudioClip,
    /// `None` while leased; set when the lease is published.
    expires_at: Option<Instant>,
}

type Entries = Arc<RwLock<HashMap<String, Entry>>>;

/// In-process store of synthesized audio, served to the telephony provider.
///
/// Uses `std::sync::RwLock`: every acquisition is a brief map operation that
/// never spans an `.await`, and [`AudioLease`] needs to release from `Drop`.
#[derive(Debug, Clone)]
pub struct AudioCache {
    entries: Entries,
    ttl: Duration,
    max_entries: usize,
}

fn write_entries(entries: &Entries) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
    match entries.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("audio cache lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn read_entries(entries: &Entries) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
    match entries.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("audio cache lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl AudioCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
        }
    }

    /// Stores `clip` under `key` and returns the scoped lease for it.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::AudioStore` if the key is already in use or the
    /// cache is full after evicting expired entries.
    pub fn lease(&self, key: impl Into<String>, clip: AudioClip) -> Result<AudioLease, VoiceError> {
        let key = key.into();
        let mut entries = write_entries(&self.entries);

        if entries.len() >= self.max_entries {
            let now = Instant::now();
            entries.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        }
        if entries.len() >= self.max_entries {
            return Err(VoiceError::AudioStore(format!(
                "audio cache is full ({} entries)",
                self.max_entries
            )));
        }
        if entries.contains_key(&key) {
            return Err(VoiceError::AudioStore(format!(
                "audio key already in use: {}",
                key
            )));
        }

        entries.insert(
            key.clone(),
            Entry {
                clip,
                expires_at: None,
            },
        );

        Ok(AudioLease {
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
            key,
            published: false,
        })
    }

    /// Returns a published, unexpired clip.
    pub fn get(&self, key: &str) -> Option<AudioClip> {
        let entries = read_entries(&self.entries);
        let entry = entries.get(key)?;
        match entry.expires_at {
            Some(at) if at > Instant::now() => Some(entry.clip.clone()),
            _ => None,
        }
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = write_entries(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        read_entries(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped handle for a clip in the [`AudioCache`].
///
/// Dropping an unpublished lease removes the clip.
#[derive(Debug)]
pub struct AudioLease {
    entries: Entries,
    ttl: Duration,
    key: String,
    published: bool,
}

impl AudioLease {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Makes the clip fetchable until the cache TTL elapses and returns its key.
    pub fn publish(mut self) -> String {
        let expires_at = Instant::now() + self.ttl;
        if let Some(entry) = write_entries(&self.entries).get_mut(&self.key) {
            entry.expires_at = Some(expires_at);
        }
        self.published = true;
        std::mem::take(&mut self.key)
    }
}

impl Drop for AudioLease {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        if write_entries(&self.entries).remove(&self.key).is_some() {
            tracing::debug!(key = %self.key, "released unpublished audio");
        }
    }
}
