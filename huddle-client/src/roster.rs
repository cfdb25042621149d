use huddle_core::{Participant, UserId};

/// Byte-sample deviation from the 128 midpoint above which a participant counts as speaking.
pub const SPEAKING_THRESHOLD: f32 = 8.0 / 128.0;

/// RMS of unsigned 8-bit time-domain samples, normalized to `0.0..=1.0`.
pub fn byte_rms_level(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .map(|sample| {
            let deviation = *sample as f32 - 128.0;
            deviation * deviation
        })
        .sum();
    (sum / samples.len() as f32).sqrt() / 128.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub participant: Participant,
    pub is_speaking: bool,
    pub is_muted: bool,
}

impl RosterEntry {
    fn new(participant: Participant) -> Self {
        Self {
            participant,
            is_speaking: false,
            is_muted: false,
        }
    }

    pub fn id(&self) -> UserId {
        self.participant.id
    }
}

/// Participants of the joined room with their local speaking/muted display state.
#[derive(Debug, Clone)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    threshold: f32,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(SPEAKING_THRESHOLD)
    }
}

impl Roster {
    pub fn new(threshold: f32) -> Self {
        Self {
            entries: Vec::new(),
            threshold,
        }
    }

    /// Replaces the participant list. Users still present keep their flags.
    pub fn set_participants(&mut self, participants: &[Participant]) {
        let previous = std::mem::take(&mut self.entries);
        self.entries = participants
            .iter()
            .map(|participant| {
                let mut entry = RosterEntry::new(participant.clone());
                if let Some(old) = previous.iter().find(|old| old.id() == participant.id) {
                    entry.is_speaking = old.is_speaking;
                    entry.is_muted = old.is_muted;
                }
                entry
            })
            .collect();
    }

    pub fn remove(&mut self, id: UserId) {
        self.entries.retain(|entry| entry.id() != id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: UserId) -> Option<&RosterEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn set_muted(&mut self, id: UserId, muted: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id() == id) {
            entry.is_muted = muted;
        }
    }

    /// Applies a sampled audio level. Returns the new speaking flag when it changed.
    pub fn apply_level(&mut self, id: UserId, level: f32) -> Option<bool> {
        let speaking = level > self.threshold;
        let entry = self.entries.iter_mut().find(|entry| entry.id() == id)?;
        if entry.is_speaking == speaking {
            return None;
        }
        entry.is_speaking = speaking;
        Some(speaking)
    }
}
