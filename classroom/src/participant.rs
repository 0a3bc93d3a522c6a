//! Session roster and the room side channels (chat, raised hands).

#[cfg(test)]
#[path = "participant_test.rs"]
mod participant_test;

use serde::{Deserialize, Deserializer, Serialize};

/// Participant as the relay announces it in `participants-update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub hand_raised: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch, stamped by the relay.
    #[serde(default, deserialize_with = "millis")]
    pub ts: i64,
}

/// The frame codec carries every number as a double.
#[allow(clippy::cast_possible_truncation)]
fn millis<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    Ok(f64::deserialize(de)? as i64)
}

/// Payload of `raise-hand` and `lower-hand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandSignal {
    pub user_id: String,
    pub user_name: String,
}

/// Which media stream shows for a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRef {
    /// This participant's own capture.
    Local,
    /// Received over the peer link.
    Remote(String),
    /// Link not connected yet.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub hand_raised: bool,
    pub stream: StreamRef,
}

/// Everyone in the session, local participant first, then in arrival order.
#[derive(Debug, Clone)]
pub struct Roster {
    members: Vec<Participant>,
}

impl Roster {
    #[must_use]
    pub fn new(local: &ParticipantInfo) -> Self {
        Self {
            members: vec![Participant {
                id: local.id.clone(),
                name: local.name.clone(),
                is_host: local.is_host,
                hand_raised: local.hand_raised,
                stream: StreamRef::Local,
            }],
        }
    }

    #[must_use]
    pub fn local(&self) -> Option<&Participant> {
        self.members.first()
    }

    /// Add a participant known only by id. Returns false if already present.
    pub fn add(&mut self, id: &str) -> bool {
        if self.get(id).is_some() {
            return false;
        }
        self.members.push(Participant {
            id: id.to_owned(),
            name: id.to_owned(),
            is_host: false,
            hand_raised: false,
            stream: StreamRef::Pending,
        });
        true
    }

    /// Remove a remote participant. The local participant is never removed.
    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        let idx = self.members.iter().skip(1).position(|p| p.id == id)? + 1;
        Some(self.members.remove(idx))
    }

    /// Replace names, host flags and hands from the relay's list. Remote
    /// participants missing from `list` are dropped; streams are kept.
    pub fn apply_update(&mut self, list: &[ParticipantInfo]) {
        let local_id = self.local().map(|p| p.id.clone()).unwrap_or_default();
        self.members.retain(|p| p.id == local_id || list.iter().any(|info| info.id == p.id));
        for info in list {
            match self.members.iter_mut().find(|p| p.id == info.id) {
                Some(member) => {
                    member.name.clone_from(&info.name);
                    member.is_host = info.is_host;
                    member.hand_raised = info.hand_raised;
                }
                None => self.members.push(Participant {
                    id: info.id.clone(),
                    name: info.name.clone(),
                    is_host: info.is_host,
                    hand_raised: info.hand_raised,
                    stream: StreamRef::Pending,
                }),
            }
        }
    }

    pub fn set_hand(&mut self, id: &str, raised: bool) -> bool {
        let Some(member) = self.get_mut(id) else {
            return false;
        };
        member.hand_raised = raised;
        true
    }

    pub fn set_stream(&mut self, id: &str, stream: StreamRef) -> bool {
        let Some(member) = self.get_mut(id) else {
            return false;
        };
        member.stream = stream;
        true
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.members.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.members.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter()
    }

    /// Participants with a raised hand, in roster order.
    pub fn raised_hands(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter().filter(|p| p.hand_raised)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
