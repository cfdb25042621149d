use crate::push::Audience;
use huddle_core::{Participant, RoomId, RoomSummary, UserId};
use std::collections::BTreeSet;

/// Authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: Option<String>,
    pub avatar_template: Option<String>,
    pub staff: bool,
}

impl User {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            name: None,
            avatar_template: None,
            staff: false,
        }
    }

    pub fn participant(&self) -> Participant {
        Participant {
            id: self.id,
            username: self.username.clone(),
            name: self.name.clone(),
            avatar_template: self.avatar_template.clone(),
        }
    }
}

/// Fields of a room that does not exist yet.
#[derive(Debug, Clone, Default)]
pub struct RoomDraft {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub public: bool,
    pub max_participants: Option<u32>,
    pub creator_id: Option<UserId>,
    pub member_ids: Vec<UserId>,
    pub moderator_ids: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub public: bool,
    pub max_participants: Option<u32>,
    /// Every member, moderators included.
    pub member_ids: BTreeSet<UserId>,
    pub moderator_ids: BTreeSet<UserId>,
    pub creator_id: Option<UserId>,
}

impl Room {
    /// Builds a room from a draft. The creator becomes a moderator and
    /// moderators are always members.
    pub fn from_draft(id: RoomId, draft: RoomDraft) -> Self {
        let slug = draft
            .slug
            .filter(|slug| !slug.trim().is_empty())
            .unwrap_or_else(|| slugify(&draft.name, id));

        let mut moderator_ids: BTreeSet<UserId> = draft.moderator_ids.into_iter().collect();
        moderator_ids.extend(draft.creator_id);

        let mut member_ids: BTreeSet<UserId> = draft.member_ids.into_iter().collect();
        member_ids.extend(moderator_ids.iter().copied());

        Self {
            id,
            name: draft.name,
            slug,
            description: draft.description,
            public: draft.public,
            max_participants: draft.max_participants,
            member_ids,
            moderator_ids,
            creator_id: draft.creator_id,
        }
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }

    pub fn can_manage(&self, user: &User) -> bool {
        user.staff || self.creator_id == Some(user.id) || self.moderator_ids.contains(&user.id)
    }

    pub fn can_join(&self, user: &User) -> bool {
        self.public || self.is_member(user.id) || self.can_manage(user)
    }

    pub fn can_see(&self, user: &User) -> bool {
        self.can_join(user)
    }

    /// Subscribers of this room's push traffic.
    pub fn audience(&self) -> Audience {
        if self.public {
            Audience::Everyone
        } else {
            Audience::Users(self.member_ids.iter().copied().collect())
        }
    }

    pub fn summary(&self, active_participants: Vec<Participant>) -> RoomSummary {
        RoomSummary {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            public: self.public,
            max_participants: self.max_participants,
            member_count: self.member_ids.len(),
            active_participants,
        }
    }
}

/// Lowercase ASCII slug of `name`; falls back to the id when nothing remains.
pub fn slugify(name: &str, id: RoomId) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();

    if slug.is_empty() {
        format!("room-{}", id)
    } else {
        slug
    }
}
