//! Typed view of the social store (`Sandbox.sbc`).
//!
//! Players live in two independent collections (the flat roster and the keyed
//! directory) and factions cross-reference players and each other from four
//! more tables. Each record keeps its persisted element; nested lists that the
//! maintenance engine edits are lifted out into typed vectors and put back
//! when the store is lowered.

use se_maintenance_core::{FactionId, PlayerId};

use crate::{
    sector::parse_bool,
    xml::{Document, Element},
    DocumentError,
};

/// Placeholder substituted for names that could not be decoded.
pub const UNREADABLE_NAME: &str = "<unreadable>";

const ALL_PLAYERS: &str = "AllPlayers";
const PLAYERS: &str = "Players";
const DICTIONARY: &str = "dictionary";
const FACTIONS: &str = "Factions";
const MEMBERS: &str = "Members";
const JOIN_REQUESTS: &str = "JoinRequests";
const RELATIONS: &str = "Relations";
const REQUESTS: &str = "Requests";
const FACTION_REQUESTS: &str = "FactionRequests";

/// Player identity listed in the flat roster.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerRecord {
    id: PlayerId,
    name: String,
    dead: bool,
    element: Element,
}

impl PlayerRecord {
    fn from_element(element: Element) -> Result<Self, DocumentError> {
        let id = player_id_of(&element)
            .ok_or_else(|| invalid_id("player", "PlayerId", &element))?;
        Ok(Self {
            id,
            name: readable_name(element.child_text("Name")),
            dead: element
                .child_text("IsDead")
                .and_then(parse_bool)
                .unwrap_or(false),
            element,
        })
    }

    /// Identifier of the player.
    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Display name, or a placeholder when the stored name is damaged.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the player identity is flagged dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

/// Entry of the keyed player directory.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryEntry {
    player: Option<PlayerId>,
    element: Element,
}

impl DirectoryEntry {
    fn from_element(element: Element) -> Self {
        let player = element.child("Value").and_then(player_id_of);
        Self { player, element }
    }

    /// Player referenced by the entry, `None` when the entry carries no identity.
    #[must_use]
    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }
}

/// Player reference stored inside a faction's member or join-request list.
#[derive(Clone, Debug, PartialEq)]
pub struct FactionMember {
    player: PlayerId,
    element: Element,
}

impl FactionMember {
    fn from_element(element: Element) -> Result<Self, DocumentError> {
        let player = player_id_of(&element)
            .ok_or_else(|| invalid_id("faction member", "PlayerId", &element))?;
        Ok(Self { player, element })
    }

    /// Referenced player.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }
}

/// Faction record.
#[derive(Clone, Debug, PartialEq)]
pub struct Faction {
    id: FactionId,
    tag: String,
    name: String,
    members: Vec<FactionMember>,
    join_requests: Vec<FactionMember>,
    element: Element,
}

impl Faction {
    fn from_element(mut element: Element) -> Result<Self, DocumentError> {
        let id = required_id::<FactionId>(&element, "faction", "FactionId")?;
        let tag = readable_name(element.child_text("Tag"));
        let name = readable_name(element.child_text("Name"));
        let members = lift_members(&mut element, MEMBERS)?;
        let join_requests = lift_members(&mut element, JOIN_REQUESTS)?;
        Ok(Self {
            id,
            tag,
            name,
            members,
            join_requests,
            element,
        })
    }

    /// Identifier of the faction.
    #[must_use]
    pub fn id(&self) -> FactionId {
        self.id
    }

    /// Short tag shown next to member names.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Full faction name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in persisted order.
    #[must_use]
    pub fn members(&self) -> &[FactionMember] {
        &self.members
    }

    /// Pending join requests in persisted order.
    #[must_use]
    pub fn join_requests(&self) -> &[FactionMember] {
        &self.join_requests
    }

    /// Whether the player is a member of the faction.
    #[must_use]
    pub fn has_member(&self, player: PlayerId) -> bool {
        self.members.iter().any(|member| member.player == player)
    }

    pub(crate) fn remove_member(&mut self, player: PlayerId) -> bool {
        remove_player(&mut self.members, player)
    }

    pub(crate) fn remove_join_request(&mut self, player: PlayerId) -> bool {
        remove_player(&mut self.join_requests, player)
    }

    fn into_element(self) -> Element {
        let mut element = self.element;
        lower_members(&mut element, MEMBERS, self.members);
        lower_members(&mut element, JOIN_REQUESTS, self.join_requests);
        element
    }
}

/// Entry of the faction-to-player map.
#[derive(Clone, Debug, PartialEq)]
pub struct FactionPlayerEntry {
    player: PlayerId,
    faction: FactionId,
    element: Element,
}

impl FactionPlayerEntry {
    fn from_element(element: Element) -> Result<Self, DocumentError> {
        let player = required_id::<PlayerId>(&element, "faction player", "Key")?;
        let faction = required_id::<FactionId>(&element, "faction player", "Value")?;
        Ok(Self {
            player,
            faction,
            element,
        })
    }

    /// Player side of the mapping.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Faction the player is mapped to.
    #[must_use]
    pub fn faction(&self) -> FactionId {
        self.faction
    }
}

/// Relation between two factions.
#[derive(Clone, Debug, PartialEq)]
pub struct FactionRelation {
    first: FactionId,
    second: FactionId,
    element: Element,
}

impl FactionRelation {
    fn from_element(element: Element) -> Result<Self, DocumentError> {
        let first = required_id::<FactionId>(&element, "faction relation", "FactionId1")?;
        let second = required_id::<FactionId>(&element, "faction relation", "FactionId2")?;
        Ok(Self {
            first,
            second,
            element,
        })
    }

    /// First faction of the pair.
    #[must_use]
    pub fn first(&self) -> FactionId {
        self.first
    }

    /// Second faction of the pair.
    #[must_use]
    pub fn second(&self) -> FactionId {
        self.second
    }

    /// Whether either side of the pair is the provided faction.
    #[must_use]
    pub fn involves(&self, faction: FactionId) -> bool {
        self.first == faction || self.second == faction
    }

    /// Whether the relation connects exactly the two factions, in either order.
    #[must_use]
    pub fn connects(&self, first: FactionId, second: FactionId) -> bool {
        (self.first == first && self.second == second)
            || (self.first == second && self.second == first)
    }
}

/// Faction-to-faction requests sent by one faction.
#[derive(Clone, Debug, PartialEq)]
pub struct FactionRequestEntry {
    owner: FactionId,
    targets: Vec<(FactionId, Element)>,
    element: Element,
}

impl FactionRequestEntry {
    fn from_element(mut element: Element) -> Result<Self, DocumentError> {
        let owner = required_id::<FactionId>(&element, "faction request", "FactionId")?;
        let targets = match element.child_mut(FACTION_REQUESTS) {
            Some(container) => container
                .take_children()
                .into_iter()
                .map(|target| {
                    let raw = target.text().unwrap_or_default().trim();
                    match raw.parse::<FactionId>() {
                        Ok(id) => Ok((id, target)),
                        Err(_) => Err(DocumentError::invalid_field(
                            "faction request",
                            FACTION_REQUESTS,
                            raw,
                        )),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            owner,
            targets,
            element,
        })
    }

    /// Faction that sent the requests.
    #[must_use]
    pub fn owner(&self) -> FactionId {
        self.owner
    }

    /// Factions targeted by the requests, in persisted order.
    pub fn targets(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.targets.iter().map(|(target, _)| *target)
    }

    pub(crate) fn remove_target(&mut self, target: FactionId) -> bool {
        let before = self.targets.len();
        self.targets.retain(|(candidate, _)| *candidate != target);
        before != self.targets.len()
    }

    fn into_element(self) -> Element {
        let mut element = self.element;
        if let Some(container) = element.child_mut(FACTION_REQUESTS) {
            container.replace_children(self.targets.into_iter().map(|(_, target)| target).collect());
        }
        element
    }
}

/// Social store: players, factions and every table cross-referencing them.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    root: Element,
    players: Vec<PlayerRecord>,
    directory: Vec<DirectoryEntry>,
    factions: Vec<Faction>,
    faction_players: Vec<FactionPlayerEntry>,
    relations: Vec<FactionRelation>,
    requests: Vec<FactionRequestEntry>,
}

impl Checkpoint {
    /// Builds the typed social store from a loaded document.
    pub fn from_document(document: Document) -> Result<Self, DocumentError> {
        let mut root = document.into_root();

        let players = lift(&mut root, &[ALL_PLAYERS])
            .into_iter()
            .map(PlayerRecord::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        let directory = lift(&mut root, &[PLAYERS, DICTIONARY])
            .into_iter()
            .map(DirectoryEntry::from_element)
            .collect();

        let faction_list = root
            .descendant_mut(&[FACTIONS, FACTIONS])
            .ok_or(DocumentError::MissingCollection(FACTIONS))?
            .take_children();
        let factions = faction_list
            .into_iter()
            .map(Faction::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        let faction_players = lift(&mut root, &[FACTIONS, PLAYERS, DICTIONARY])
            .into_iter()
            .map(FactionPlayerEntry::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        let relations = lift(&mut root, &[FACTIONS, RELATIONS])
            .into_iter()
            .map(FactionRelation::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        let requests = lift(&mut root, &[FACTIONS, REQUESTS])
            .into_iter()
            .map(FactionRequestEntry::from_element)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root,
            players,
            directory,
            factions,
            faction_players,
            relations,
            requests,
        })
    }

    /// Lowers the typed store back into a document.
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut root = self.root;
        lower(
            &mut root,
            &[ALL_PLAYERS],
            self.players.into_iter().map(|player| player.element),
        );
        lower(
            &mut root,
            &[PLAYERS, DICTIONARY],
            self.directory.into_iter().map(|entry| entry.element),
        );
        lower(
            &mut root,
            &[FACTIONS, FACTIONS],
            self.factions.into_iter().map(Faction::into_element),
        );
        lower(
            &mut root,
            &[FACTIONS, PLAYERS, DICTIONARY],
            self.faction_players.into_iter().map(|entry| entry.element),
        );
        lower(
            &mut root,
            &[FACTIONS, RELATIONS],
            self.relations.into_iter().map(|relation| relation.element),
        );
        lower(
            &mut root,
            &[FACTIONS, REQUESTS],
            self.requests.into_iter().map(FactionRequestEntry::into_element),
        );
        Document::new(root)
    }

    /// Flat player roster.
    #[must_use]
    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    /// Keyed player directory.
    #[must_use]
    pub fn directory(&self) -> &[DirectoryEntry] {
        &self.directory
    }

    /// Factions in persisted order.
    #[must_use]
    pub fn factions(&self) -> &[Faction] {
        &self.factions
    }

    /// Faction-to-player map.
    #[must_use]
    pub fn faction_players(&self) -> &[FactionPlayerEntry] {
        &self.faction_players
    }

    /// Relations between factions.
    #[must_use]
    pub fn relations(&self) -> &[FactionRelation] {
        &self.relations
    }

    /// Faction-to-faction request entries.
    #[must_use]
    pub fn requests(&self) -> &[FactionRequestEntry] {
        &self.requests
    }

    pub(crate) fn remove_player(&mut self, player: PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|record| record.id != player);
        before != self.players.len()
    }

    pub(crate) fn remove_directory_entry(&mut self, player: PlayerId) -> bool {
        let before = self.directory.len();
        self.directory.retain(|entry| entry.player != Some(player));
        before != self.directory.len()
    }

    pub(crate) fn faction_mut(&mut self, faction: FactionId) -> Option<&mut Faction> {
        self.factions.iter_mut().find(|candidate| candidate.id == faction)
    }

    pub(crate) fn remove_faction_player_entry(&mut self, player: PlayerId) -> bool {
        let before = self.faction_players.len();
        self.faction_players.retain(|entry| entry.player != player);
        before != self.faction_players.len()
    }

    pub(crate) fn remove_faction(&mut self, faction: FactionId) -> bool {
        let before = self.factions.len();
        self.factions.retain(|candidate| candidate.id != faction);
        before != self.factions.len()
    }

    pub(crate) fn remove_relation(&mut self, first: FactionId, second: FactionId) -> bool {
        let before = self.relations.len();
        self.relations
            .retain(|relation| !relation.connects(first, second));
        before != self.relations.len()
    }

    pub(crate) fn remove_request_entry(&mut self, owner: FactionId) -> bool {
        let before = self.requests.len();
        self.requests.retain(|entry| entry.owner != owner);
        before != self.requests.len()
    }

    pub(crate) fn remove_request_target(&mut self, owner: FactionId, target: FactionId) -> bool {
        self.requests
            .iter_mut()
            .filter(|entry| entry.owner == owner)
            .fold(false, |removed, entry| entry.remove_target(target) | removed)
    }
}

fn lift(root: &mut Element, path: &[&str]) -> Vec<Element> {
    root.descendant_mut(path)
        .map(Element::take_children)
        .unwrap_or_default()
}

fn lower(root: &mut Element, path: &[&str], children: impl Iterator<Item = Element>) {
    if let Some(container) = root.descendant_mut(path) {
        container.replace_children(children.collect());
    }
}

fn lift_members(element: &mut Element, list: &str) -> Result<Vec<FactionMember>, DocumentError> {
    element
        .child_mut(list)
        .map(Element::take_children)
        .unwrap_or_default()
        .into_iter()
        .map(FactionMember::from_element)
        .collect()
}

fn lower_members(element: &mut Element, list: &str, members: Vec<FactionMember>) {
    if let Some(container) = element.child_mut(list) {
        container.replace_children(members.into_iter().map(|member| member.element).collect());
    }
}

fn remove_player(list: &mut Vec<FactionMember>, player: PlayerId) -> bool {
    let before = list.len();
    list.retain(|member| member.player != player);
    before != list.len()
}

fn player_id_of(element: &Element) -> Option<PlayerId> {
    element
        .child_text("PlayerId")
        .or_else(|| element.child_text("IdentityId"))
        .and_then(|raw| raw.parse().ok())
}

fn required_id<T: std::str::FromStr>(
    element: &Element,
    record: &'static str,
    field: &'static str,
) -> Result<T, DocumentError> {
    let raw = element.child_text(field).unwrap_or_default();
    raw.parse::<T>()
        .map_err(|_| DocumentError::invalid_field(record, field, raw))
}

fn invalid_id(record: &'static str, field: &'static str, element: &Element) -> DocumentError {
    DocumentError::invalid_field(record, field, element.child_text(field).unwrap_or_default())
}

fn readable_name(raw: Option<&str>) -> String {
    match raw {
        None => String::new(),
        Some(name) if name.chars().any(|c| c == char::REPLACEMENT_CHARACTER || c.is_control()) => {
            UNREADABLE_NAME.to_owned()
        }
        Some(name) => name.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damaged_names_are_replaced_for_display() {
        assert_eq!(readable_name(Some("Captain\u{FFFD}")), UNREADABLE_NAME);
        assert_eq!(readable_name(Some("Bell\u{7}")), UNREADABLE_NAME);
        assert_eq!(readable_name(Some("Tess")), "Tess");
        assert_eq!(readable_name(None), "");
    }

    #[test]
    fn relation_pairs_are_unordered() {
        let relation = FactionRelation {
            first: FactionId::new(1),
            second: FactionId::new(2),
            element: Element::new("MyObjectBuilder_FactionRelation"),
        };
        assert!(relation.connects(FactionId::new(2), FactionId::new(1)));
        assert!(relation.involves(FactionId::new(2)));
        assert!(!relation.involves(FactionId::new(3)));
    }
}
