//! Heater to room mapping by name
//!
//! Heaters are commonly named after the room they sit in, with a type
//! prefix: "Panelovn Stue", "Varmekabel Bad", "Heater Office". Stripping the
//! prefix and comparing with room names gives each heater at most one room.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::info;
use xcomfort_core::{DeviceId, HeaterInfo, RoomId, RoomInfo};

/// Leading words stripped from heater names, checked in this order
pub const HEATER_PREFIXES: [&str; 3] = ["varmekabel", "panelovn", "heater"];

/// Canonical heater name: lowercased, trimmed, one leading prefix word removed
pub fn normalize(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    for prefix in HEATER_PREFIXES {
        if let Some(rest) = lowered.strip_prefix(prefix) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim().to_string();
            }
        }
    }

    lowered
}

/// Canonical room name: lowercased and trimmed
pub fn normalize_room(name: &str) -> String {
    name.trim().to_lowercase()
}

/// True when the words of `short` are the leading words of `long`
fn is_word_prefix(short: &str, long: &str) -> bool {
    let mut long_words = long.split_whitespace();
    let mut matched = false;
    for word in short.split_whitespace() {
        if long_words.next() != Some(word) {
            return false;
        }
        matched = true;
    }
    matched
}

/// Find the room for an already-normalized heater name
///
/// `rooms` is keyed by normalized room name, so iteration is lexical.
fn find_room<'a, T>(heater: &str, rooms: &'a BTreeMap<String, T>) -> Option<(&'a String, &'a T)> {
    if heater.is_empty() {
        return None;
    }

    if let Some(found) = rooms.get_key_value(heater) {
        return Some(found);
    }

    rooms
        .iter()
        .find(|(room, _)| is_word_prefix(heater, room) || is_word_prefix(room, heater))
}

/// Map one heater name to one of `room_names`
///
/// Returns the normalized name of the matching room.
pub fn map_heater_to_room<S: AsRef<str>>(heater_name: &str, room_names: &[S]) -> Option<String> {
    let rooms: BTreeMap<String, ()> = room_names
        .iter()
        .map(|name| (normalize_room(name.as_ref()), ()))
        .collect();

    find_room(&normalize(heater_name), &rooms).map(|(room, _)| room.clone())
}

/// The room a heater was mapped to
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMatch {
    pub room_id: RoomId,
    pub room_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub heater_name: String,
    pub room: Option<RoomMatch>,
}

/// Heater → room relation, in heater registry order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaterRoomMapping {
    entries: IndexMap<DeviceId, MappingEntry>,
}

impl HeaterRoomMapping {
    /// Compute the mapping for every heater against every room
    ///
    /// When two rooms share a normalized name the first one in `rooms` is used.
    pub fn build(heaters: &[HeaterInfo], rooms: &[RoomInfo]) -> Self {
        let mut by_name: BTreeMap<String, &RoomInfo> = BTreeMap::new();
        for room in rooms {
            by_name.entry(normalize_room(&room.name)).or_insert(room);
        }

        let entries = heaters
            .iter()
            .map(|heater| {
                let room = find_room(&normalize(&heater.name), &by_name).map(|(_, room)| {
                    RoomMatch {
                        room_id: room.room_id.clone(),
                        room_name: room.name.clone(),
                    }
                });
                (
                    heater.device_id.clone(),
                    MappingEntry {
                        heater_name: heater.name.clone(),
                        room,
                    },
                )
            })
            .collect();

        Self { entries }
    }

    /// Log the full mapping table
    pub fn log(&self) {
        for entry in self.entries.values() {
            match &entry.room {
                Some(room) => info!(
                    "Heater room mapping: \"{}\" -> \"{}\"",
                    entry.heater_name, room.room_name
                ),
                None => info!("Heater room mapping: \"{}\" -> (no match)", entry.heater_name),
            }
        }
        info!(
            "Heater room mapping complete: {} matched, {} unmatched",
            self.matched_count(),
            self.unmatched_count()
        );
    }

    pub fn room_for(&self, device_id: &DeviceId) -> Option<&RoomMatch> {
        self.entries.get(device_id)?.room.as_ref()
    }

    /// Heaters mapped to a room
    pub fn heaters_in_room<'a>(&'a self, room_id: &'a RoomId) -> impl Iterator<Item = &'a DeviceId> {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.room.as_ref().is_some_and(|r| &r.room_id == room_id))
            .map(|(device_id, _)| device_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &MappingEntry)> {
        self.entries.iter()
    }

    pub fn matched_count(&self) -> usize {
        self.entries.values().filter(|e| e.room.is_some()).count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.entries.len() - self.matched_count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_one_prefix() {
        assert_eq!(normalize("Varmekabel Bad"), "bad");
        assert_eq!(normalize("  PANELOVN   Stue  "), "stue");
        assert_eq!(normalize("Heater Office"), "office");
        assert_eq!(normalize("Heater Panelovn Bad"), "panelovn bad");
        assert_eq!(normalize("Stue"), "stue");
    }

    #[test]
    fn test_normalize_needs_whole_prefix_word() {
        assert_eq!(normalize("Heaterroom"), "heaterroom");
        assert_eq!(normalize("Heater"), "heater");
        assert_eq!(normalize("Panelovner"), "panelovner");
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            map_heater_to_room("Panelovn Stue", &["stue", "kjokken"]).as_deref(),
            Some("stue")
        );
        assert_eq!(
            map_heater_to_room("Varmekabel Bad", &["Bad", "Gang"]).as_deref(),
            Some("bad")
        );
    }

    #[test]
    fn test_no_partial_word_prefix() {
        assert_eq!(map_heater_to_room("heater liv", &["living room"]), None);
        assert_eq!(map_heater_to_room("Panelovn Kontor", &["stue"]), None);
    }

    #[test]
    fn test_word_prefix_both_directions() {
        // Heater name longer than room name
        assert_eq!(
            map_heater_to_room("Panelovn Stue Vest", &["Stue"]).as_deref(),
            Some("stue")
        );
        // Room name longer than heater name
        assert_eq!(
            map_heater_to_room("Heater Living", &["Living Room"]).as_deref(),
            Some("living room")
        );
    }

    #[test]
    fn test_prefix_tie_break_is_lexical() {
        let rooms = ["stue vest", "stue ost"];
        assert_eq!(map_heater_to_room("Panelovn Stue", &rooms).as_deref(), Some("stue ost"));

        let reversed = ["stue ost", "stue vest"];
        assert_eq!(
            map_heater_to_room("Panelovn Stue", &reversed).as_deref(),
            Some("stue ost")
        );
    }

    #[test]
    fn test_empty_names_never_match() {
        assert_eq!(map_heater_to_room("   ", &["stue"]), None);
        assert_eq!(map_heater_to_room("Panelovn Stue", &[""]), None);
    }

    #[test]
    fn test_build_mapping() {
        let rooms = vec![
            RoomInfo::new("1", "Stue"),
            RoomInfo::new("2", "Bad"),
            RoomInfo::new("3", "stue"),
        ];
        let heaters = vec![
            HeaterInfo::new("11", "Panelovn Stue"),
            HeaterInfo::new("12", "Varmekabel Bad"),
            HeaterInfo::new("13", "Heater Garage"),
            HeaterInfo::new("14", "Panelovn Stue Vest"),
        ];

        let mapping = HeaterRoomMapping::build(&heaters, &rooms);
        mapping.log();

        // Duplicate normalized room names keep the first room
        assert_eq!(
            mapping.room_for(&DeviceId::from("11")).map(|r| r.room_id.as_str()),
            Some("1")
        );
        assert_eq!(
            mapping.room_for(&DeviceId::from("12")).map(|r| r.room_name.as_str()),
            Some("Bad")
        );
        assert!(mapping.room_for(&DeviceId::from("13")).is_none());
        assert_eq!(mapping.matched_count(), 3);
        assert_eq!(mapping.unmatched_count(), 1);

        let stue = RoomId::from("1");
        let in_stue: Vec<_> = mapping.heaters_in_room(&stue).map(|d| d.as_str()).collect();
        assert_eq!(in_stue, vec!["11", "14"]);
    }

    #[test]
    fn test_log_prints_mapping_table() {
        let rooms = vec![RoomInfo::new("1", "Stue")];
        let heaters = vec![
            HeaterInfo::new("11", "Panelovn Stue"),
            HeaterInfo::new("13", "Heater Garage"),
        ];
        let mapping = HeaterRoomMapping::build(&heaters, &rooms);

        let (_, lines) = crate::log_capture::capture(|| mapping.log());

        assert_eq!(lines.len(), 3, "{:?}", lines);
        assert!(lines.iter().all(|l| l.contains("INFO")));
        assert!(lines[0].ends_with("Heater room mapping: \"Panelovn Stue\" -> \"Stue\""));
        assert!(lines[1].ends_with("Heater room mapping: \"Heater Garage\" -> (no match)"));
        assert!(lines[2].ends_with("Heater room mapping complete: 1 matched, 1 unmatched"));
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let rooms = vec![RoomInfo::new("1", "Stue Ost"), RoomInfo::new("2", "Stue Vest")];
        let heaters = vec![HeaterInfo::new("11", "Panelovn Stue")];

        let first = HeaterRoomMapping::build(&heaters, &rooms);
        let rooms_reordered = vec![RoomInfo::new("2", "Stue Vest"), RoomInfo::new("1", "Stue Ost")];
        let second = HeaterRoomMapping::build(&heaters, &rooms_reordered);

        assert_eq!(first, second);
        assert_eq!(
            first.room_for(&DeviceId::from("11")).map(|r| r.room_id.as_str()),
            Some("1")
        );
    }
}
