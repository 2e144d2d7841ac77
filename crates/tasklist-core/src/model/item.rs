use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// Store-assigned identifier of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(pub i64);

/// Store-assigned identifier of an item. Unique across all lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Intended ordering semantics of a list. Descriptive only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    #[default]
    Sequential,
    Parallel,
    Hierarchical,
    Linked,
}

impl ListType {
    pub const ALL: [Self; 4] = [
        Self::Sequential,
        Self::Parallel,
        Self::Hierarchical,
        Self::Linked,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Hierarchical => "hierarchical",
            Self::Linked => "linked",
        }
    }
}

/// The four item lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Status {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` and `failed` end an item's lifecycle until it is reopened.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Kind of a dependency edge.
///
/// Both kinds gate availability of the dependent item; the kind records how
/// the relation was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Blocks,
    #[default]
    Requires,
}

impl DependencyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Requires => "requires",
        }
    }
}

/// A named, ordered collection of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: ListId,
    pub key: String,
    pub title: String,
    pub list_type: ListType,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// A unit of work inside a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub list_id: ListId,
    pub key: String,
    pub content: String,
    pub position: u32,
    pub status: Status,
    pub parent_id: Option<ItemId>,
    /// Free-form partial-completion markers. Not part of the state machine.
    #[serde(default)]
    pub completion_states: BTreeMap<String, String>,
    pub started_at_us: Option<i64>,
    pub completed_at_us: Option<i64>,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl Item {
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A directed dependency: `dependent` cannot be available until `required`
/// is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependent: ItemId,
    pub required: ItemId,
    pub kind: DependencyKind,
    pub created_at_us: i64,
}

/// Fields for a list about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewList {
    pub key: String,
    pub title: String,
    pub list_type: ListType,
    pub created_at_us: i64,
}

/// Fields for an item about to be inserted. New items always start pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub list_id: ListId,
    pub key: String,
    pub content: String,
    pub position: u32,
    pub parent_id: Option<ItemId>,
    pub created_at_us: i64,
}

/// Partial update applied by [`crate::store::Store::update_item`].
///
/// `None` leaves the field untouched. For the nullable fields the inner
/// `Option` is the new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub content: Option<String>,
    pub status: Option<Status>,
    pub position: Option<u32>,
    pub parent_id: Option<Option<ItemId>>,
    pub completion_states: Option<BTreeMap<String, String>>,
    pub started_at_us: Option<Option<i64>>,
    pub completed_at_us: Option<Option<i64>>,
    pub updated_at_us: i64,
}

impl ItemUpdate {
    /// An update that only bumps `updated_at_us`.
    #[must_use]
    pub fn touch(now_us: i64) -> Self {
        Self {
            updated_at_us: now_us,
            ..Self::default()
        }
    }

    /// Apply this update to an in-memory item.
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(content) = &self.content {
            item.content.clone_from(content);
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(position) = self.position {
            item.position = position;
        }
        if let Some(parent_id) = self.parent_id {
            item.parent_id = parent_id;
        }
        if let Some(states) = &self.completion_states {
            item.completion_states.clone_from(states);
        }
        if let Some(started) = self.started_at_us {
            item.started_at_us = started;
        }
        if let Some(completed) = self.completed_at_us {
            item.completed_at_us = completed;
        }
        item.updated_at_us = self.updated_at_us;
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}

impl FromStr for ListType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "hierarchical" => Ok(Self::Hierarchical),
            "linked" => Ok(Self::Linked),
            _ => Err(ParseEnumError {
                expected: "list type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for DependencyKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "blocks" => Ok(Self::Blocks),
            "requires" => Ok(Self::Requires),
            _ => Err(ParseEnumError {
                expected: "dependency kind",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DependencyKind, Item, ItemId, ItemUpdate, ListId, ListType, Status};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn sample_item() -> Item {
        Item {
            id: ItemId(7),
            list_id: ListId(1),
            key: "a1".into(),
            content: "write tests".into(),
            position: 1,
            status: Status::Pending,
            parent_id: Some(ItemId(3)),
            completion_states: BTreeMap::new(),
            started_at_us: None,
            completed_at_us: None,
            created_at_us: 10,
            updated_at_us: 10,
        }
    }

    #[test]
    fn enum_json_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).expect("serialize"),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&ListType::Hierarchical).expect("serialize"),
            "\"hierarchical\""
        );
        assert_eq!(
            serde_json::from_str::<DependencyKind>("\"blocks\"").expect("deserialize"),
            DependencyKind::Blocks
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for value in Status::ALL {
            assert_eq!(Status::from_str(&value.to_string()).expect("parse"), value);
        }
        for value in ListType::ALL {
            assert_eq!(
                ListType::from_str(&value.to_string()).expect("parse"),
                value
            );
        }
    }

    #[test]
    fn parse_accepts_dashed_status() {
        assert_eq!(
            Status::from_str(" In-Progress ").expect("parse"),
            Status::InProgress
        );
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!(Status::from_str("done").is_err());
        assert!(ListType::from_str("tree").is_err());
        let err = DependencyKind::from_str("related").expect_err("unknown kind");
        assert_eq!(err.to_string(), "invalid dependency kind: 'related'");
    }

    #[test]
    fn finished_states() {
        assert!(Status::Completed.is_finished());
        assert!(Status::Failed.is_finished());
        assert!(!Status::Pending.is_finished());
        assert!(!Status::InProgress.is_finished());
    }

    #[test]
    fn update_touches_only_requested_fields() {
        let mut item = sample_item();
        let update = ItemUpdate {
            status: Some(Status::InProgress),
            started_at_us: Some(Some(99)),
            parent_id: Some(None),
            ..ItemUpdate::touch(100)
        };
        update.apply_to(&mut item);

        assert_eq!(item.status, Status::InProgress);
        assert_eq!(item.started_at_us, Some(99));
        assert_eq!(item.parent_id, None);
        assert_eq!(item.content, "write tests");
        assert_eq!(item.position, 1);
        assert_eq!(item.updated_at_us, 100);
    }
}
