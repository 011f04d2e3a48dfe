// Index Models
// Recursive exercise index, per-exercise metadata and the published summary tree

use crate::document::Document;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

// =============================================================================
// Declarative index
// =============================================================================

/// A node of the declarative index: either a flat list of exercises or a
/// set of named groups, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// Exercise ids, in presentation order
    Exercises(Vec<String>),
    /// Named sub-groups
    Groups(IndexMap<String, Group>),
}

/// A titled group whose contents is itself an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawGroup<Vec<String>, Group>",
    into = "RawGroup<Vec<String>, Group>"
)]
pub struct Group {
    pub title: String,
    pub contents: Index,
}

impl Document for Index {
    const KIND: &'static str = "index";
}

impl Serialize for Index {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Index::Exercises(ids) => RawNode::<&Vec<String>, &Group> {
                exercises: Some(ids),
                groups: None,
            }
            .serialize(serializer),
            Index::Groups(groups) => RawNode::<&Vec<String>, &Group> {
                exercises: None,
                groups: Some(UniqueMap(groups.iter().map(|(k, v)| (k.clone(), v)).collect())),
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Index {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawNode::<Vec<String>, Group>::deserialize(deserializer)?;
        Index::from_parts(raw.exercises, raw.groups).map_err(serde::de::Error::custom)
    }
}

impl Index {
    fn from_parts(
        exercises: Option<Vec<String>>,
        groups: Option<UniqueMap<Group>>,
    ) -> Result<Self, String> {
        match node_contents(exercises, groups)? {
            NodeContents::Leaves(ids) => {
                let mut seen = HashSet::new();
                for id in &ids {
                    validate_id(id)?;
                    if !seen.insert(id.as_str()) {
                        return Err(format!("exercise `{}` is listed twice in the same node", id));
                    }
                }
                Ok(Index::Exercises(ids))
            }
            NodeContents::Groups(groups) => Ok(Index::Groups(groups)),
        }
    }
}

impl TryFrom<RawGroup<Vec<String>, Group>> for Group {
    type Error = String;

    fn try_from(raw: RawGroup<Vec<String>, Group>) -> Result<Self, Self::Error> {
        Ok(Group {
            title: raw.title,
            contents: Index::from_parts(raw.exercises, raw.groups)?,
        })
    }
}

impl From<Group> for RawGroup<Vec<String>, Group> {
    fn from(group: Group) -> Self {
        match group.contents {
            Index::Exercises(ids) => RawGroup {
                title: group.title,
                exercises: Some(ids),
                groups: None,
            },
            Index::Groups(groups) => RawGroup {
                title: group.title,
                exercises: None,
                groups: Some(UniqueMap(groups)),
            },
        }
    }
}

// =============================================================================
// Per-exercise metadata
// =============================================================================

/// The kind of an exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    Problem,
    Project,
    Exercise,
}

/// Metadata artifact stored next to each exercise (`meta.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseMeta {
    pub kind: ExerciseKind,
    /// Difficulty rating, not range checked
    pub stars: f64,
}

impl Document for ExerciseMeta {
    const KIND: &'static str = "exercise metadata";
}

// =============================================================================
// Published index
// =============================================================================

/// One exercise entry of the published index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub kind: ExerciseKind,
    pub stars: f64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
}

impl ExerciseSummary {
    pub fn new(meta: &ExerciseMeta, title: impl Into<String>) -> Self {
        Self {
            kind: meta.kind,
            stars: meta.stars,
            title: title.into(),
            short_description: None,
        }
    }

    pub fn with_short_description(mut self, description: Option<String>) -> Self {
        self.short_description = description;
        self
    }
}

/// The published index: the declarative tree with every exercise id
/// replaced by its summary
#[derive(Debug, Clone, PartialEq)]
pub enum ExerciseIndex {
    Exercises(IndexMap<String, ExerciseSummary>),
    Groups(IndexMap<String, ExerciseGroup>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawGroup<UniqueMap<ExerciseSummary>, ExerciseGroup>",
    into = "RawGroup<UniqueMap<ExerciseSummary>, ExerciseGroup>"
)]
pub struct ExerciseGroup {
    pub title: String,
    pub contents: ExerciseIndex,
}

impl Document for ExerciseIndex {
    const KIND: &'static str = "exercise index";
}

impl ExerciseIndex {
    fn from_parts(
        exercises: Option<UniqueMap<ExerciseSummary>>,
        groups: Option<UniqueMap<ExerciseGroup>>,
    ) -> Result<Self, String> {
        match node_contents(exercises, groups)? {
            NodeContents::Leaves(UniqueMap(summaries)) => {
                for id in summaries.keys() {
                    validate_id(id)?;
                }
                Ok(ExerciseIndex::Exercises(summaries))
            }
            NodeContents::Groups(groups) => Ok(ExerciseIndex::Groups(groups)),
        }
    }

    /// Number of exercise entries in the tree, counting repeated references
    pub fn entry_count(&self) -> usize {
        match self {
            ExerciseIndex::Exercises(summaries) => summaries.len(),
            ExerciseIndex::Groups(groups) => {
                groups.values().map(|g| g.contents.entry_count()).sum()
            }
        }
    }
}

impl Serialize for ExerciseIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExerciseIndex::Exercises(summaries) => {
                RawNode::<&IndexMap<String, ExerciseSummary>, &ExerciseGroup> {
                    exercises: Some(summaries),
                    groups: None,
                }
                .serialize(serializer)
            }
            ExerciseIndex::Groups(groups) => {
                RawNode::<&IndexMap<String, ExerciseSummary>, &ExerciseGroup> {
                    exercises: None,
                    groups: Some(UniqueMap(groups.iter().map(|(k, v)| (k.clone(), v)).collect())),
                }
                .serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ExerciseIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawNode::<UniqueMap<ExerciseSummary>, ExerciseGroup>::deserialize(deserializer)?;
        ExerciseIndex::from_parts(raw.exercises, raw.groups).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<RawGroup<UniqueMap<ExerciseSummary>, ExerciseGroup>> for ExerciseGroup {
    type Error = String;

    fn try_from(
        raw: RawGroup<UniqueMap<ExerciseSummary>, ExerciseGroup>,
    ) -> Result<Self, Self::Error> {
        Ok(ExerciseGroup {
            title: raw.title,
            contents: ExerciseIndex::from_parts(raw.exercises, raw.groups)?,
        })
    }
}

impl From<ExerciseGroup> for RawGroup<UniqueMap<ExerciseSummary>, ExerciseGroup> {
    fn from(group: ExerciseGroup) -> Self {
        match group.contents {
            ExerciseIndex::Exercises(summaries) => RawGroup {
                title: group.title,
                exercises: Some(UniqueMap(summaries)),
                groups: None,
            },
            ExerciseIndex::Groups(groups) => RawGroup {
                title: group.title,
                exercises: None,
                groups: Some(UniqueMap(groups)),
            },
        }
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Check that an exercise or group id is usable as a single directory name
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("ids must not be empty".to_string());
    }
    if id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(format!("`{}` is not a valid id", id));
    }
    Ok(())
}

// =============================================================================
// Wire representation
// =============================================================================

/// Wire form of an index node. Both keys are optional here so that a node
/// carrying both (or neither) can be reported instead of silently resolved.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode<L, G> {
    #[serde(skip_serializing_if = "Option::is_none")]
    exercises: Option<L>,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<UniqueMap<G>>,
}

/// Wire form of a group: a title next to the node keys
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGroup<L, G> {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exercises: Option<L>,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<UniqueMap<G>>,
}

enum NodeContents<L, G> {
    Leaves(L),
    Groups(IndexMap<String, G>),
}

fn node_contents<L, G>(
    exercises: Option<L>,
    groups: Option<UniqueMap<G>>,
) -> Result<NodeContents<L, G>, String> {
    match (exercises, groups) {
        (Some(leaves), None) => Ok(NodeContents::Leaves(leaves)),
        (None, Some(UniqueMap(groups))) => {
            for id in groups.keys() {
                validate_id(id)?;
            }
            Ok(NodeContents::Groups(groups))
        }
        (Some(_), Some(_)) => {
            Err("a node cannot contain both `exercises` and `groups`".to_string())
        }
        (None, None) => Err("a node must contain either `exercises` or `groups`".to_string()),
    }
}

/// String-keyed map that rejects duplicate keys when deserialized
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueMap<V>(pub IndexMap<String, V>);

impl<V: Serialize> Serialize for UniqueMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for UniqueMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UniqueMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueMapVisitor<V> {
            type Value = UniqueMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with unique keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = IndexMap::new();
                while let Some(key) = access.next_key::<String>()? {
                    if map.contains_key(&key) {
                        return Err(serde::de::Error::custom(format!("duplicate key `{}`", key)));
                    }
                    let value = access.next_value()?;
                    map.insert(key, value);
                }
                Ok(UniqueMap(map))
            }
        }

        deserializer.deserialize_map(UniqueMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{decode, decode_slice, encode, SchemaError};
    use serde_json::json;

    fn nested_index() -> Index {
        let mut inner = IndexMap::new();
        inner.insert(
            "sorting".to_string(),
            Group {
                title: "Sorting".to_string(),
                contents: Index::Exercises(vec!["bubble".to_string(), "merge".to_string()]),
            },
        );

        let mut outer = IndexMap::new();
        outer.insert(
            "basics".to_string(),
            Group {
                title: "Basics".to_string(),
                contents: Index::Exercises(vec!["hello".to_string()]),
            },
        );
        outer.insert(
            "algorithms".to_string(),
            Group {
                title: "Algorithms".to_string(),
                contents: Index::Groups(inner),
            },
        );
        Index::Groups(outer)
    }

    #[test]
    fn test_parse_flat_exercises() {
        let index: Index =
            decode(json!({"version": 1, "data": {"exercises": ["ex1", "ex2"]}})).unwrap();
        assert_eq!(
            index,
            Index::Exercises(vec!["ex1".to_string(), "ex2".to_string()])
        );
    }

    #[test]
    fn test_parse_nested_groups() {
        let doc = json!({"version": 1, "data": {"groups": {
            "basics": {"title": "Basics", "exercises": ["hello"]},
            "algorithms": {"title": "Algorithms", "groups": {
                "sorting": {"title": "Sorting", "exercises": ["bubble", "merge"]}
            }}
        }}});

        let index: Index = decode(doc).unwrap();
        assert_eq!(index, nested_index());
    }

    #[test]
    fn test_index_round_trip() {
        let index = nested_index();
        let decoded: Index = decode(encode(&index).unwrap()).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn test_group_wire_shape() {
        let value = serde_json::to_value(nested_index()).unwrap();
        assert_eq!(
            value["groups"]["basics"],
            json!({"title": "Basics", "exercises": ["hello"]})
        );
        assert!(value["groups"]["algorithms"].get("exercises").is_none());
    }

    #[test]
    fn test_mixed_node_rejected() {
        let err = decode::<Index>(json!({"version": 1, "data": {
            "exercises": ["a"],
            "groups": {"g": {"title": "G", "exercises": ["b"]}}
        }}))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Shape { .. }));

        let err = decode::<Index>(json!({"version": 1, "data": {"groups": {
            "g": {"title": "G", "exercises": ["b"], "groups": {}}
        }}}))
        .unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_empty_node_rejected() {
        assert!(decode::<Index>(json!({"version": 1, "data": {}})).is_err());
        assert!(decode::<Index>(json!({"version": 1, "data": {"groups": {
            "g": {"title": "G"}
        }}}))
        .is_err());
    }

    #[test]
    fn test_group_requires_title() {
        let err = decode::<Index>(json!({"version": 1, "data": {"groups": {
            "g": {"exercises": ["a"]}
        }}}))
        .unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_duplicate_group_key_rejected() {
        let raw = br#"{"version": 1, "data": {"groups": {
            "g": {"title": "One", "exercises": ["a"]},
            "g": {"title": "Two", "exercises": ["b"]}
        }}}"#;
        let err = decode_slice::<Index>(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_duplicate_exercise_in_node_rejected() {
        let err = decode::<Index>(json!({"version": 1, "data": {"exercises": ["a", "a"]}}))
            .unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_invalid_ids_rejected() {
        for bad in ["", "..", "a/b", "a\\b"] {
            let doc = json!({"version": 1, "data": {"exercises": [bad]}});
            assert!(decode::<Index>(doc).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_metadata() {
        let meta: ExerciseMeta =
            decode(json!({"version": 1, "data": {"kind": "project", "stars": 4.5}})).unwrap();
        assert_eq!(meta.kind, ExerciseKind::Project);
        assert_eq!(meta.stars, 4.5);

        // Stars are not range checked
        let meta: ExerciseMeta =
            decode(json!({"version": 1, "data": {"kind": "problem", "stars": -12.0}})).unwrap();
        assert_eq!(meta.stars, -12.0);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(
            decode::<ExerciseMeta>(json!({"version": 1, "data": {"kind": "quiz", "stars": 1}}))
                .is_err()
        );
    }

    #[test]
    fn test_exercise_index_round_trip() {
        let meta = ExerciseMeta {
            kind: ExerciseKind::Exercise,
            stars: 2.0,
        };
        let mut leaves = IndexMap::new();
        leaves.insert(
            "hello".to_string(),
            ExerciseSummary::new(&meta, "Hello").with_short_description(Some("Say hi".into())),
        );
        leaves.insert("bye".to_string(), ExerciseSummary::new(&meta, "Bye"));

        let mut groups = IndexMap::new();
        groups.insert(
            "intro".to_string(),
            ExerciseGroup {
                title: "Intro".to_string(),
                contents: ExerciseIndex::Exercises(leaves),
            },
        );
        let index = ExerciseIndex::Groups(groups);

        let doc = encode(&index).unwrap();
        assert_eq!(
            doc["data"]["groups"]["intro"]["exercises"]["bye"],
            json!({"kind": "exercise", "stars": 2.0, "title": "Bye"})
        );
        assert_eq!(decode::<ExerciseIndex>(doc).unwrap(), index);
        assert_eq!(index.entry_count(), 2);
    }
}
