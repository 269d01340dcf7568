//! Structural message tree.
//!
//! A parsed message is a tree of group instances whose leaves are segments.
//! The root is an unnamed group holding the top-level occurrences; nested
//! groups (for example the repeating `PROBLEM` group of a `PPR^PC1` message)
//! appear as `StructureNode::Group` children in source order.

use crate::{EncodingCharacters, Segment};

/// Message type taken from `MSH-9`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageType {
    /// Message code (`MSH-9.1`), e.g. `ADT`.
    pub code: String,
    /// Trigger event (`MSH-9.2`), e.g. `A01`.
    pub trigger: String,
    /// Message structure (`MSH-9.3`, or `code_trigger` when absent).
    pub structure: String,
}

impl MessageType {
    /// Creates a message type, deriving the structure id when none is given.
    pub fn new(code: impl Into<String>, trigger: impl Into<String>, structure: Option<&str>) -> Self {
        let code = code.into();
        let trigger = trigger.into();
        let structure = match structure {
            Some(s) if !s.is_empty() => s.to_string(),
            _ if trigger.is_empty() => code.clone(),
            _ => format!("{}_{}", code, trigger),
        };
        Self {
            code,
            trigger,
            structure,
        }
    }
}

/// A child of a group instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructureNode {
    /// A segment occurrence.
    Segment(Segment),
    /// A nested group instance.
    Group(GroupInstance),
}

impl StructureNode {
    /// Returns the segment or group name.
    pub fn name(&self) -> &str {
        match self {
            Self::Segment(s) => &s.name,
            Self::Group(g) => &g.name,
        }
    }
}

/// One instance of a (possibly repeating) group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupInstance {
    /// Group name; empty for the message root.
    pub name: String,
    /// Child occurrences in source order.
    pub children: Vec<StructureNode>,
}

impl GroupInstance {
    /// Creates an empty group instance.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Returns the direct child segments with the given name.
    pub fn segments<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Segment> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter_map(move |c| match c {
            StructureNode::Segment(s) if s.name == name => Some(s),
            _ => None,
        })
    }

    /// Returns the direct child group instances with the given name.
    pub fn groups<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a GroupInstance> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter_map(move |c| match c {
            StructureNode::Group(g) if g.name == name => Some(g),
            _ => None,
        })
    }

    /// Returns the first direct child segment with the given name.
    pub fn first_segment(&self, name: &str) -> Option<&Segment> {
        self.segments(name).next()
    }

    /// Returns the first segment of this instance, descending into nested groups.
    pub fn leading_segment(&self) -> Option<&Segment> {
        self.children.iter().find_map(|c| match c {
            StructureNode::Segment(s) => Some(s),
            StructureNode::Group(g) => g.leading_segment(),
        })
    }

    /// Collects every instance of the named group below this one, depth-first.
    pub fn find_groups<'a>(&'a self, name: &str, out: &mut Vec<&'a GroupInstance>) {
        for child in &self.children {
            if let StructureNode::Group(g) = child {
                if g.name == name {
                    out.push(g);
                }
                g.find_groups(name, out);
            }
        }
    }

    /// Returns every segment below this instance in source order.
    pub fn all_segments(&self) -> Vec<&Segment> {
        let mut out = Vec::new();
        self.collect_segments(&mut out);
        out
    }

    fn collect_segments<'a>(&'a self, out: &mut Vec<&'a Segment>) {
        for child in &self.children {
            match child {
                StructureNode::Segment(s) => out.push(s),
                StructureNode::Group(g) => g.collect_segments(out),
            }
        }
    }
}

/// A fully parsed and grouped message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageTree {
    /// Message type from `MSH-9`.
    pub message_type: MessageType,
    /// Delimiters declared by the message.
    pub encoding: EncodingCharacters,
    /// Root group holding the top-level occurrences.
    pub root: GroupInstance,
}

impl MessageTree {
    /// Returns the `MSH` segment.
    pub fn header(&self) -> Option<&Segment> {
        self.root.first_segment("MSH")
    }

    /// Returns every instance of the named group in document order.
    pub fn group_instances(&self, name: &str) -> Vec<&GroupInstance> {
        let mut out = Vec::new();
        self.root.find_groups(name, &mut out);
        out
    }

    /// Returns the total number of segments in the message.
    pub fn segment_count(&self) -> usize {
        self.root.all_segments().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(name: &str) -> StructureNode {
        StructureNode::Segment(Segment::new(name, vec![]))
    }

    fn sample() -> MessageTree {
        let obs = |_: usize| {
            StructureNode::Group(GroupInstance {
                name: "PROBLEM_OBSERVATION".into(),
                children: vec![seg("OBX")],
            })
        };
        let problem = GroupInstance {
            name: "PROBLEM".into(),
            children: vec![seg("PRB"), seg("NTE"), obs(0), obs(1)],
        };
        MessageTree {
            message_type: MessageType::new("PPR", "PC1", Some("PPR_PC1")),
            encoding: EncodingCharacters::default(),
            root: GroupInstance {
                name: String::new(),
                children: vec![seg("MSH"), seg("PID"), StructureNode::Group(problem)],
            },
        }
    }

    #[test]
    fn test_message_type_structure_fallback() {
        assert_eq!(MessageType::new("ADT", "A01", None).structure, "ADT_A01");
        assert_eq!(MessageType::new("ADT", "A04", Some("ADT_A01")).structure, "ADT_A01");
        assert_eq!(MessageType::new("ACK", "", None).structure, "ACK");
    }

    #[test]
    fn test_group_lookup() {
        let tree = sample();
        assert!(tree.header().is_some());
        let problems = tree.group_instances("PROBLEM");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].groups("PROBLEM_OBSERVATION").count(), 2);
        assert_eq!(tree.group_instances("PROBLEM_OBSERVATION").len(), 2);
        assert_eq!(tree.segment_count(), 6);
    }

    #[test]
    fn test_leading_segment() {
        let tree = sample();
        let problem = tree.group_instances("PROBLEM")[0];
        assert_eq!(problem.leading_segment().map(|s| s.name.as_str()), Some("PRB"));
        assert_eq!(tree.root.segments("OBX").count(), 0);
    }

    #[test]
    fn test_lookups_outlive_the_name() {
        let tree = sample();
        let problem = tree.group_instances("PROBLEM")[0];
        let found: Vec<&Segment> = {
            let name = String::from("PRB");
            problem.segments(&name).collect()
        };
        let groups: Vec<&GroupInstance> = {
            let name = format!("PROBLEM_{}", "OBSERVATION");
            problem.groups(&name).collect()
        };
        assert_eq!(found.len(), 1);
        assert_eq!(groups.len(), 2);
        assert_eq!(problem.first_segment("NTE").map(|s| s.name.as_str()), Some("NTE"));
    }
}
