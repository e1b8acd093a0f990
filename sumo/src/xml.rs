//! Scrapes the attributes of elements out of SUMO's XML files, without interpreting them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::NetworkPaths;

/// The attributes of one XML element, plus the attributes of some of its children.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub attributes: BTreeMap<String, String>,
    /// Keyed by the child tag with an `s` appended, so `lane` children are under `lanes`. Each
    /// list is in document order.
    pub children: BTreeMap<String, Vec<BTreeMap<String, String>>>,
}

impl Record {
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(|x| x.as_str())
    }

    /// The attributes of every child with this tag. Empty if children weren't requested.
    pub fn children(&self, child_key: &str) -> &[BTreeMap<String, String>] {
        self.children
            .get(&format!("{}s", child_key))
            .map(|x| x.as_slice())
            .unwrap_or(&[])
    }
}

/// One matching element, either as just the value of the requested key attribute, or all of its
/// attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Key(String),
    Attributes(Record),
}

impl Element {
    pub fn key(&self) -> Option<&str> {
        match self {
            Element::Key(x) => Some(x),
            Element::Attributes(_) => None,
        }
    }

    pub fn attributes(&self) -> Option<&Record> {
        match self {
            Element::Key(_) => None,
            Element::Attributes(r) => Some(r),
        }
    }

    pub fn into_key(self) -> Option<String> {
        match self {
            Element::Key(x) => Some(x),
            Element::Attributes(_) => None,
        }
    }

    pub fn into_attributes(self) -> Option<Record> {
        match self {
            Element::Key(_) => None,
            Element::Attributes(r) => Some(r),
        }
    }

    /// Looks up one attribute. A bare key has no attributes.
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes().and_then(|r| r.get(attribute))
    }
}

/// What to scrape from a file.
#[derive(Clone, Debug)]
pub struct Query<'a> {
    /// A `/`-separated path of tag names, relative to the root element. `*` matches any tag.
    pub target: &'a str,
    /// Selects the file: `net` for `{id}.net.xml`, `rou` for `{id}.rou.xml`.
    pub file_type: &'a str,
    /// Elements carrying this attribute are skipped.
    pub ignore: Option<&'a str>,
    /// If an element has this attribute, only its value is returned.
    pub key: Option<&'a str>,
    /// Attach the attributes of children with this tag.
    pub child_key: Option<&'a str>,
}

impl<'a> Query<'a> {
    pub fn new(target: &'a str) -> Query<'a> {
        Query {
            target,
            file_type: "net",
            ignore: None,
            key: None,
            child_key: None,
        }
    }

    pub fn file_type(mut self, file_type: &'a str) -> Query<'a> {
        self.file_type = file_type;
        self
    }

    pub fn ignore(mut self, attribute: &'a str) -> Query<'a> {
        self.ignore = Some(attribute);
        self
    }

    pub fn key(mut self, attribute: &'a str) -> Query<'a> {
        self.key = Some(attribute);
        self
    }

    pub fn child_key(mut self, tag: &'a str) -> Query<'a> {
        self.child_key = Some(tag);
        self
    }
}

pub fn get_path(paths: &NetworkPaths, network_id: &str, file_type: &str) -> PathBuf {
    paths.file(network_id, file_type)
}

/// Parses `{network_id}.{file_type}.xml` in search of the query's target. A missing file has no
/// elements.
///
/// ```ignore
/// // All junctions of the grid network
/// let junctions = get_generic_element(&paths, "grid", &Query::new("junction"))?;
/// ```
pub fn get_generic_element(
    paths: &NetworkPaths,
    network_id: &str,
    query: &Query,
) -> Result<Vec<Element>> {
    extract(get_path(paths, network_id, query.file_type), query)
}

/// Like `get_generic_element`, but for a specific file. The query's `file_type` is ignored.
pub fn extract<P: AsRef<Path>>(path: P, query: &Query) -> Result<Vec<Element>> {
    let path = path.as_ref();
    if !path.is_file() {
        debug!("{} doesn't exist, so no {} in it", path.display(), query.target);
        return Ok(Vec::new());
    }
    let raw = fs_err::read_to_string(path)?;
    parse(&raw, query).with_context(|| format!("scraping {} from {}", query.target, path.display()))
}

/// Scrapes elements out of an XML string.
pub fn parse(raw: &str, query: &Query) -> Result<Vec<Element>> {
    let doc = roxmltree::Document::parse(raw)?;

    let mut elements = Vec::new();
    for elem in find_all(doc.root_element(), query.target) {
        if let Some(ignore) = query.ignore {
            if elem.has_attribute(ignore) {
                continue;
            }
        }
        if let Some(value) = query.key.and_then(|key| elem.attribute(key)) {
            elements.push(Element::Key(value.to_string()));
            continue;
        }

        let mut record = Record {
            attributes: read_attributes(elem),
            children: BTreeMap::new(),
        };
        if let Some(child_key) = query.child_key {
            record.children.insert(
                format!("{}s", child_key),
                find_all(elem, child_key)
                    .into_iter()
                    .map(read_attributes)
                    .collect(),
            );
        }
        elements.push(Element::Attributes(record));
    }
    Ok(elements)
}

// Follows the path one tag at a time. Every level keeps document order, and sibling subtrees don't
// overlap, so the final list is in document order too.
fn find_all<'a, 'input>(
    from: roxmltree::Node<'a, 'input>,
    path: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    let mut current = vec![from];
    for tag in path.split('/').filter(|t| !t.is_empty()) {
        current = current
            .into_iter()
            .flat_map(|node| {
                node.children()
                    .filter(move |c| c.is_element() && (tag == "*" || c.tag_name().name() == tag))
            })
            .collect();
    }
    current
}

fn read_attributes(node: roxmltree::Node) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    for attr in node.attributes() {
        attributes.insert(attr.name().to_string(), attr.value().to_string());
    }
    attributes
}
