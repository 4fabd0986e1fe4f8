use std::collections::HashMap;

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ConnectorError;
use crate::table::DataTable;

/// One dataset's discovery metadata, flattened out of the provider's
/// navigation-tree XML. String fields are always present; an absent value is
/// an empty string, never a null in the published table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogueEntry {
    pub code: String,
    pub path: String,
    pub leaf_type: String,
    pub title: String,
    pub last_update: String,
    pub last_modified: String,
    pub data_start: String,
    pub data_end: String,
    pub values: u64,
    pub source: String,
    pub unit: String,
    pub description: String,
    pub metadata_links: String,
    pub download_link: String,
    pub download_format: String,
}

pub const CATALOGUE_COLUMNS: [&str; 15] = [
    "code",
    "path",
    "type",
    "title",
    "last_update",
    "last_modified",
    "data_start",
    "data_end",
    "values",
    "source",
    "unit",
    "description",
    "metadata_links",
    "download_link",
    "download_format",
];

/// Walks the catalogue tree depth-first in document order and returns one
/// entry per leaf. Branches are recursed into but never emitted, including
/// branches with no children.
pub fn extract_catalogue(
    xml: &str,
    language: &str,
) -> Result<Vec<CatalogueEntry>, ConnectorError> {
    let root = parse_document(xml)?;
    let mut entries = Vec::new();
    for branch in &root.children {
        extract_node(branch, "", language, &mut entries)?;
    }
    Ok(entries)
}

pub fn to_table(entries: &[CatalogueEntry]) -> DataTable {
    let columns = CATALOGUE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut table = DataTable::new(columns);
    for entry in entries {
        table.push_row(vec![
            Some(entry.code.clone()),
            Some(entry.path.clone()),
            Some(entry.leaf_type.clone()),
            Some(entry.title.clone()),
            Some(entry.last_update.clone()),
            Some(entry.last_modified.clone()),
            Some(entry.data_start.clone()),
            Some(entry.data_end.clone()),
            Some(entry.values.to_string()),
            Some(entry.source.clone()),
            Some(entry.unit.clone()),
            Some(entry.description.clone()),
            Some(entry.metadata_links.clone()),
            Some(entry.download_link.clone()),
            Some(entry.download_format.clone()),
        ]);
    }
    table
}

fn extract_node(
    node: &XmlNode,
    parent_path: &str,
    language: &str,
    entries: &mut Vec<CatalogueEntry>,
) -> Result<(), ConnectorError> {
    let code = node.child_text("code").unwrap_or_default();
    let path = if parent_path.is_empty() {
        code.clone()
    } else {
        format!("{}/{}", parent_path, code)
    };

    // Leaf detection is by node kind, never by absence of children.
    if node.name == "leaf" {
        entries.push(build_entry(node, code, path.clone(), language)?);
    }

    if let Some(children) = node.child("children") {
        for child in &children.children {
            extract_node(child, &path, language, entries)?;
        }
    }
    Ok(())
}

fn build_entry(
    node: &XmlNode,
    code: String,
    path: String,
    language: &str,
) -> Result<CatalogueEntry, ConnectorError> {
    // Last-update timestamps drive freshness comparison, so a leaf without
    // them cannot be synchronized and fails the whole extraction.
    let last_update = mandatory_date(node, "lastUpdate", &code)?;
    let last_modified = mandatory_date(node, "lastModified", &code)?;

    let values = node
        .child_text("values")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);

    let metadata_links = node
        .children_named("metadata")
        .filter(|meta| !meta.text.is_empty())
        .map(|meta| format!("{}:{}", meta.attribute("format").unwrap_or_default(), meta.text))
        .collect::<Vec<_>>()
        .join("|");

    let (download_link, download_format) = match node.child("downloadLink") {
        Some(link) => (
            link.text.clone(),
            link.attribute("format").unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };

    Ok(CatalogueEntry {
        leaf_type: node.attribute("type").unwrap_or_default(),
        title: node.localized_text("title", language),
        source: node.localized_text("source", language),
        unit: node.localized_text("unit", language),
        description: node.localized_text("shortDescription", language),
        data_start: node.child_text("dataStart").unwrap_or_default(),
        data_end: node.child_text("dataEnd").unwrap_or_default(),
        code,
        path,
        last_update,
        last_modified,
        values,
        metadata_links,
        download_link,
        download_format,
    })
}

fn mandatory_date(node: &XmlNode, field: &str, code: &str) -> Result<String, ConnectorError> {
    let raw = node
        .child_text(field)
        .ok_or_else(|| ConnectorError::CatalogueFormat {
            message: format!("leaf `{}` is missing {}", code, field),
        })?;
    normalize_date(&raw).map_err(|_| ConnectorError::CatalogueFormat {
        message: format!("leaf `{}` has malformed {} `{}`", code, field, raw),
    })
}

/// The provider serves dates as DD.MM.YYYY; tables carry YYYY-MM-DD.
fn normalize_date(raw: &str) -> Result<String, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(raw, "%d.%m.%Y")?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Lightweight element tree. The navtree document is small relative to the
/// datasets themselves, so materializing it keeps the recursive walk simple.
#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attributes: HashMap<String, String>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|child| child.text.clone())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    /// First instance of a multi-valued localized field matching the target
    /// language. An element with no language attribute counts as the default
    /// language; no match yields an empty string.
    fn localized_text(&self, name: &str, language: &str) -> String {
        for child in self.children_named(name) {
            let child_language = child
                .attributes
                .get("language")
                .map(String::as_str)
                .unwrap_or("en");
            if child_language == language {
                return child.text.clone();
            }
        }
        String::new()
    }
}

/// Parses the document into an element tree, matching element names by local
/// name so the provider's namespace prefix is irrelevant.
fn parse_document(xml: &str) -> Result<XmlNode, ConnectorError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    // Index 0 is a synthetic holder for the document root.
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(node_from_start(e)?),
            Ok(Event::Empty(ref e)) => {
                let node = node_from_start(e)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::End(_)) => {
                let node = stack.pop().unwrap_or_default();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => {
                        return Err(ConnectorError::CatalogueFormat {
                            message: "unbalanced closing tag".to_string(),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }
    }

    let mut holder = stack.pop().unwrap_or_default();
    if !stack.is_empty() {
        return Err(ConnectorError::CatalogueFormat {
            message: "unclosed element at end of document".to_string(),
        });
    }
    match holder.children.pop() {
        Some(root) if holder.children.is_empty() => Ok(root),
        _ => Err(ConnectorError::CatalogueFormat {
            message: "expected exactly one root element".to_string(),
        }),
    }
}

fn node_from_start(e: &BytesStart<'_>) -> Result<XmlNode, ConnectorError> {
    let local = e.local_name();
    let name = std::str::from_utf8(local.as_ref())
        .unwrap_or_default()
        .to_string();

    let mut attributes = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        let key = std::str::from_utf8(attr.key.local_name().as_ref())
            .unwrap_or_default()
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(ConnectorError::Xml)?
            .into_owned();
        attributes.insert(key, value);
    }

    Ok(XmlNode {
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}
