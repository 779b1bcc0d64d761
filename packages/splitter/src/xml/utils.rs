//! XML utility functions for navigating and extracting data from payload trees.

use roxmltree::{Node, NodeType};

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use lineage_splitter::xml::get_tag_name;
///
/// let xml = r#"<m:feed xmlns:m="urn:m"><m:item/></m:feed>"#;
/// let doc = Document::parse(xml).unwrap();
/// assert_eq!(get_tag_name(doc.root_element()), "feed");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Concatenated text of all descendant text nodes, untrimmed.
///
/// For a text node this is its own text.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use lineage_splitter::xml::text_content;
///
/// let doc = Document::parse("<al>Hello <b>big</b> world</al>").unwrap();
/// assert_eq!(text_content(doc.root_element()), "Hello big world");
/// ```
pub fn text_content(node: Node<'_, '_>) -> String {
    match node.node_type() {
        NodeType::Text | NodeType::Comment => node.text().unwrap_or_default().to_string(),
        NodeType::PI => node
            .pi()
            .and_then(|pi| pi.value)
            .unwrap_or_default()
            .to_string(),
        NodeType::Root | NodeType::Element => node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect(),
    }
}

/// Render the position of a node as an absolute path with 1-based sibling
/// indices, e.g. `/docs[1]/doc[2]`.
///
/// Indices count preceding siblings with the same expanded name (or, for
/// text nodes, preceding text siblings).
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use lineage_splitter::xml::node_path;
///
/// let doc = Document::parse("<docs><doc/><doc/></docs>").unwrap();
/// let second = doc.root_element().last_element_child().unwrap();
/// assert_eq!(node_path(second), "/docs[1]/doc[2]");
/// ```
pub fn node_path(node: Node<'_, '_>) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current = Some(node);

    while let Some(n) = current {
        match n.node_type() {
            NodeType::Root => break,
            NodeType::Element => {
                let index = n
                    .prev_siblings()
                    .filter(|s| *s != n && s.is_element() && s.tag_name() == n.tag_name())
                    .count()
                    + 1;
                segments.push(format!("{}[{}]", get_tag_name(n), index));
            }
            NodeType::Text => {
                let index = n
                    .prev_siblings()
                    .filter(|s| *s != n && s.is_text())
                    .count()
                    + 1;
                segments.push(format!("text()[{index}]"));
            }
            NodeType::Comment => {
                let index = n
                    .prev_siblings()
                    .filter(|s| *s != n && s.node_type() == NodeType::Comment)
                    .count()
                    + 1;
                segments.push(format!("comment()[{index}]"));
            }
            NodeType::PI => {
                let index = n
                    .prev_siblings()
                    .filter(|s| *s != n && s.node_type() == NodeType::PI)
                    .count()
                    + 1;
                segments.push(format!("processing-instruction()[{index}]"));
            }
        }
        current = n.parent();
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    segments.reverse();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_get_tag_name_with_namespace() {
        let xml = r#"<ns:root xmlns:ns="http://example.com"><ns:child/></ns:root>"#;
        let doc = Document::parse(xml).unwrap();
        assert_eq!(get_tag_name(doc.root_element()), "root");
    }

    #[test]
    fn test_text_content_is_untrimmed() {
        let doc = Document::parse("<root>  a <x>b</x> c  </root>").unwrap();
        assert_eq!(text_content(doc.root_element()), "  a b c  ");
    }

    #[test]
    fn test_text_content_of_empty_element() {
        let doc = Document::parse("<root/>").unwrap();
        assert_eq!(text_content(doc.root_element()), "");
    }

    #[test]
    fn test_node_path_counts_same_name_siblings_only() {
        let doc = Document::parse("<feed><meta/><item/><meta/><item/></feed>").unwrap();
        let last_item = doc
            .descendants()
            .filter(|n| n.has_tag_name("item"))
            .last()
            .unwrap();

        assert_eq!(node_path(last_item), "/feed[1]/item[2]");
    }

    #[test]
    fn test_node_path_of_root_and_text() {
        let doc = Document::parse("<a>x<b/>y</a>").unwrap();
        assert_eq!(node_path(doc.root()), "/");

        let y = doc.root_element().last_child().unwrap();
        assert_eq!(node_path(y), "/a[1]/text()[2]");
    }
}
