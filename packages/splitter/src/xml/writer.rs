//! Subtree serialization.
//!
//! A matched node is copied onto a derived document as a standalone XML
//! document. Namespace declarations inherited from ancestors outside the
//! subtree are re-declared on the new root element so prefixed names stay
//! resolvable.

use roxmltree::{Node, NodeType};

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace bindings in scope: `(prefix, uri)`, `None` for the default namespace.
type Scope<'a> = Vec<(Option<&'a str>, &'a str)>;

/// Serialize a node and its descendants as a standalone XML string.
///
/// Serializing the root node writes every top-level child of the document.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use lineage_splitter::xml::serialize_subtree;
///
/// let doc = Document::parse(r#"<docs><doc id="1"><t>a &amp; b</t></doc></docs>"#).unwrap();
/// let first = doc.root_element().first_element_child().unwrap();
/// assert_eq!(serialize_subtree(first), r#"<doc id="1"><t>a &amp; b</t></doc>"#);
/// ```
pub fn serialize_subtree(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    if node.node_type() == NodeType::Root {
        for child in node.children() {
            write_node(child, &[], &mut out);
        }
    } else {
        write_node(node, &[], &mut out);
    }
    out
}

fn write_node(node: Node<'_, '_>, parent_scope: &[(Option<&str>, &str)], out: &mut String) {
    match node.node_type() {
        NodeType::Element => write_element(node, parent_scope, out),
        NodeType::Text => out.push_str(&escape_text(node.text().unwrap_or_default())),
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(node.text().unwrap_or_default());
            out.push_str("-->");
        }
        NodeType::PI => {
            if let Some(pi) = node.pi() {
                out.push_str("<?");
                out.push_str(pi.target);
                if let Some(value) = pi.value {
                    out.push(' ');
                    out.push_str(value);
                }
                out.push_str("?>");
            }
        }
        NodeType::Root => {
            for child in node.children() {
                write_node(child, parent_scope, out);
            }
        }
    }
}

fn write_element(node: Node<'_, '_>, parent_scope: &[(Option<&str>, &str)], out: &mut String) {
    let scope = in_scope(node);

    out.push('<');
    out.push_str(&element_name(node, &scope));

    for (prefix, uri) in &scope {
        if parent_scope.iter().any(|(p, u)| p == prefix && u == uri) {
            continue;
        }
        match prefix {
            Some(p) => out.push_str(&format!(" xmlns:{p}=\"{}\"", escape_attribute(uri))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape_attribute(uri))),
        }
    }

    // Default namespace undeclared relative to the parent.
    let had_default = parent_scope.iter().any(|(p, _)| p.is_none());
    let has_default = scope.iter().any(|(p, _)| p.is_none());
    if had_default && !has_default {
        out.push_str(" xmlns=\"\"");
    }

    for attr in node.attributes() {
        let name = match attr.namespace() {
            Some(XML_NAMESPACE) => format!("xml:{}", attr.name()),
            Some(uri) => match prefix_for(&scope, uri) {
                Some(p) => format!("{p}:{}", attr.name()),
                None => attr.name().to_string(),
            },
            None => attr.name().to_string(),
        };
        out.push_str(&format!(" {name}=\"{}\"", escape_attribute(attr.value())));
    }

    if !node.has_children() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in node.children() {
        write_node(child, &scope, out);
    }
    out.push_str("</");
    out.push_str(&element_name(node, &scope));
    out.push('>');
}

fn in_scope<'a>(node: Node<'a, '_>) -> Scope<'a> {
    node.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .map(|ns| (ns.name(), ns.uri()))
        .collect()
}

fn element_name(node: Node<'_, '_>, scope: &[(Option<&str>, &str)]) -> String {
    let local = node.tag_name().name();
    let Some(uri) = node.tag_name().namespace() else {
        return local.to_string();
    };

    if scope.iter().any(|(p, u)| p.is_none() && *u == uri) {
        return local.to_string();
    }

    match prefix_for(scope, uri) {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

fn prefix_for<'a>(scope: &[(Option<&'a str>, &str)], uri: &str) -> Option<&'a str> {
    scope
        .iter()
        .find_map(|(p, u)| if *u == uri { *p } else { None })
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\r', "&#13;")
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
        .replace('\t', "&#9;")
        .replace('\r', "&#13;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn first_child_element(xml: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        let node = doc.root_element().first_element_child().unwrap();
        serialize_subtree(node)
    }

    #[test]
    fn test_serialize_simple_element() {
        let out = first_child_element("<docs><doc id='1'><title>doc 1</title></doc></docs>");
        assert_eq!(out, r#"<doc id="1"><title>doc 1</title></doc>"#);
    }

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let out = first_child_element(r#"<r><e a="x &quot;y&quot; &lt;z"><![CDATA[1 < 2 & 3]]></e></r>"#);
        assert_eq!(out, r#"<e a="x &quot;y&quot; &lt;z">1 &lt; 2 &amp; 3</e>"#);
    }

    #[test]
    fn test_serialize_redeclares_inherited_prefix() {
        let out = first_child_element(r#"<m:feed xmlns:m="urn:m"><m:item m:id="1"/></m:feed>"#);
        assert_eq!(out, r#"<m:item xmlns:m="urn:m" m:id="1"/>"#);

        // The output must stand on its own.
        let reparsed = Document::parse(&out).unwrap();
        assert_eq!(reparsed.root_element().tag_name().namespace(), Some("urn:m"));
    }

    #[test]
    fn test_serialize_default_namespace() {
        let out = first_child_element(r#"<feed xmlns="urn:d"><item><t/></item></feed>"#);
        assert_eq!(out, r#"<item xmlns="urn:d"><t/></item>"#);
    }

    #[test]
    fn test_serialize_undeclared_default_namespace() {
        let out = first_child_element(r#"<feed xmlns="urn:d"><item><t xmlns=""/></item></feed>"#);
        assert_eq!(out, r#"<item xmlns="urn:d"><t xmlns=""/></item>"#);
    }

    #[test]
    fn test_serialize_keeps_comments() {
        let out = first_child_element("<r><e>a<!-- note -->b</e></r>");
        assert_eq!(out, "<e>a<!-- note -->b</e>");
    }

    #[test]
    fn test_serialize_root_node() {
        let doc = Document::parse("<a><b/></a>").unwrap();
        assert_eq!(serialize_subtree(doc.root()), "<a><b/></a>");
    }

    #[test]
    fn test_carriage_returns_survive_reparsing() {
        let out = first_child_element("<r><a v=\"1&#13;2\">l1&#13;l2</a></r>");
        assert_eq!(out, "<a v=\"1&#13;2\">l1&#13;l2</a>");

        let reparsed = Document::parse(&out).unwrap();
        let a = reparsed.root_element();
        assert_eq!(a.attribute("v"), Some("1\r2"));
        assert_eq!(a.text(), Some("l1\rl2"));
    }
}
