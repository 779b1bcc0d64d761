//! Field propagation from a parent document onto derived documents.

use crate::document::{IngestDocument, IngestField};

/// Whether a parent field is copied onto derived documents.
///
/// Input fields are excluded: each child receives its own payload. Fields
/// holding any content pointer are excluded as well, since the referenced
/// bytes belong to the parent.
///
/// # Examples
/// ```
/// use lineage_splitter::document::{ContentPointer, FieldValue, IngestField};
/// use lineage_splitter::splitting::should_copy;
///
/// let inputs = vec!["xmldom".to_string()];
/// let title = IngestField::new("title").with_value(FieldValue::text("T"));
/// let payload = IngestField::new("xmldom").with_value(FieldValue::xml("<a/>"));
/// let content = IngestField::new("content")
///     .with_value(FieldValue::ContentPointer(ContentPointer::new("store", "k")));
///
/// assert!(should_copy(&title, &inputs));
/// assert!(!should_copy(&payload, &inputs));
/// assert!(!should_copy(&content, &inputs));
/// ```
pub fn should_copy(field: &IngestField, input_fields: &[String]) -> bool {
    !input_fields.iter().any(|name| *name == field.name) && !field.has_content_pointer()
}

/// Copy every propagatable field of `parent` onto `child` as an
/// independent clone.
pub fn propagate_fields(parent: &IngestDocument, child: &mut IngestDocument, input_fields: &[String]) {
    for field in parent.fields().filter(|f| should_copy(f, input_fields)) {
        child.set_field(field.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ContentPointer, FieldValue};
    use pretty_assertions::assert_eq;

    fn inputs() -> Vec<String> {
        vec!["xmldom".to_string(), "raw".to_string()]
    }

    #[test]
    fn test_multi_valued_field_is_copied_whole() {
        let parent = IngestDocument::new("p")
            .with_value("tags", FieldValue::text("a"))
            .with_value("tags", FieldValue::text("b"));
        let mut child = IngestDocument::new("c");

        propagate_fields(&parent, &mut child, &inputs());
        assert_eq!(child.texts("tags"), vec!["a", "b"]);
    }

    #[test]
    fn test_input_and_content_pointer_fields_are_excluded() {
        let parent = IngestDocument::new("p")
            .with_value("xmldom", FieldValue::xml("<a/>"))
            .with_value("raw", FieldValue::text("<b/>"))
            .with_value("title", FieldValue::text("T"))
            .with_value("body", FieldValue::text("inline"))
            .with_value(
                "body",
                FieldValue::ContentPointer(ContentPointer::new("store", "k1")),
            );
        let mut child = IngestDocument::new("c");

        propagate_fields(&parent, &mut child, &inputs());

        let names: Vec<&str> = child.fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["title"]);
    }

    #[test]
    fn test_input_field_match_is_case_sensitive() {
        let field = IngestField::new("XMLDOM").with_value(FieldValue::text("x"));
        assert!(should_copy(&field, &inputs()));
    }

    #[test]
    fn test_copies_are_independent() {
        let parent = IngestDocument::new("p").with_value("tags", FieldValue::text("a"));
        let mut child = IngestDocument::new("c");

        propagate_fields(&parent, &mut child, &inputs());
        child.add_value("tags", FieldValue::text("b"));

        assert_eq!(parent.texts("tags"), vec!["a"]);
        assert_eq!(child.texts("tags"), vec!["a", "b"]);
    }
}
