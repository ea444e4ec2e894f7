use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// File extension given to new snippet documents.
pub const SNIPPET_EXTENSION: &str = "snippet";

/// On-disk snippet document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetDocument {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub snippets: Vec<SnippetEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetEntry {
    pub uid: String,
    pub text: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub line: String,
}

impl SnippetDocument {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Append a captured selection and return its uid.
    pub fn push_entry(
        &mut self,
        text: impl Into<String>,
        file_path: impl Into<String>,
        line: impl Into<String>,
    ) -> &str {
        self.snippets.push(SnippetEntry {
            uid: Uuid::new_v4().to_string(),
            text: text.into(),
            file_path: file_path.into(),
            line: line.into(),
        });
        self.snippets
            .last()
            .map_or("", |entry| entry.uid.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let mut document = SnippetDocument::new("notes");
        document.snippets.push(SnippetEntry {
            uid: "abc".to_string(),
            text: "let x = 1;".to_string(),
            file_path: "/src/main.rs".to_string(),
            line: "12".to_string(),
        });

        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            serde_json::json!({
                "title": "notes",
                "description": "",
                "snippets": [
                    {"uid": "abc", "text": "let x = 1;", "filePath": "/src/main.rs", "line": "12"}
                ]
            })
        );
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let document = SnippetDocument::from_json(r#"{"title": "t"}"#).unwrap();
        assert_eq!(document, SnippetDocument::new("t"));
    }

    #[test]
    fn test_missing_title_is_invalid() {
        assert!(SnippetDocument::from_json(r#"{"snippets": []}"#).is_err());
        assert!(SnippetDocument::from_json("[]").is_err());
    }

    #[test]
    fn test_push_entry_uids_are_unique() {
        let mut document = SnippetDocument::new("t");
        for i in 0..5 {
            document.push_entry(format!("text {i}"), "/f", "1");
        }

        let mut uids: Vec<_> = document.snippets.iter().map(|e| e.uid.clone()).collect();
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), 5);
    }

    #[test]
    fn test_uids_differ_across_documents() {
        let mut first = SnippetDocument::new("a");
        let mut second = SnippetDocument::new("b");
        let one = first.push_entry("x", "/f", "1").to_string();
        let two = second.push_entry("x", "/f", "1").to_string();

        assert_ne!(one, two);
        assert!(Uuid::parse_str(&one).is_ok());
    }
}
