use serde::Serialize;
use serde_json::Value;

/// A document filter predicate.
///
/// Serializes to the backend's JSON query syntax, e.g.
/// `{"method":"equal","attribute":"email","values":["a@x.com"]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Query {
    Equal { attribute: String, values: Vec<Value> },
    Contains { attribute: String, values: Vec<Value> },
    Or { values: Vec<Query> },
    Limit { values: Vec<Value> },
    CursorAfter { values: Vec<Value> },
}

impl Query {
    pub fn equal<V: Into<Value>>(attribute: &str, values: impl IntoIterator<Item = V>) -> Self {
        Query::Equal {
            attribute: attribute.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains<V: Into<Value>>(attribute: &str, values: impl IntoIterator<Item = V>) -> Self {
        Query::Contains {
            attribute: attribute.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn or(queries: Vec<Query>) -> Self {
        Query::Or { values: queries }
    }

    /// Caps the page size of a listing.
    pub fn limit(limit: usize) -> Self {
        Query::Limit {
            values: vec![Value::from(limit)],
        }
    }

    /// Starts a listing after the document with `document_id`.
    pub fn cursor_after(document_id: &str) -> Self {
        Query::CursorAfter {
            values: vec![Value::from(document_id)],
        }
    }

    /// The page size requested by a `limit` query.
    pub fn page_limit(&self) -> Option<usize> {
        match self {
            Query::Limit { values } => values
                .first()
                .and_then(Value::as_u64)
                .map(|limit| limit as usize),
            _ => None,
        }
    }

    /// The document id a `cursorAfter` query resumes from.
    pub fn cursor(&self) -> Option<&str> {
        match self {
            Query::CursorAfter { values } => values.first().and_then(Value::as_str),
            _ => None,
        }
    }

    /// Evaluates the predicate against a flat document object.
    ///
    /// `equal` on an array attribute matches when any element equals any value;
    /// `contains` matches array membership or substring for string attributes.
    /// Paging queries select no documents by themselves and always match.
    pub fn matches(&self, document: &serde_json::Map<String, Value>) -> bool {
        match self {
            Query::Equal { attribute, values } => match document.get(attribute) {
                Some(Value::Array(items)) => items.iter().any(|item| values.contains(item)),
                Some(value) => values.contains(value),
                None => false,
            },
            Query::Contains { attribute, values } => match document.get(attribute) {
                Some(Value::Array(items)) => values.iter().any(|value| items.contains(value)),
                Some(Value::String(text)) => values
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|needle| text.contains(needle)),
                _ => false,
            },
            Query::Or { values } => values.iter().any(|query| query.matches(document)),
            Query::Limit { .. } | Query::CursorAfter { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_query_serializes_to_backend_syntax() {
        let query = Query::or(vec![
            Query::equal("owner", ["u1"]),
            Query::contains("users", ["a@x.com"]),
        ]);

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "method": "or",
                "values": [
                    {"method": "equal", "attribute": "owner", "values": ["u1"]},
                    {"method": "contains", "attribute": "users", "values": ["a@x.com"]}
                ]
            })
        );
    }

    #[test]
    fn test_query_matching() {
        let doc = object(json!({
            "owner": "u1",
            "users": ["b@x.com", "c@x.com"],
            "name": "report.pdf"
        }));

        assert!(Query::equal("owner", ["u1", "u2"]).matches(&doc));
        assert!(!Query::equal("owner", ["u3"]).matches(&doc));
        assert!(Query::contains("users", ["c@x.com"]).matches(&doc));
        assert!(!Query::contains("users", ["a@x.com"]).matches(&doc));
        assert!(Query::contains("name", ["report"]).matches(&doc));
        assert!(!Query::equal("missing", ["x"]).matches(&doc));

        let shared_or_owned = Query::or(vec![
            Query::equal("owner", ["u9"]),
            Query::contains("users", ["b@x.com"]),
        ]);
        assert!(shared_or_owned.matches(&doc));
        assert!(Query::limit(1).matches(&doc));
    }

    #[test]
    fn test_paging_queries() {
        assert_eq!(
            serde_json::to_value(Query::limit(25)).unwrap(),
            json!({"method": "limit", "values": [25]})
        );
        assert_eq!(
            serde_json::to_value(Query::cursor_after("f1")).unwrap(),
            json!({"method": "cursorAfter", "values": ["f1"]})
        );
        assert_eq!(Query::limit(25).page_limit(), Some(25));
        assert_eq!(Query::cursor_after("f1").cursor(), Some("f1"));
        assert_eq!(Query::equal("owner", ["u1"]).page_limit(), None);
    }
}
