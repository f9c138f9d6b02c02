pub const MODIFIED: &str = "http://purl.org/dc/terms/modified";

/// Every graph with a top-level modification timestamp. Timestamps stored
/// inside a named graph are shadow copies and are ignored.
pub const LOADED_VOCABS: &str = r#"
SELECT ?graph ?timestamp
WHERE {
    ?graph <http://purl.org/dc/terms/modified> ?timestamp .
    FILTER NOT EXISTS {
        GRAPH ?g {?graph <http://purl.org/dc/terms/modified> ?timestamp .}
    }
}
ORDER BY ?timestamp
"#;

pub fn set_timestamp(graph: &str, timestamp: i64) -> String {
    format!("INSERT DATA {{\n    <{graph}> <{MODIFIED}> {timestamp} .\n}}")
}

pub fn update_timestamp(graph: &str, timestamp: i64) -> String {
    format!(
        "DELETE {{\n    <{graph}> <{MODIFIED}> ?timestamp .\n}}\n\
         INSERT {{\n    <{graph}> <{MODIFIED}> {timestamp} .\n}}\n\
         WHERE {{\n    <{graph}> <{MODIFIED}> ?timestamp .\n}}"
    )
}
