/// Graph IRI declared by a Skosmos vocabulary configuration: the token after
/// `sparqlGraph` on the first line that mentions it, without angle brackets.
/// Returns an empty string when no such line exists.
pub fn extract_graph(config: &str) -> String {
    config
        .lines()
        .find(|line| line.contains("sparqlGraph"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|token| token.trim_matches(|c| c == '<' || c == '>').to_string())
        .unwrap_or_default()
}

/// Hours elapsed between two Unix timestamps.
pub fn age_in_hours(timestamp: i64, now: i64) -> f64 {
    (now - timestamp) as f64 / 3600.0
}
