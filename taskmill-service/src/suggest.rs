// Closest-match suggestions for mistyped operation and stage names

/// Minimum Jaro-Winkler similarity for a candidate to be suggested
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Return the candidate most similar to `input`, if any is similar enough
pub fn closest_match<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let input = input.to_lowercase();
    candidates
        .into_iter()
        .map(|c| (c, strsim::jaro_winkler(&input, &c.to_lowercase())))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c.to_string())
}

/// Format an optional suggestion as a trailing sentence for error messages
pub(crate) fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(", did you mean '{}'?", s),
        None => String::new(),
    }
}
