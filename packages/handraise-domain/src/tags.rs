/// Normalizes a tag name the way it is stored: trimmed, leading `#` removed, lowercased.
///
/// Returns `None` when nothing remains.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
	let name = raw.trim().trim_start_matches('#').trim().to_lowercase();

	if name.is_empty() { None } else { Some(name) }
}

/// Normalizes and deduplicates tag names, keeping first-seen order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut out: Vec<String> = Vec::new();

	for item in raw {
		let Some(name) = normalize_tag_name(item.as_ref()) else {
			continue;
		};

		if !out.contains(&name) {
			out.push(name);
		}
	}

	out
}

/// Splits a comma-separated hashtag list, e.g. `"#python, rust,#SQL"`.
pub fn split_tag_list(raw: &str) -> Vec<String> {
	normalize_tags(raw.split(','))
}
