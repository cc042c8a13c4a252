use docsearch_core::types::IndexDescriptor;

/// Category scope of a search. Empty parts match every sub-index.
#[derive(Debug, Clone, Copy)]
pub struct CategoryFilter<'a> {
	tree: &'a str,
	categories: &'a [String],
}

impl<'a> CategoryFilter<'a> {
	pub fn new(tree: &'a str, categories: &'a [String]) -> Self {
		Self { tree, categories }
	}

	pub fn includes(&self, index: &IndexDescriptor) -> bool {
		matches_tree(&index.category_tree, self.tree) && matches_categories(&index.categories, self.categories)
	}
}

/// Path-prefix test of the index's category tree.
pub fn matches_tree(index_tree: &str, wanted: &str) -> bool {
	wanted.is_empty() || index_tree.starts_with(wanted)
}

/// True when any wanted tag is one of the index's tags.
pub fn matches_categories(index_categories: &[String], wanted: &[String]) -> bool {
	wanted.is_empty() || wanted.iter().any(|w| index_categories.iter().any(|c| c == w))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tree_is_a_prefix_test() {
		assert!(matches_tree("/docs/api", "/docs"));
		assert!(matches_tree("/docs/api", ""));
		assert!(!matches_tree("/docs/api", "/blog"));
		assert!(!matches_tree("", "/docs"));
	}

	#[test]
	fn categories_intersect() {
		let tags = vec!["rust".to_string(), "search".to_string()];
		assert!(matches_categories(&tags, &[]));
		assert!(matches_categories(&tags, &["search".to_string(), "go".to_string()]));
		assert!(!matches_categories(&tags, &["go".to_string()]));
		assert!(!matches_categories(&[], &["go".to_string()]));
	}
}
