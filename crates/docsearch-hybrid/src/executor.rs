//! Hybrid search over the sub-indexes of one collection.
//!
//! Keyword hits are scored per sub-index with BM25, vector hits come from the
//! collection's vector table, and both are fused per `(index_id, key)` as
//! `(1 - r) * keyword + r * similarity`. The start/max window is cut only
//! after the hits of every sub-index are merged and ranked.
use std::collections::HashMap;
use std::path::Path;

use tantivy::DocAddress;
use tracing::{debug, warn};

use docsearch_core::error::{Error, Result};
use docsearch_core::traits::SpellCorrector;
use docsearch_core::types::{
	CollectionMeta, Context, Document, IndexDescriptor, ResultRow, SearchRequest, SearchResults,
	SuggestionEntry,
};
use docsearch_text::highlight::{Highlighter, KeywordHighlighter, QueryHighlighter};
use docsearch_text::passage::build_context;
use docsearch_text::query::{Expression, LiteralKind, QueryBuilder};
use docsearch_text::{normalize_language, DictionarySpellCorrector, SubIndexReader};
use docsearch_vector::VectorHit;

use crate::filter::CategoryFilter;
use crate::services::Services;
use crate::url::resolve_url;

/// A sub-index taking part in a search.
struct Searched<'a> {
	index: &'a IndexDescriptor,
	reader: SubIndexReader,
}

/// Keyword and vector contributions of one document.
#[derive(Debug, Default)]
struct Fused {
	keyword: Option<(f32, DocAddress)>,
	vector: Option<f32>,
	/// (sub-index position, rank) of the first sighting; breaks score ties.
	order: (usize, usize),
}

impl Fused {
	fn score(&self, weights: (f32, f32)) -> f32 {
		weights.0 * self.keyword.map_or(0.0, |(s, _)| s) + weights.1 * self.vector.unwrap_or(0.0)
	}
}

pub(crate) fn search(services: &Services, meta: &CollectionMeta, dir: &Path, request: &SearchRequest) -> Result<SearchResults> {
	let language = match request.language.as_deref() {
		Some(lang) if !lang.trim().is_empty() => normalize_language(lang)?,
		_ => meta.language.clone(),
	};
	services.text.analyzers().get(&language)?;

	let filter = CategoryFilter::new(&request.category_tree, &request.categories);
	let mut searched = Vec::new();
	let mut records_searched = 0;
	for index in meta.indexes.iter().filter(|i| filter.includes(i)) {
		let index_language = if index.language.is_empty() { &meta.language } else { &index.language };
		match services.text.open_reader(&dir.join(&index.id), index_language)? {
			Some(reader) => {
				records_searched += usize::try_from(reader.num_docs()).unwrap_or(usize::MAX);
				searched.push(Searched { index, reader });
			}
			None => debug!(index = %index.id, "sub-index has no readable data"),
		}
	}
	let mut results = SearchResults { records_searched, ..SearchResults::default() };

	let criteria = request.criteria.trim();
	if criteria == "*" {
		results.rows = match_all(&searched, request)?;
		return Ok(results);
	}
	let expr = services.parser.parse(criteria)?;
	if expr.is_match_none() || searched.is_empty() {
		return Ok(results);
	}

	let settings = meta.settings();
	let (mut keyword_weight, mut vector_weight) = settings.weights();
	let mut vector_hits = Vec::new();
	if vector_weight > 0.0 {
		let ids: Vec<String> = searched.iter().map(|s| s.index.id.clone()).collect();
		let limit = request.fetch_limit().unwrap_or(records_searched);
		match vector_leg(services, meta, dir, &language, criteria, &ids, limit) {
			Ok(hits) => vector_hits = hits,
			Err(e) => {
				warn!(collection = %meta.name, error = %e, "vector search unavailable, falling back to keyword search");
				(keyword_weight, vector_weight) = (1.0, 0.0);
			}
		}
	}
	let keyword_only = vector_weight <= 0.0;
	let vector_only = keyword_weight <= 0.0;

	let mut fused: HashMap<(usize, String), Fused> = HashMap::new();
	if !vector_only {
		for (pos, sub) in searched.iter().enumerate() {
			let limit = request.fetch_limit().unwrap_or_else(|| usize::try_from(sub.reader.num_docs()).unwrap_or(usize::MAX));
			let query = QueryBuilder::new(services.text.analyzers(), &language, sub.reader.fields().contents).build(&expr)?;
			for (rank, hit) in sub.reader.search(query.as_ref(), limit)?.into_iter().enumerate() {
				let key = sub.reader.document(hit.address)?.key;
				let entry = fused.entry((pos, key)).or_insert_with(|| Fused { order: (pos, rank), ..Fused::default() });
				entry.keyword = Some((hit.score, hit.address));
			}
		}
	}
	if !keyword_only {
		let positions: HashMap<&str, usize> = searched.iter().enumerate().map(|(p, s)| (s.index.id.as_str(), p)).collect();
		for (rank, hit) in vector_hits.into_iter().enumerate() {
			let Some(&pos) = positions.get(hit.index_id.as_str()) else { continue };
			let entry = fused.entry((pos, hit.key)).or_insert_with(|| Fused { order: (pos, rank), ..Fused::default() });
			entry.vector = Some(hit.score);
		}
	}

	let weights = (keyword_weight, vector_weight);
	let mut ranked: Vec<((usize, String), Fused)> = fused.into_iter().collect();
	ranked.sort_by(|(_, a), (_, b)| b.score(weights).total_cmp(&a.score(weights)).then(a.order.cmp(&b.order)));
	let total_hits = ranked.len();
	debug!(collection = %meta.name, criteria, hits = total_hits, mode = %settings.mode, "search ranked");

	let highlighter: Box<dyn Highlighter + '_> = if vector_only {
		Box::new(KeywordHighlighter::new(criteria))
	} else {
		Box::new(QueryHighlighter::new(services.text.analyzers(), &language, &expr)?)
	};

	for ((pos, key), hit) in window(ranked, request) {
		let sub = &searched[pos];
		let doc = match hit.keyword {
			Some((_, address)) => sub.reader.document(address)?,
			None => match sub.reader.find_by_key(&key)? {
				Some((_, doc)) => doc,
				None => {
					debug!(index = %sub.index.id, key, "vector hit without a stored document");
					continue;
				}
			},
		};
		let context = build_context(highlighter.as_ref(), &doc.contents, &request.context)?;
		results.rows.push(to_row(hit.score(weights), sub.index, doc, context));
	}

	if let Some(budget) = request.suggestions {
		if total_hits <= budget {
			suggest(services, &searched, &expr, &mut results);
		}
	}
	Ok(results)
}

fn vector_leg(
	services: &Services,
	meta: &CollectionMeta,
	dir: &Path,
	language: &str,
	criteria: &str,
	index_ids: &[String],
	limit: usize,
) -> Result<Vec<VectorHit>> {
	let Some(store) = services.existing_vector_store(dir)? else {
		return Err(Error::Embedding(format!("collection [{}] has no stored vectors", meta.name)));
	};
	let embedder = services.embedder(&meta.settings(), language)?;
	store.search(&embedder.generate(criteria), index_ids, limit)
}

/// Every document of every searched sub-index, in storage order.
fn match_all(searched: &[Searched<'_>], request: &SearchRequest) -> Result<Vec<ResultRow>> {
	let skip = request.start_row - 1;
	let take = request.max_rows.unwrap_or(usize::MAX);
	let mut rows = Vec::new();
	let mut seen = 0;
	for sub in searched {
		for doc in sub.reader.all_documents()? {
			seen += 1;
			if seen <= skip {
				continue;
			}
			if rows.len() >= take {
				return Ok(rows);
			}
			rows.push(to_row(1.0, sub.index, doc, Context::default()));
		}
	}
	Ok(rows)
}

fn window<T>(ranked: Vec<T>, request: &SearchRequest) -> impl Iterator<Item = T> {
	ranked.into_iter().skip(request.start_row - 1).take(request.max_rows.unwrap_or(usize::MAX))
}

fn to_row(score: f32, index: &IndexDescriptor, doc: Document, context: Context) -> ResultRow {
	let url = resolve_url(index, &doc);
	let title = if doc.title.is_empty() { index.title.clone() } else { doc.title };
	let custom: [String; 4] = std::array::from_fn(|i| {
		if doc.custom[i].is_empty() { index.custom(i + 1).to_string() } else { doc.custom[i].clone() }
	});
	ResultRow {
		score,
		key: doc.key,
		title,
		url,
		summary: doc.summary,
		custom,
		size: doc.size,
		mime_type: doc.mime_type,
		author: doc.author,
		index_id: index.id.clone(),
		source_type: index.source_type,
		category_tree: index.category_tree.clone(),
		categories: index.categories.clone(),
		context,
	}
}

/// Alternative spellings for the plain terms of `expr`, drawn from the term
/// dictionaries of the searched sub-indexes.
fn suggest(services: &Services, searched: &[Searched<'_>], expr: &Expression, results: &mut SearchResults) {
	let max = services.settings.spell_suggestions;
	if max == 0 {
		return;
	}
	let correctors: Vec<DictionarySpellCorrector> = searched
		.iter()
		.filter_map(|s| match s.reader.term_dictionary() {
			Ok(terms) => Some(DictionarySpellCorrector::new(terms)),
			Err(e) => {
				warn!(index = %s.index.id, error = %e, "term dictionary unavailable for suggestions");
				None
			}
		})
		.collect();

	let mut corrected = expr.clone();
	let mut changed = false;
	for literal in corrected.literals_mut() {
		if literal.kind() != LiteralKind::Term {
			continue;
		}
		let term = literal.text().to_lowercase();
		if correctors.iter().any(|c| c.exists(&term)) {
			continue;
		}
		let mut alternatives: Vec<String> = Vec::new();
		for corrector in &correctors {
			for alt in corrector.suggest(&term, max) {
				if !alternatives.contains(&alt) && alternatives.len() < max {
					alternatives.push(alt);
				}
			}
		}
		let Some(best) = alternatives.first() else { continue };
		literal.set(best.clone());
		changed = true;
		#[allow(clippy::cast_precision_loss)]
		let scores = (0..alternatives.len()).map(|rank| 99.0 - rank as f64).collect();
		results.suggestions.push(SuggestionEntry { term, alternatives, scores });
	}
	if changed {
		results.suggested_query = Some(corrected.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fusion_weights_both_legs() {
		let both = Fused { keyword: Some((2.0, DocAddress::new(0, 0))), vector: Some(0.5), order: (0, 0) };
		assert!((both.score((0.7, 0.3)) - (0.7 * 2.0 + 0.3 * 0.5)).abs() < 1e-6);
		let vector_only = Fused { vector: Some(0.8), ..Fused::default() };
		assert!((vector_only.score((1.0, 0.0))).abs() < 1e-6);
		assert!((vector_only.score((0.0, 1.0)) - 0.8).abs() < 1e-6);
	}

	#[test]
	fn window_is_one_based() {
		let request = SearchRequest::new("x").window(3, 2);
		let cut: Vec<u32> = window((1..=10).collect(), &request).collect();
		assert_eq!(cut, vec![3, 4]);
		let all = SearchRequest::new("x").window(1, -1);
		assert_eq!(window((1..=4).collect::<Vec<u32>>(), &all).count(), 4);
	}

	#[test]
	fn empty_fields_fall_back_to_the_index() {
		let source = docsearch_core::types::Source::Custom { query: "products".into() };
		let options = docsearch_core::types::IndexOptions {
			title: "Products".into(),
			custom: ["", "shop", "", ""].map(String::from),
			category_tree: "/shop".into(),
			..Default::default()
		};
		let index = IndexDescriptor::new(&source, "english", &options);
		let doc = Document { key: "k1".into(), custom: ["c1", "", "", ""].map(String::from), ..Document::default() };
		let row = to_row(1.0, &index, doc, Context::default());
		assert_eq!(row.title, "Products");
		assert_eq!(row.custom, ["c1", "shop", "", ""].map(String::from));
		assert_eq!(row.category_tree, "/shop");
	}
}
