use std::collections::BTreeSet;

use tantivy::collector::TopDocs;
use tantivy::query::{Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocAddress, Index, IndexReader, Searcher, TantivyDocument, Term};

use docsearch_core::error::{Result, ResultExt};
use docsearch_core::types::Document;

use crate::schema::DocFields;

/// Scored hit inside one sub-index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextHit {
	pub score: f32,
	pub address: DocAddress,
}

/// Point-in-time view of one sub-index.
pub struct SubIndexReader {
	index: Index,
	searcher: Searcher,
	fields: DocFields,
	language: String,
}

impl SubIndexReader {
	pub(crate) fn new(index: Index, reader: &IndexReader, language: &str) -> Result<Self> {
		let fields = DocFields::from_schema(&index.schema())?;
		Ok(Self { index, searcher: reader.searcher(), fields, language: language.to_string() })
	}

	pub fn fields(&self) -> &DocFields { &self.fields }

	pub fn language(&self) -> &str { &self.language }

	pub fn index(&self) -> &Index { &self.index }

	pub fn num_docs(&self) -> u64 { self.searcher.num_docs() }

	/// Top `limit` hits by BM25.
	pub fn search(&self, query: &dyn Query, limit: usize) -> Result<Vec<TextHit>> {
		if limit == 0 || self.num_docs() == 0 {
			return Ok(Vec::new());
		}
		let top = self.searcher.search(query, &TopDocs::with_limit(limit)).storage_context(|| "running keyword search")?;
		Ok(top.into_iter().map(|(score, address)| TextHit { score, address }).collect())
	}

	pub fn document(&self, address: DocAddress) -> Result<Document> {
		let doc: TantivyDocument = self.searcher.doc(address).storage_context(|| "reading stored document")?;
		Ok(self.fields.from_tantivy(&doc))
	}

	/// Live documents in storage order.
	pub fn all_documents(&self) -> Result<Vec<Document>> {
		let mut docs = Vec::with_capacity(usize::try_from(self.num_docs()).unwrap_or(0));
		for (ord, segment) in self.searcher.segment_readers().iter().enumerate() {
			let segment_ord = u32::try_from(ord).unwrap_or(u32::MAX);
			for doc_id in segment.doc_ids_alive() {
				docs.push(self.document(DocAddress::new(segment_ord, doc_id))?);
			}
		}
		Ok(docs)
	}

	pub fn find_by_key(&self, key: &str) -> Result<Option<(DocAddress, Document)>> {
		let query = TermQuery::new(Term::from_field_text(self.fields.key, key), IndexRecordOption::Basic);
		let top = self.searcher.search(&query, &TopDocs::with_limit(1)).storage_context(|| "looking up document key")?;
		match top.first() {
			Some((_, address)) => Ok(Some((*address, self.document(*address)?))),
			None => Ok(None),
		}
	}

	/// Terms of the contents field across all segments, sorted and deduplicated.
	pub fn term_dictionary(&self) -> Result<Vec<String>> {
		let mut terms = BTreeSet::new();
		for segment in self.searcher.segment_readers() {
			let inverted = segment.inverted_index(self.fields.contents).storage_context(|| "opening term dictionary")?;
			let mut stream = inverted.terms().stream().storage_context(|| "streaming terms")?;
			while stream.advance() {
				if let Ok(term) = std::str::from_utf8(stream.key()) {
					terms.insert(term.to_string());
				}
			}
		}
		Ok(terms.into_iter().collect())
	}

	pub fn contains_term(&self, term: &str) -> bool {
		self.searcher.doc_freq(&Term::from_field_text(self.fields.contents, term)).is_ok_and(|n| n > 0)
	}
}
