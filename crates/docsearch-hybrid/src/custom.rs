//! Tabular input for the custom sub-index.
use docsearch_core::error::{Error, Result};
use docsearch_core::extract::summary_of;
use docsearch_core::types::{Document, CUSTOM_INDEX_ID};

/// Rows addressed by column name; names match case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomTable {
	columns: Vec<String>,
	rows: Vec<Vec<String>>,
}

impl CustomTable {
	pub fn new<I, S>(columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { columns: columns.into_iter().map(Into::into).collect(), rows: Vec::new() }
	}

	/// Appends a row, which must have one cell per column.
	pub fn push_row<I, S>(&mut self, row: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let row: Vec<String> = row.into_iter().map(Into::into).collect();
		if row.len() != self.columns.len() {
			return Err(Error::config(format!(
				"row has {} cells but the table has {} columns",
				row.len(),
				self.columns.len()
			)));
		}
		self.rows.push(row);
		Ok(())
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	fn column(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|c| c.eq_ignore_ascii_case(name.trim()))
	}

	fn required(&self, name: &str, role: &str) -> Result<usize> {
		self.column(name).ok_or_else(|| {
			Error::config(format!(
				"{role} column [{name}] does not exist, available columns are [{}]",
				self.columns.join(", ")
			))
		})
	}
}

/// Which columns feed which document fields.
///
/// `key` and `body` must name columns. The other fields take the named
/// column's cell when such a column exists and otherwise use the text itself
/// as a constant for every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
	pub key: String,
	pub body: Vec<String>,
	pub title: String,
	pub url: String,
	pub custom: [String; 4],
}

impl ColumnMapping {
	pub fn new(key: impl Into<String>, body: &[&str]) -> Self {
		Self { key: key.into(), body: body.iter().map(|b| (*b).to_string()).collect(), ..Self::default() }
	}

	#[must_use]
	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}

	#[must_use]
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = url.into();
		self
	}

	/// 1-based custom slot.
	#[must_use]
	pub fn custom(mut self, slot: usize, value: impl Into<String>) -> Self {
		if let Some(target) = slot.checked_sub(1).and_then(|i| self.custom.get_mut(i)) {
			*target = value.into();
		}
		self
	}
}

enum Cell {
	Column(usize),
	Constant(String),
}

impl Cell {
	fn resolve(table: &CustomTable, source: &str) -> Self {
		if source.trim().is_empty() {
			return Self::Constant(String::new());
		}
		match table.column(source) {
			Some(idx) => Self::Column(idx),
			None => Self::Constant(source.to_string()),
		}
	}

	fn value(&self, row: &[String]) -> String {
		match self {
			Self::Column(idx) => row.get(*idx).cloned().unwrap_or_default(),
			Self::Constant(text) => text.clone(),
		}
	}
}

/// Documents for every row with a non-empty key, in table order.
pub fn table_documents(table: &CustomTable, mapping: &ColumnMapping) -> Result<Vec<Document>> {
	let key = table.required(&mapping.key, "key")?;
	if mapping.body.is_empty() {
		return Err(Error::config("custom indexing needs at least one body column"));
	}
	let body = mapping.body.iter().map(|b| table.required(b, "body")).collect::<Result<Vec<_>>>()?;
	let title = Cell::resolve(table, &mapping.title);
	let url = Cell::resolve(table, &mapping.url);
	let custom = mapping.custom.each_ref().map(|c| Cell::resolve(table, c));

	let mut docs = Vec::with_capacity(table.len());
	for row in &table.rows {
		let doc_key = row[key].trim();
		if doc_key.is_empty() {
			continue;
		}
		let contents = body.iter().map(|&i| row[i].as_str()).filter(|c| !c.is_empty()).collect::<Vec<_>>().join(" ");
		docs.push(Document {
			key: doc_key.to_string(),
			title: title.value(row),
			url: url.value(row),
			summary: summary_of(&contents),
			size: contents.chars().count() as u64,
			mime_type: "text/plain".to_string(),
			custom: custom.each_ref().map(|c| c.value(row)),
			index_id: CUSTOM_INDEX_ID.to_string(),
			contents,
			..Document::default()
		});
	}
	Ok(docs)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn products() -> CustomTable {
		let mut table = CustomTable::new(["ID", "Name", "Description", "Link"]);
		table.push_row(["k1", "Lamp", "warm light", "/p/1"]).unwrap();
		table.push_row(["", "Ghost", "skipped", "/p/0"]).unwrap();
		table.push_row(["k2", "Desk", "", "/p/2"]).unwrap();
		table
	}

	#[test]
	fn rows_become_documents() {
		let mapping = ColumnMapping::new("id", &["name", "description"]).title("name").url("link").custom(2, "catalog");
		let docs = table_documents(&products(), &mapping).unwrap();
		assert_eq!(docs.len(), 2);
		assert_eq!(docs[0].key, "k1");
		assert_eq!(docs[0].contents, "Lamp warm light");
		assert_eq!(docs[0].title, "Lamp");
		assert_eq!(docs[0].url, "/p/1");
		assert_eq!(docs[0].custom[1], "catalog");
		assert_eq!(docs[0].index_id, CUSTOM_INDEX_ID);
		assert_eq!(docs[1].contents, "Desk");
	}

	#[test]
	fn key_and_body_must_be_columns() {
		assert!(matches!(
			table_documents(&products(), &ColumnMapping::new("sku", &["name"])),
			Err(Error::Configuration(_))
		));
		assert!(matches!(table_documents(&products(), &ColumnMapping::new("id", &["price"])), Err(Error::Configuration(_))));
		assert!(matches!(table_documents(&products(), &ColumnMapping::new("id", &[])), Err(Error::Configuration(_))));
	}

	#[test]
	fn ragged_rows_are_rejected() {
		let mut table = CustomTable::new(["a", "b"]);
		assert!(table.push_row(["only one"]).is_err());
		assert!(table.is_empty());
	}
}
