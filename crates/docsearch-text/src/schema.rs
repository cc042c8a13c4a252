use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::TantivyDocument;

use docsearch_core::error::{Error, Result};
use docsearch_core::types::Document;

use crate::analyzer::tokenizer_name;

pub const CONTENTS: &str = "contents";

/// Schema for a sub-index; analyzed fields use the collection language's tokenizer.
pub fn build_schema(language: &str) -> Schema {
    let tokenizer = tokenizer_name(language);
    let mut builder = Schema::builder();
    let positions = TextFieldIndexing::default()
        .set_tokenizer(&tokenizer)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let analyzed = TextOptions::default().set_indexing_options(positions).set_stored();

    builder.add_text_field(CONTENTS, analyzed.clone());
    builder.add_text_field("title", analyzed.clone());
    builder.add_text_field("keywords", analyzed);
    builder.add_text_field("key", STRING | STORED);
    builder.add_text_field("index_id", STRING | STORED);
    builder.add_text_field("url", STORED);
    builder.add_text_field("summary", STORED);
    builder.add_text_field("author", STORED);
    builder.add_text_field("mime_type", STORED);
    for slot in 1..=4 {
        builder.add_text_field(&format!("custom{slot}"), STORED);
    }
    builder.add_u64_field("size", STORED);
    builder.build()
}

/// Resolved field handles of a sub-index schema.
#[derive(Debug, Clone, Copy)]
pub struct DocFields {
    pub contents: Field,
    pub title: Field,
    pub keywords: Field,
    pub key: Field,
    pub index_id: Field,
    pub url: Field,
    pub summary: Field,
    pub author: Field,
    pub mime_type: Field,
    pub custom: [Field; 4],
    pub size: Field,
}

impl DocFields {
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let get = |name: &str| {
            schema.get_field(name).map_err(|_| Error::CorruptIndex(format!("schema has no field [{name}]")))
        };
        Ok(Self {
            contents: get(CONTENTS)?,
            title: get("title")?,
            keywords: get("keywords")?,
            key: get("key")?,
            index_id: get("index_id")?,
            url: get("url")?,
            summary: get("summary")?,
            author: get("author")?,
            mime_type: get("mime_type")?,
            custom: [get("custom1")?, get("custom2")?, get("custom3")?, get("custom4")?],
            size: get("size")?,
        })
    }

    pub fn to_tantivy(&self, doc: &Document) -> TantivyDocument {
        let mut out = TantivyDocument::default();
        let mut text = |field: Field, value: &str| {
            if !value.is_empty() {
                out.add_text(field, value);
            }
        };
        text(self.contents, &doc.contents);
        text(self.title, &doc.title);
        text(self.keywords, &doc.keywords);
        text(self.key, &doc.key);
        text(self.index_id, &doc.index_id);
        text(self.url, &doc.url);
        text(self.summary, &doc.summary);
        text(self.author, &doc.author);
        text(self.mime_type, &doc.mime_type);
        for (field, value) in self.custom.iter().zip(doc.custom.iter()) {
            text(*field, value);
        }
        out.add_u64(self.size, doc.size);
        out
    }

    pub fn from_tantivy(&self, doc: &TantivyDocument) -> Document {
        let text = |field: Field| {
            doc.get_first(field).and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default()
        };
        Document {
            key: text(self.key),
            title: text(self.title),
            url: text(self.url),
            summary: text(self.summary),
            contents: text(self.contents),
            keywords: text(self.keywords),
            author: text(self.author),
            mime_type: text(self.mime_type),
            custom: self.custom.map(&text),
            size: doc.get_first(self.size).and_then(|v| v.as_u64()).unwrap_or(0),
            index_id: text(self.index_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_round_trips_through_stored_fields() {
        let schema = build_schema("english");
        let fields = DocFields::from_schema(&schema).unwrap();
        let doc = Document {
            key: "k1".into(),
            title: "Title".into(),
            contents: "body text".into(),
            custom: ["a".into(), String::new(), "c".into(), String::new()],
            size: 9,
            index_id: "custom".into(),
            ..Document::default()
        };
        let back = fields.from_tantivy(&fields.to_tantivy(&doc));
        assert_eq!(back, doc);
    }
}
