//! LanceDB-backed vector index for long-term memory recall

use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lance_arrow::FixedSizeListArrayExt;
use lancedb::connect;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::memory::MemoryEntry;

const TABLE_NAME: &str = "memories";

/// One nearest-neighbor hit.
///
/// `text` is `None` when the stored payload is missing or unreadable;
/// callers drop such hits rather than erroring.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    /// The stored text, if readable
    pub text: Option<String>,

    /// Similarity to the query, higher is more similar
    pub score: f32,
}

/// Nearest-neighbor store partitioned by namespace
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Persist an entry under its namespace
    async fn upsert(&self, entry: &MemoryEntry) -> Result<()>;

    /// Up to `top_k` nearest neighbors in `namespace`, most similar first.
    /// A namespace that has never been written to yields an empty list.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<MemoryHit>>;
}

/// Vector index backed by LanceDB
pub struct LanceDbIndex {
    db: lancedb::Connection,
    dimension: usize,
}

impl LanceDbIndex {
    /// Create a new index
    pub async fn new(config: &Config) -> Result<Self> {
        let db = connect(&config.vector_db_path().to_string_lossy())
            .execute()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let index = Self {
            db,
            dimension: config.embedding_dim,
        };

        // Ensure table exists
        index.ensure_table().await?;

        Ok(index)
    }

    /// Get the schema for the memories table
    fn schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, true),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
        ])
    }

    /// Ensure the memories table exists
    async fn ensure_table(&self) -> Result<()> {
        let tables = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        if !tables.contains(&TABLE_NAME.to_string()) {
            // Create empty table with schema
            let schema = Arc::new(self.schema());

            let empty_batch = RecordBatch::new_empty(schema.clone());
            let batches = vec![empty_batch];
            let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

            self.db
                .create_table(TABLE_NAME, Box::new(reader))
                .execute()
                .await
                .map_err(|e| Error::store(e.to_string()))?;
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for LanceDbIndex {
    async fn upsert(&self, entry: &MemoryEntry) -> Result<()> {
        if entry.vector.len() != self.dimension {
            return Err(Error::store(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                entry.vector.len()
            )));
        }

        // Build arrays for the record batch
        let id_array = StringArray::from(vec![entry.id.to_string()]);
        let namespace_array = StringArray::from(vec![entry.namespace()]);
        let text_array = StringArray::from(vec![entry.text.clone()]);

        let values = Float32Array::from(entry.vector.clone());
        let vector_array = FixedSizeListArray::try_new_from_values(values, self.dimension as i32)
            .map_err(|e: arrow_schema::ArrowError| Error::store(e.to_string()))?;

        let schema = Arc::new(self.schema());
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(id_array) as Arc<dyn Array>,
                Arc::new(namespace_array),
                Arc::new(text_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| Error::store(e.to_string()))?;

        let batches = vec![batch];
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        table
            .add(Box::new(reader))
            .execute()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<MemoryHit>> {
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        // Namespaces come from caller-supplied subject names, so the filter
        // value needs quoting
        let filter = format!("namespace = '{}'", namespace.replace('\'', "''"));

        let stream = table
            .vector_search(vector.to_vec())
            .map_err(|e| Error::store(e.to_string()))?
            .distance_type(DistanceType::Cosine)
            .only_if(filter)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        let mut hits = Vec::new();

        for batch in batches {
            let text_col: &Arc<dyn Array> = batch
                .column_by_name("text")
                .ok_or_else(|| Error::store("Missing text column"))?;
            let distance_col: &Arc<dyn Array> = batch
                .column_by_name("_distance")
                .ok_or_else(|| Error::store("Missing _distance column"))?;

            let texts = text_col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::store("text column is not StringArray"))?;
            let distances = distance_col
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| Error::store("_distance column is not Float32Array"))?;

            for i in 0..batch.num_rows() {
                let text = if texts.is_null(i) {
                    None
                } else {
                    Some(texts.value(i).to_string())
                };

                // Cosine distance from LanceDB, converted to a similarity score
                let score = 1.0 - distances.value(i);

                hits.push(MemoryHit { text, score });
            }
        }

        Ok(hits)
    }
}
