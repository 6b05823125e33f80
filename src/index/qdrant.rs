//! Qdrant adapter for the vector index boundary.
//!
//! One collection with cosine distance; the point payload carries the whole
//! serialized chunk so queries resolve against the live store. Chunk ids are
//! arbitrary strings, so each maps to a stable numeric point id via hashing
//! and the real id rides along in the payload.

use crate::errors::{RagError, Result};
use crate::index::VectorIndex;
use crate::types::{Chunk, EmbeddedChunk};
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        vectors_config::Config, with_payload_selector::SelectorOptions, CreateCollection, Distance,
        PointId, PointStruct, PointsIdsList, PointsSelector, SearchPoints, Value as QdrantValue,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Vector index backed by a running Qdrant instance.
pub struct QdrantIndex {
    client: QdrantClient,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    /// Connect and ensure the collection exists with cosine distance.
    pub async fn connect(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| RagError::RetrievalFailure(format!("Qdrant connect failed: {}", e)))?;

        let index = Self {
            client,
            collection: collection.to_string(),
            dimension,
        };
        index.init_collection().await?;
        Ok(index)
    }

    async fn init_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| RagError::RetrievalFailure(format!("List collections failed: {}", e)))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.collection.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: self.dimension as u64,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    RagError::RetrievalFailure(format!(
                        "Failed to create collection {}: {}",
                        self.collection, e
                    ))
                })?;
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        if chunk.dimension != self.dimension {
            return Err(RagError::Embedding(format!(
                "Dimension mismatch: collection holds {}-d vectors, got {}-d",
                self.dimension, chunk.dimension
            )));
        }

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert(
            "chunk".to_string(),
            QdrantValue::from(serde_json::to_string(&chunk.chunk)?),
        );
        payload.insert(
            "chunk_id".to_string(),
            QdrantValue::from(chunk.chunk.id.clone()),
        );

        let point = PointStruct::new(point_id(&chunk.chunk.id), chunk.vector.clone(), payload);

        self.client
            .upsert_points_blocking(&self.collection, None, vec![point], None)
            .await
            .map_err(|e| RagError::RetrievalFailure(format!("Failed to upsert point: {}", e)))?;

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: vector.to_vec(),
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::RetrievalFailure(format!("Failed to search points: {}", e)))?;

        let mut results = Vec::with_capacity(search_result.result.len());
        for point in search_result.result {
            let raw = point
                .payload
                .get("chunk")
                .and_then(|v| qdrant_value_to_string(v))
                .ok_or_else(|| {
                    RagError::RetrievalFailure("Point payload missing chunk".to_string())
                })?;
            let chunk: Chunk = serde_json::from_str(&raw)?;
            results.push((chunk, point.score));
        }

        Ok(results)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_points(
                &self.collection,
                None,
                &PointsSelector {
                    points_selector_one_of: Some(
                        qdrant_client::qdrant::points_selector::PointsSelectorOneOf::Points(
                            PointsIdsList {
                                ids: vec![PointId::from(point_id(id))],
                            },
                        ),
                    ),
                },
                None,
            )
            .await
            .map_err(|e| RagError::RetrievalFailure(format!("Failed to delete point: {}", e)))?;

        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| RagError::RetrievalFailure(format!("Collection info failed: {}", e)))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0) as usize)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(Some(self.dimension))
    }
}

/// Stable numeric point id for an arbitrary chunk id string. Collisions are
/// tolerable: the payload carries the authoritative chunk id.
fn point_id(chunk_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    chunk_id.hash(&mut hasher);
    hasher.finish()
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    value.kind.as_ref().and_then(|kind| {
        use qdrant_client::qdrant::value::Kind;
        match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    })
}
