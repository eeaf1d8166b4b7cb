//! LanceDB-backed [`VectorIndexClient`].
//!
//! Expects a table with an `id` column (UInt64, Int64 or numeric Utf8) and a
//! fixed-size-list `vector` column; distances come from LanceDB's `_distance`.

use std::path::Path;

use arrow_array::{Array, Float32Array, Int64Array, StringArray, UInt64Array};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Table};

use groundrag_core::traits::{RawNeighbor, VectorIndexClient};
use groundrag_core::types::ChunkId;

pub struct LanceVectorClient {
    table: Table,
}

impl LanceVectorClient {
    pub async fn open(db_path: &Path, table_name: &str) -> anyhow::Result<Self> {
        let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
        let table = db.open_table(table_name).execute().await?;
        Ok(Self { table })
    }

    pub fn from_table(table: Table) -> Self { Self { table } }
}

fn chunk_id_at(col: &dyn Array, i: usize) -> anyhow::Result<ChunkId> {
    if let Some(a) = col.as_any().downcast_ref::<UInt64Array>() {
        return Ok(a.value(i));
    }
    if let Some(a) = col.as_any().downcast_ref::<Int64Array>() {
        return Ok(ChunkId::try_from(a.value(i))?);
    }
    if let Some(a) = col.as_any().downcast_ref::<StringArray>() {
        return Ok(a.value(i).parse::<ChunkId>()?);
    }
    anyhow::bail!("unsupported id column type {:?}", col.data_type())
}

#[async_trait]
impl VectorIndexClient for LanceVectorClient {
    async fn query(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<RawNeighbor>> {
        let mut stream = self.table.vector_search(vector.to_vec())?.limit(k).execute().await?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = batch.column_by_name("id").ok_or_else(|| anyhow::anyhow!("missing id column"))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("missing _distance column"))?;
            for i in 0..batch.num_rows() {
                out.push(RawNeighbor { chunk_id: chunk_id_at(ids.as_ref(), i)?, distance: distances.value(i) });
            }
        }
        Ok(out)
    }
}
