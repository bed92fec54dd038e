//! 检查项目相似度索引 - 业务能力层
//!
//! 离线构建的向量索引（JSON，平铺存储），启动时加载一次，之后只读。
//! 查询时先用向量模型生成查询向量，再做精确的 L2 最近邻搜索。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clients::Embedder;
use crate::error::{AppResult, SimilarityError};

/// 索引中的一条记录（不含向量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymRecord {
    pub exame_principal: String,
    #[serde(default, alias = "similares")]
    pub sinonimos: Vec<String>,
}

/// 近邻查询能力
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// 返回最多 `k` 条最近的记录，按距离从近到远
    async fn neighbors(&self, exam: &str, k: usize) -> AppResult<Vec<SynonymRecord>>;
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(flatten)]
    record: SynonymRecord,
    embedding: Vec<f32>,
}

/// 平铺向量索引
#[derive(Debug)]
pub struct EmbeddingIndex {
    records: Vec<SynonymRecord>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl EmbeddingIndex {
    /// 由记录构建索引，所有向量维度必须一致
    pub fn new(entries: Vec<(SynonymRecord, Vec<f32>)>) -> AppResult<Self> {
        let dimension = entries.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut records = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());
        for (record, vector) in entries {
            if vector.len() != dimension {
                return Err(SimilarityError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                }
                .into());
            }
            records.push(record);
            vectors.push(vector);
        }
        Ok(Self {
            records,
            vectors,
            dimension,
        })
    }

    /// 从 JSON 文件加载：`[{exame_principal, sinonimos, embedding}]`
    pub async fn load(path: &Path) -> AppResult<Self> {
        let load_error = |message: String| SimilarityError::IndexLoad {
            path: path.display().to_string(),
            message,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_error(e.to_string()))?;
        let entries: Vec<IndexEntry> =
            serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;

        let index = Self::new(
            entries
                .into_iter()
                .map(|entry| (entry.record, entry.embedding))
                .collect(),
        )?;
        info!(
            "✓ 相似度索引加载成功: {} 条记录，维度 {}",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    /// 加载索引；文件不存在时返回 None（不使用同义词上下文）
    pub async fn load_optional(path: &Path) -> AppResult<Option<Self>> {
        if !path.exists() {
            warn!(
                "⚠️ 相似度索引不存在: {}，比对时不使用同义词上下文",
                path.display()
            );
            return Ok(None);
        }
        Self::load(path).await.map(Some)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 精确 L2 搜索
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<&SynonymRecord>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(SimilarityError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            }
            .into());
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (squared_l2(query, v), i))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, i)| &self.records[i])
            .collect())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// 向量模型 + 平铺索引
pub struct ExamSimilarityIndex {
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn Embedder>,
}

impl ExamSimilarityIndex {
    pub fn new(index: Arc<EmbeddingIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }
}

#[async_trait]
impl SimilarityIndex for ExamSimilarityIndex {
    async fn neighbors(&self, exam: &str, k: usize) -> AppResult<Vec<SynonymRecord>> {
        let query = self.embedder.embed(exam).await?;
        if query.is_empty() {
            return Err(SimilarityError::EmptyEmbedding(exam.to_string()).into());
        }
        let found = self.index.search(&query, k)?;
        debug!("'{}' 的近邻: {} 条", exam, found.len());
        Ok(found.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(name: &str, synonyms: &[&str]) -> SynonymRecord {
        SynonymRecord {
            exame_principal: name.to_string(),
            sinonimos: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn sample_index() -> EmbeddingIndex {
        EmbeddingIndex::new(vec![
            (record("HEMOGRAMA", &["HEMOGRAMA COMPLETO"]), vec![1.0, 0.0]),
            (record("GLICOSE", &["GLICEMIA"]), vec![0.0, 1.0]),
            (record("AUDIOMETRIA", &["AUDIOMETRIA TONAL"]), vec![-1.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let found = index.search(&[0.9, 0.2], 2).unwrap();
        let names: Vec<_> = found.iter().map(|r| r.exame_principal.as_str()).collect();
        assert_eq!(names, vec!["HEMOGRAMA", "GLICOSE"]);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = sample_index();
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = sample_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
        assert!(EmbeddingIndex::new(vec![
            (record("A", &[]), vec![1.0]),
            (record("B", &[]), vec![1.0, 2.0]),
        ])
        .is_err());
    }

    #[tokio::test]
    async fn test_load_json_index_with_legacy_field_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"[{"exame_principal": "GAMA GT", "similares": ["GGT"], "embedding": [0.5, 0.5]}]"#,
        )
        .unwrap();

        let index = EmbeddingIndex::load(&path).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.search(&[0.0, 0.0], 1).unwrap()[0].sinonimos, vec!["GGT"]);
    }

    #[tokio::test]
    async fn test_missing_index_file_disables_context() {
        let loaded = EmbeddingIndex::load_optional(Path::new("/no/such/index.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    struct TableEmbedder(HashMap<&'static str, Vec<f32>>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
            Ok(self.0.get(text).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_neighbors_through_embedder() {
        let embedder = TableEmbedder(HashMap::from([("GLICEMIA DE JEJUM", vec![0.1, 0.9])]));
        let similarity = ExamSimilarityIndex::new(Arc::new(sample_index()), Arc::new(embedder));

        let found = similarity.neighbors("GLICEMIA DE JEJUM", 1).await.unwrap();
        assert_eq!(found, vec![record("GLICOSE", &["GLICEMIA"])]);

        assert!(similarity.neighbors("DESCONHECIDO", 1).await.is_err());
    }
}
