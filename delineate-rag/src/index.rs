//! Vector indexes over chunk embeddings.
//!
//! Two implementations share the [`VectorIndex`] contract, both ranking by
//! squared Euclidean distance (smaller is closer):
//!
//! - [`FlatIndex`] — exact brute-force search, the default
//! - [`IvfIndex`] — inverted-file search over k-means clusters, scanning only
//!   the `nprobe` clusters nearest to the query
//!
//! [`DocumentIndex`] pairs an index with the chunk list it was built from,
//! row `i` of the index being chunk `i`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::document::{Chunk, RetrievedChunk};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};

/// A search hit: a row position and its distance from the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Row position in the index (equal to the chunk position).
    pub position: usize,
    /// Squared Euclidean distance from the query.
    pub distance: f32,
}

/// Which search structure backs an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact brute-force search.
    Flat,
    /// Clustered approximate search.
    Ivf {
        /// Number of trained clusters.
        nlist: usize,
        /// Number of clusters scanned per query.
        nprobe: usize,
    },
}

/// Size and shape of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of stored vectors.
    pub vector_count: usize,
    /// Dimensionality of every stored vector.
    pub dimension: usize,
    /// The search structure in use.
    pub kind: IndexKind,
}

/// A read-only similarity index over fixed-dimension vectors.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Return up to `top_k` nearest rows by ascending distance.
    ///
    /// Returns every row when `top_k` exceeds the index size.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the query has the wrong dimension.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Whether the index holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the stored vectors.
    fn dimension(&self) -> usize;

    /// The search structure in use.
    fn kind(&self) -> IndexKind;

    /// Size and shape of the index.
    fn stats(&self) -> IndexStats {
        IndexStats { vector_count: self.len(), dimension: self.dimension(), kind: self.kind() }
    }
}

/// Squared Euclidean distance between two vectors of equal length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Sort hits by ascending distance, ties by row position, and keep `top_k`.
fn rank(mut hits: Vec<Neighbor>, top_k: usize) -> Vec<Neighbor> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.position.cmp(&b.position)));
    hits.truncate(top_k);
    hits
}

/// Contiguous row-major storage of equal-length vectors.
#[derive(Debug, Clone, Default)]
struct Rows {
    dimension: usize,
    data: Vec<f32>,
}

impl Rows {
    fn from_vectors(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }
        Ok(Self { dimension, data })
    }

    fn len(&self) -> usize {
        if self.dimension == 0 { 0 } else { self.data.len() / self.dimension }
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        Ok(())
    }
}

/// Exact nearest-neighbour search by scanning every row.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    rows: Rows,
}

impl FlatIndex {
    /// Build an index over `vectors`, all of which must have `dimension` entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has another length.
    pub fn new(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        Ok(Self { rows: Rows::from_vectors(dimension, vectors)? })
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        self.rows.check_query(query)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let hits = (0..self.rows.len())
            .map(|position| Neighbor {
                position,
                distance: squared_l2(self.rows.row(position), query),
            })
            .collect();
        Ok(rank(hits, top_k))
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn dimension(&self) -> usize {
        self.rows.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }
}

/// Approximate search over an inverted file of k-means clusters.
///
/// Training runs Lloyd's algorithm from a deterministic farthest-point
/// seeding, so the same vectors always produce the same clusters. Queries
/// scan only the rows assigned to the `nprobe` nearest centroids; with
/// `nprobe >= nlist` results match [`FlatIndex`] exactly.
#[derive(Debug, Clone)]
pub struct IvfIndex {
    rows: Rows,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<usize>>,
    nprobe: usize,
}

impl IvfIndex {
    /// Train clusters over `vectors` and assign every row to one.
    ///
    /// `nlist` is clamped to the number of vectors; `nprobe` to `nlist`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has another
    /// length, or [`RagError::ConfigError`] if `nlist` or `nprobe` is zero.
    pub fn train(
        dimension: usize,
        vectors: &[Vec<f32>],
        nlist: usize,
        nprobe: usize,
        max_iterations: usize,
    ) -> Result<Self> {
        if nlist == 0 || nprobe == 0 {
            return Err(RagError::ConfigError("nlist and nprobe must be non-zero".to_string()));
        }
        let rows = Rows::from_vectors(dimension, vectors)?;
        let n = rows.len();
        let nlist = nlist.min(n.max(1));

        let mut centroids = seed_centroids(&rows, nlist);
        let mut assignments = vec![usize::MAX; n];
        let mut iterations = 0;

        loop {
            iterations += 1;
            let mut changed = false;
            for (position, assignment) in assignments.iter_mut().enumerate() {
                let nearest = nearest_centroid(&centroids, rows.row(position));
                if nearest != *assignment {
                    *assignment = nearest;
                    changed = true;
                }
            }
            if !changed || iterations >= max_iterations.max(1) {
                break;
            }
            recompute_centroids(&rows, &assignments, &mut centroids);
        }

        let mut lists = vec![Vec::new(); centroids.len()];
        for (position, &cluster) in assignments.iter().enumerate() {
            lists[cluster].push(position);
        }

        debug!(vector_count = n, nlist = centroids.len(), iterations, "trained clustered index");
        let nprobe = nprobe.min(centroids.len().max(1));
        Ok(Self { rows, centroids, lists, nprobe })
    }
}

impl VectorIndex for IvfIndex {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        self.rows.check_query(query)?;
        if top_k == 0 || self.centroids.is_empty() {
            return Ok(Vec::new());
        }

        let mut probes: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(cluster, centroid)| (cluster, squared_l2(centroid, query)))
            .collect();
        probes.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let hits = probes
            .iter()
            .take(self.nprobe)
            .flat_map(|&(cluster, _)| self.lists[cluster].iter().copied())
            .map(|position| Neighbor {
                position,
                distance: squared_l2(self.rows.row(position), query),
            })
            .collect();
        Ok(rank(hits, top_k))
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn dimension(&self) -> usize {
        self.rows.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Ivf { nlist: self.centroids.len(), nprobe: self.nprobe }
    }
}

/// Deterministic farthest-point seeding: the first row, then repeatedly the
/// row farthest from every centroid chosen so far.
fn seed_centroids(rows: &Rows, k: usize) -> Vec<Vec<f32>> {
    let n = rows.len();
    if n == 0 || k == 0 {
        return Vec::new();
    }

    let mut centroids = vec![rows.row(0).to_vec()];
    let mut min_dist: Vec<f32> = (0..n).map(|i| squared_l2(rows.row(i), rows.row(0))).collect();

    while centroids.len() < k {
        let (best, best_dist) = min_dist
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &d)| if d > acc.1 { (i, d) } else { acc });
        if best_dist <= 0.0 {
            // Remaining rows duplicate existing centroids.
            break;
        }
        let centroid = rows.row(best).to_vec();
        for (i, dist) in min_dist.iter_mut().enumerate() {
            *dist = dist.min(squared_l2(rows.row(i), &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_l2(centroid, vector);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Move each centroid to the mean of its members; empty clusters keep their centroid.
fn recompute_centroids(rows: &Rows, assignments: &[usize], centroids: &mut [Vec<f32>]) {
    let mut sums = vec![vec![0.0f32; rows.dimension]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (position, &cluster) in assignments.iter().enumerate() {
        counts[cluster] += 1;
        for (sum, value) in sums[cluster].iter_mut().zip(rows.row(position)) {
            *sum += value;
        }
    }

    for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
        if count > 0 {
            *centroid = sum.into_iter().map(|v| v / count as f32).collect();
        }
    }
}

/// A built, read-only index over one document's chunks.
///
/// Row `i` of the vector index corresponds to chunk `i`. A `DocumentIndex`
/// is never mutated after construction; a new document gets a new index.
#[derive(Debug)]
pub struct DocumentIndex {
    index: Box<dyn VectorIndex>,
    chunks: Vec<Chunk>,
}

impl DocumentIndex {
    /// Embed every chunk and build the index selected by `config`.
    ///
    /// Uses [`IvfIndex`] when `config.ivf_threshold` is set and the chunk
    /// count reaches it, [`FlatIndex`] otherwise.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyChunkSet`] if `chunks` is empty
    /// - [`RagError::EmbeddingFailure`] if the provider fails or returns
    ///   the wrong number of vectors or inconsistent dimensions
    #[instrument(name = "build_index", skip_all, fields(chunk_count = chunks.len()))]
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        config: &EngineConfig,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyChunkSet);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await.map_err(|e| {
            warn!(provider = embedder.name(), error = %e, "embedding failed during index build");
            match e {
                RagError::EmbeddingFailure { .. } => e,
                other => RagError::EmbeddingFailure {
                    provider: embedder.name().to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let kind = match config.ivf_threshold {
            Some(threshold) if chunks.len() >= threshold => {
                IndexKind::Ivf { nlist: config.ivf_nlist, nprobe: config.ivf_nprobe }
            }
            _ => IndexKind::Flat,
        };
        let index =
            Self::from_embeddings(chunks, &embeddings, kind, config.ivf_max_iterations, embedder)?;
        let stats = index.stats();
        info!(
            vector_count = stats.vector_count,
            dimension = stats.dimension,
            kind = ?stats.kind,
            "built document index"
        );
        Ok(index)
    }

    /// Build from precomputed embeddings, one per chunk in chunk order.
    fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: &[Vec<f32>],
        kind: IndexKind,
        max_iterations: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let dimension = check_batch(embedder, embeddings, chunks.len())?;
        let index: Box<dyn VectorIndex> = match kind {
            IndexKind::Flat => Box::new(FlatIndex::new(dimension, embeddings)?),
            IndexKind::Ivf { nlist, nprobe } => {
                Box::new(IvfIndex::train(dimension, embeddings, nlist, nprobe, max_iterations)?)
            }
        };
        Ok(Self { index, chunks })
    }

    /// Pair an already-built vector index with its chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyChunkSet`] if `chunks` is empty, or
    /// [`RagError::ConfigError`] if the index size differs from the chunk count.
    pub fn from_parts(index: Box<dyn VectorIndex>, chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyChunkSet);
        }
        if index.len() != chunks.len() {
            return Err(RagError::ConfigError(format!(
                "index holds {} vectors but {} chunks were supplied",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self { index, chunks })
    }

    /// The chunks in index row order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Size and shape of the vector index.
    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Find the `top_k` chunks nearest to `query`, as query-scoped copies
    /// carrying their distance.
    ///
    /// Hits whose position falls outside the chunk list are dropped.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let neighbors = self.index.search(query, top_k)?;
        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                let chunk = self.chunks.get(n.position)?;
                Some(RetrievedChunk::with_distance(chunk.clone(), n.distance))
            })
            .collect())
    }
}
