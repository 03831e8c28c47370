//! Finding the dataset row a source record was migrated to
//!
//! The stored `cmg_id` back-reference is an exact lookup. Rows without one
//! are found by similarity: every row whose name is the record's name or a
//! duplicate of it is scored by how many of twelve attributes agree with the
//! row the record would have produced. A unique best score wins; a tie is
//! reported as ambiguous rather than broken arbitrarily.

use super::naming::{is_synthesized_name, names_correspond};
use super::{target_row, RowOptions};
use crate::config::{Config, MatchStrategy};
use crate::error::{Error, Result};
use crate::source::SourceDataset;
use crate::target::{
    find_candidate_datasets, find_dataset_by_cmg_id, DatasetType, NewDataset, TargetDataset,
};
use chrono::Utc;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::debug;

/// Number of attributes compared by [`similarity_score`]
pub const SIMILARITY_PREDICATES: u8 = 12;

/// Result of looking up a source record's target row
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Found(TargetDataset),
    NotFound,
    /// Several candidates share the best score
    Ambiguous { candidates: usize, score: u8 },
}

impl MatchOutcome {
    pub fn into_result(self, source_id: &str) -> Result<TargetDataset> {
        match self {
            MatchOutcome::Found(dataset) => Ok(dataset),
            MatchOutcome::NotFound => Err(Error::DatasetNotFound(source_id.to_string())),
            MatchOutcome::Ambiguous { candidates, score } => Err(Error::AmbiguousMatch {
                source_id: source_id.to_string(),
                candidates,
                score,
            }),
        }
    }
}

/// Count the attributes on which `candidate` agrees with `expected`.
///
/// `source_name` is the record's own name; `None` for nameless records,
/// whose rows carry a synthesized `UNKNOWN` name.
pub fn similarity_score(
    expected: &NewDataset,
    source_name: Option<&str>,
    candidate: &TargetDataset,
) -> u8 {
    let name_matches = match source_name {
        Some(name) => names_correspond(&candidate.name, name),
        None => is_synthesized_name(&candidate.name),
    };

    let predicates = [
        name_matches,
        candidate.is_deleted == expected.is_deleted,
        candidate.description == expected.description,
        candidate.num_directories == Some(expected.num_directories),
        candidate.num_files == Some(expected.num_files),
        candidate.du_size == Some(expected.du_size),
        candidate.size == Some(expected.size),
        candidate.created_at == expected.created_at,
        candidate.updated_at == expected.updated_at,
        candidate.origin_path == expected.origin_path,
        candidate.archive_path == expected.archive_path,
        candidate.is_staged == expected.is_staged,
    ];

    predicates.iter().filter(|&&matched| matched).count() as u8
}

/// Pick the single best-scoring candidate
pub fn pick_best(
    expected: &NewDataset,
    source_name: Option<&str>,
    candidates: Vec<TargetDataset>,
) -> MatchOutcome {
    let scored: Vec<(u8, TargetDataset)> = candidates
        .into_iter()
        .map(|c| (similarity_score(expected, source_name, &c), c))
        .collect();

    let Some(best) = scored.iter().map(|(score, _)| *score).max() else {
        return MatchOutcome::NotFound;
    };

    let mut top: Vec<TargetDataset> = scored
        .into_iter()
        .filter(|(score, _)| *score == best)
        .map(|(_, c)| c)
        .collect();

    match top.len() {
        1 => MatchOutcome::Found(top.remove(0)),
        n => MatchOutcome::Ambiguous {
            candidates: n,
            score: best,
        },
    }
}

/// Exact lookup through the stored back-reference
pub async fn find_by_back_reference(
    conn: &mut SqliteConnection,
    source_id: &str,
) -> Result<MatchOutcome> {
    Ok(match find_dataset_by_cmg_id(conn, source_id).await? {
        Some(dataset) => MatchOutcome::Found(dataset),
        None => MatchOutcome::NotFound,
    })
}

/// Similarity lookup among rows of the same type and deletion status.
///
/// With `unreferenced_only` rows that already carry a back-reference are
/// not considered.
pub async fn find_by_similarity(
    conn: &mut SqliteConnection,
    source: &SourceDataset,
    dataset_type: DatasetType,
    options: RowOptions,
    unreferenced_only: bool,
) -> Result<MatchOutcome> {
    let source_name = source.name.as_deref();
    let expected = target_row(
        source,
        dataset_type,
        source_name.unwrap_or_default().to_string(),
        false,
        Utc::now(),
        options,
    );

    let mut candidates = find_candidate_datasets(
        conn,
        source_name,
        dataset_type,
        expected.is_deleted,
        unreferenced_only,
    )
    .await?;

    candidates.retain(|c| match source_name {
        Some(name) => names_correspond(&c.name, name),
        None => is_synthesized_name(&c.name),
    });

    debug!(
        "{} similarity candidates for {} '{}'",
        candidates.len(),
        dataset_type,
        source.display_name()
    );

    Ok(pick_best(&expected, source_name, candidates))
}

/// Resolves source records to target rows with the configured strategy
#[derive(Debug, Clone, Copy)]
pub struct DatasetMatcher {
    strategy: MatchStrategy,
    options: RowOptions,
}

impl DatasetMatcher {
    pub fn new(strategy: MatchStrategy, options: RowOptions) -> Self {
        Self { strategy, options }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.datasets.matching,
            RowOptions {
                default_visible: config.datasets.default_visible,
                store_back_reference: config.datasets.store_back_reference,
            },
        )
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Target row of a source record
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        source: &SourceDataset,
        dataset_type: DatasetType,
    ) -> Result<TargetDataset> {
        let outcome = match self.strategy {
            MatchStrategy::BackReference => find_by_back_reference(conn, &source.id).await?,
            MatchStrategy::Similarity => {
                find_by_similarity(conn, source, dataset_type, self.options, false).await?
            }
            MatchStrategy::Auto => match find_by_back_reference(conn, &source.id).await? {
                MatchOutcome::Found(dataset) => MatchOutcome::Found(dataset),
                _ => find_by_similarity(conn, source, dataset_type, self.options, true).await?,
            },
        };

        outcome.into_result(&source.id)
    }

    /// Target row of a source record known only by id.
    ///
    /// `index` holds the source collection for `dataset_type`; ids missing
    /// from it can still be found through a stored back-reference.
    pub async fn resolve_reference(
        &self,
        conn: &mut SqliteConnection,
        source_id: &str,
        dataset_type: DatasetType,
        index: &HashMap<&str, &SourceDataset>,
    ) -> Result<TargetDataset> {
        match index.get(source_id) {
            Some(source) => self.resolve(conn, source, dataset_type).await,
            None if self.strategy != MatchStrategy::Similarity => {
                find_by_back_reference(conn, source_id)
                    .await?
                    .into_result(source_id)
            }
            None => Err(Error::DatasetNotFound(source_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::tests::setup_test_db;
    use crate::target::{format_timestamp, insert_dataset};

    const OPTIONS: RowOptions = RowOptions {
        default_visible: true,
        store_back_reference: false,
    };

    fn candidate(id: i64, name: &str, size: i64) -> TargetDataset {
        TargetDataset {
            id,
            cmg_id: None,
            name: name.to_string(),
            dataset_type: "DATA_PRODUCT".to_string(),
            is_deleted: false,
            description: None,
            num_directories: Some(0),
            num_files: Some(0),
            du_size: Some(0),
            size: Some(size),
            created_at: None,
            updated_at: None,
            origin_path: None,
            archive_path: None,
            is_staged: false,
            metadata: None,
        }
    }

    fn source(name: &str, size: i64) -> SourceDataset {
        SourceDataset {
            id: format!("src-{}", name),
            name: Some(name.to_string()),
            size: Some(size),
            ..Default::default()
        }
    }

    fn expected_for(src: &SourceDataset) -> NewDataset {
        target_row(
            src,
            DatasetType::DataProduct,
            src.name.clone().unwrap_or_default(),
            false,
            Utc::now(),
            OPTIONS,
        )
    }

    #[test]
    fn test_full_agreement_scores_twelve() {
        let src = source("Foo", 100);
        let score = similarity_score(&expected_for(&src), Some("Foo"), &candidate(1, "Foo", 100));
        assert_eq!(score, SIMILARITY_PREDICATES);
    }

    #[test]
    fn test_unique_best_wins_regardless_of_order() {
        let src = source("Foo", 200);
        let expected = expected_for(&src);
        let rows = vec![
            candidate(1, "Foo", 100),
            candidate(2, "Duplicate_Foo", 200),
            candidate(3, "Duplicate_2_Foo", 300),
        ];

        for rotation in 0..rows.len() {
            let mut ordered = rows.clone();
            ordered.rotate_left(rotation);
            match pick_best(&expected, Some("Foo"), ordered) {
                MatchOutcome::Found(row) => assert_eq!(row.id, 2),
                other => panic!("expected a match, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_tie_at_zero_is_ambiguous() {
        let src = SourceDataset {
            id: "s".to_string(),
            name: Some("Foo".to_string()),
            visible: Some(false),
            description: Some("d".to_string()),
            directories: Some(9),
            du_size: Some(9),
            size: Some(9),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            staged: Some(true),
            paths: crate::source::DatasetPaths {
                origin: Some("/o".to_string()),
                archive: Some("/a".to_string()),
            },
            ..Default::default()
        };
        let mut expected = expected_for(&src);
        expected.num_files = 9;
        expected.du_size = 9;

        let a = candidate(1, "Other", 1);
        let b = candidate(2, "Another", 2);
        assert_eq!(similarity_score(&expected, Some("Foo"), &a), 0);

        match pick_best(&expected, Some("Foo"), vec![a, b]) {
            MatchOutcome::Ambiguous { candidates, score } => {
                assert_eq!((candidates, score), (2, 0));
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_candidates_is_not_found() {
        let src = source("Foo", 1);
        assert!(matches!(
            pick_best(&expected_for(&src), Some("Foo"), Vec::new()),
            MatchOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_similarity_lookup_against_inserted_rows() {
        let (db, _tmp) = setup_test_db().await;
        let mut tx = db.begin().await.unwrap();

        let created = Utc::now();
        let mut visible = source("Foo", 100);
        visible.created_at = Some(created);
        let mut hidden = source("Foo", 200);
        hidden.visible = Some(false);

        let mut row = expected_for(&visible);
        let visible_id = insert_dataset(&mut tx, &row).await.unwrap();
        row = expected_for(&hidden);
        row.name = "Duplicate_Foo".to_string();
        let hidden_id = insert_dataset(&mut tx, &row).await.unwrap();
        assert_eq!(row.created_at, None);
        assert_eq!(
            expected_for(&visible).created_at,
            Some(format_timestamp(&created))
        );

        let found = find_by_similarity(&mut tx, &visible, DatasetType::DataProduct, OPTIONS, false)
            .await
            .unwrap()
            .into_result("v")
            .unwrap();
        assert_eq!(found.id, visible_id);

        let found = find_by_similarity(&mut tx, &hidden, DatasetType::DataProduct, OPTIONS, false)
            .await
            .unwrap()
            .into_result("h")
            .unwrap();
        assert_eq!(found.id, hidden_id);

        let missing = source("Bar", 1);
        let err = find_by_similarity(&mut tx, &missing, DatasetType::DataProduct, OPTIONS, false)
            .await
            .unwrap()
            .into_result("b")
            .unwrap_err();
        assert!(matches!(err, Error::DatasetNotFound(_)));
    }

    #[tokio::test]
    async fn test_auto_prefers_back_reference() {
        let (db, _tmp) = setup_test_db().await;
        let mut tx = db.begin().await.unwrap();

        let src = source("Foo", 100);
        let mut row = expected_for(&src);

        // Identical legacy row without a back-reference
        let legacy_id = insert_dataset(&mut tx, &row).await.unwrap();
        row.name = "Duplicate_Foo".to_string();
        row.cmg_id = Some(src.id.clone());
        let referenced_id = insert_dataset(&mut tx, &row).await.unwrap();

        let matcher = DatasetMatcher::new(MatchStrategy::Auto, OPTIONS);
        let found = matcher
            .resolve(&mut tx, &src, DatasetType::DataProduct)
            .await
            .unwrap();
        assert_eq!(found.id, referenced_id);

        // Unreferenced source falls back to similarity among legacy rows
        let other = SourceDataset {
            id: "legacy".to_string(),
            ..src.clone()
        };
        let found = matcher
            .resolve(&mut tx, &other, DatasetType::DataProduct)
            .await
            .unwrap();
        assert_eq!(found.id, legacy_id);

        let strict = DatasetMatcher::new(MatchStrategy::BackReference, OPTIONS);
        let err = strict
            .resolve(&mut tx, &other, DatasetType::DataProduct)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "not-found");

        let index: HashMap<&str, &SourceDataset> = HashMap::new();
        let found = matcher
            .resolve_reference(&mut tx, &src.id, DatasetType::DataProduct, &index)
            .await
            .unwrap();
        assert_eq!(found.id, referenced_id);
    }
}
