//! Keyword search over a SQLite index.
//!
//! Uses FTS5 BM25 ranking. Raw ranks are negated (higher is better) and
//! min-max normalized to `[0, 1]` within the result set.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub resource_id: String,
    pub score: f64,
    pub snippet: String,
}

struct Candidate {
    resource_id: String,
    raw_score: f64,
    snippet: String,
}

pub async fn search_records(pool: &SqlitePool, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT resource_id, rank,
               snippet(records_fts, 1, '>>>', '<<<', '...', 48) AS snippet
        FROM records_fts
        WHERE records_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let candidates: Vec<Candidate> = rows
        .iter()
        .map(|row| {
            let rank: f64 = row.get("rank");
            Candidate {
                resource_id: row.get("resource_id"),
                raw_score: -rank, // negate so higher = better
                snippet: row.get("snippet"),
            }
        })
        .collect();

    Ok(normalize_scores(candidates))
}

fn normalize_scores(candidates: Vec<Candidate>) -> Vec<SearchHit> {
    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .into_iter()
        .map(|c| {
            let score = if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.raw_score - s_min) / (s_max - s_min)
            };
            SearchHit {
                resource_id: c.resource_id,
                score,
                snippet: c.snippet,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, raw: f64) -> Candidate {
        Candidate {
            resource_id: id.to_string(),
            raw_score: raw,
            snippet: String::new(),
        }
    }

    #[test]
    fn test_normalize_spreads_to_unit_range() {
        let hits = normalize_scores(vec![cand("a", 3.0), cand("b", 2.0), cand("c", 1.0)]);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!((hits[1].score - 0.5).abs() < 1e-9);
        assert!(hits[2].score.abs() < 1e-9);
    }

    #[test]
    fn test_normalize_single_hit_is_one() {
        let hits = normalize_scores(vec![cand("a", 7.5)]);
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_scores(Vec::new()).is_empty());
    }
}
