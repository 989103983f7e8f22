//! Experiment queries
//!
//! The target segment is a real foreign key; the metric id lists and variants are
//! JSON arrays whose contents the database never inspects.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{
    fetch_page, next_updated_at, write_transaction, Filter, ListOrder, ServiceResult,
};
use crate::model::experiment::{
    DEFAULT_EXPERIMENT_TYPE, DEFAULT_EXPERIMENT_UNIT, DEFAULT_SIGNIFICANCE_LEVEL,
    DEFAULT_STATISTICAL_POWER, DEFAULT_STATUS,
};
use crate::model::{
    Experiment, ExperimentCreate, ExperimentUpdate, MetricRef, Page, Pagination, Variant,
};
use crate::store::codec;

const COLUMNS: &str = "id, name, description, owner, team, experiment_type, status, objective, \
    background, hypothesis, expected_impact, ice_impact, ice_confidence, ice_ease, \
    primary_metric_ids, secondary_metric_ids, guardrail_metric_ids, start_date, end_date, \
    target_segment_id, variants, experiment_unit, significance_level, statistical_power, \
    minimum_detectable_effect, sample_size, conditions, confounding_factors, progress, \
    days_left, created_at, updated_at";

/// Filters accepted by [`ExperimentService::list`]
#[derive(Debug, Clone, Default)]
pub struct ExperimentFilter {
    /// Substring of name or description
    pub search: Option<String>,
    pub status: Option<String>,
}

/// Experiment CRUD
pub struct ExperimentService;

impl ExperimentService {
    /// List experiments, most recently created first
    pub fn list(
        conn: &Connection,
        pagination: Pagination,
        filter: &ExperimentFilter,
    ) -> ServiceResult<Page<Experiment>> {
        let sql_filter = Filter::new()
            .search(filter.search.as_deref(), &["name", "description"])
            .eq("status", filter.status.as_deref());

        fetch_page(
            conn,
            "experiments",
            COLUMNS,
            &sql_filter,
            ListOrder::NewestFirst,
            pagination,
            experiment_from_row,
        )
    }

    pub fn get(conn: &Connection, id: i64) -> ServiceResult<Option<Experiment>> {
        let sql = format!("SELECT {} FROM experiments WHERE id = ?1", COLUMNS);
        Ok(conn.query_row(&sql, [id], experiment_from_row).optional()?)
    }

    /// Create an experiment
    ///
    /// Fails with a constraint violation when `target_segment_id` names no segment.
    pub fn create(conn: &Connection, payload: ExperimentCreate) -> ServiceResult<Experiment> {
        payload.validate()?;

        let now = codec::now();
        let stamp = codec::encode_timestamp(&now);
        let experiment = Experiment {
            id: 0,
            name: payload.name,
            description: payload.description,
            owner: payload.owner,
            team: payload.team,
            experiment_type: payload
                .experiment_type
                .unwrap_or_else(|| DEFAULT_EXPERIMENT_TYPE.to_string()),
            status: payload
                .status
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            objective: payload.objective,
            background: payload.background,
            hypothesis: payload.hypothesis,
            expected_impact: payload.expected_impact,
            ice_impact: payload.ice_impact,
            ice_confidence: payload.ice_confidence,
            ice_ease: payload.ice_ease,
            primary_metric_ids: payload.primary_metric_ids,
            secondary_metric_ids: payload.secondary_metric_ids,
            guardrail_metric_ids: payload.guardrail_metric_ids,
            start_date: payload.start_date,
            end_date: payload.end_date,
            target_segment_id: payload.target_segment_id,
            variants: payload.variants,
            experiment_unit: payload
                .experiment_unit
                .unwrap_or_else(|| DEFAULT_EXPERIMENT_UNIT.to_string()),
            significance_level: payload
                .significance_level
                .unwrap_or(DEFAULT_SIGNIFICANCE_LEVEL),
            statistical_power: payload
                .statistical_power
                .unwrap_or(DEFAULT_STATISTICAL_POWER),
            minimum_detectable_effect: payload.minimum_detectable_effect,
            sample_size: payload.sample_size,
            conditions: payload.conditions,
            confounding_factors: payload.confounding_factors,
            progress: 0.0,
            days_left: None,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO experiments (
                 name, description, owner, team, experiment_type, status, objective, background,
                 hypothesis, expected_impact, ice_impact, ice_confidence, ice_ease,
                 primary_metric_ids, secondary_metric_ids, guardrail_metric_ids,
                 start_date, end_date, target_segment_id, variants, experiment_unit,
                 significance_level, statistical_power, minimum_detectable_effect, sample_size,
                 conditions, confounding_factors, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?28)",
            params![
                experiment.name,
                experiment.description,
                experiment.owner,
                experiment.team,
                experiment.experiment_type,
                experiment.status,
                experiment.objective,
                experiment.background,
                experiment.hypothesis,
                experiment.expected_impact,
                experiment.ice_impact,
                experiment.ice_confidence,
                experiment.ice_ease,
                codec::encode_json(&experiment.primary_metric_ids)?,
                codec::encode_json(&experiment.secondary_metric_ids)?,
                codec::encode_json(&experiment.guardrail_metric_ids)?,
                codec::encode_date(experiment.start_date),
                codec::encode_date(experiment.end_date),
                experiment.target_segment_id,
                codec::encode_json(&experiment.variants)?,
                experiment.experiment_unit,
                experiment.significance_level,
                experiment.statistical_power,
                experiment.minimum_detectable_effect,
                experiment.sample_size,
                experiment.conditions,
                experiment.confounding_factors,
                stamp,
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!(
            experiment_id = id,
            segment_id = experiment.target_segment_id,
            name = %experiment.name,
            "Experiment created"
        );

        Ok(Experiment { id, ..experiment })
    }

    pub fn update(
        conn: &Connection,
        id: i64,
        mut patch: ExperimentUpdate,
    ) -> ServiceResult<Option<Experiment>> {
        patch.validate()?;

        let tx = write_transaction(conn)?;
        let Some(mut experiment) = Self::get(&tx, id)? else {
            return Ok(None);
        };

        patch.apply(&mut experiment);
        experiment.updated_at = next_updated_at(experiment.updated_at);

        tx.execute(
            "UPDATE experiments
             SET name = ?1, description = ?2, owner = ?3, team = ?4, experiment_type = ?5,
                 status = ?6, objective = ?7, background = ?8, hypothesis = ?9,
                 expected_impact = ?10, ice_impact = ?11, ice_confidence = ?12,
                 ice_ease = ?13, primary_metric_ids = ?14, secondary_metric_ids = ?15,
                 guardrail_metric_ids = ?16, start_date = ?17, end_date = ?18,
                 target_segment_id = ?19, variants = ?20, experiment_unit = ?21,
                 significance_level = ?22, statistical_power = ?23,
                 minimum_detectable_effect = ?24, sample_size = ?25, conditions = ?26,
                 confounding_factors = ?27, progress = ?28, days_left = ?29,
                 updated_at = ?30
             WHERE id = ?31",
            params![
                experiment.name,
                experiment.description,
                experiment.owner,
                experiment.team,
                experiment.experiment_type,
                experiment.status,
                experiment.objective,
                experiment.background,
                experiment.hypothesis,
                experiment.expected_impact,
                experiment.ice_impact,
                experiment.ice_confidence,
                experiment.ice_ease,
                codec::encode_json(&experiment.primary_metric_ids)?,
                codec::encode_json(&experiment.secondary_metric_ids)?,
                codec::encode_json(&experiment.guardrail_metric_ids)?,
                codec::encode_date(experiment.start_date),
                codec::encode_date(experiment.end_date),
                experiment.target_segment_id,
                codec::encode_json(&experiment.variants)?,
                experiment.experiment_unit,
                experiment.significance_level,
                experiment.statistical_power,
                experiment.minimum_detectable_effect,
                experiment.sample_size,
                experiment.conditions,
                experiment.confounding_factors,
                experiment.progress,
                experiment.days_left,
                codec::encode_timestamp(&experiment.updated_at),
                id,
            ],
        )?;
        tx.commit()?;

        info!(experiment_id = id, status = %experiment.status, "Experiment updated");
        Ok(Some(experiment))
    }

    pub fn delete(conn: &Connection, id: i64) -> ServiceResult<bool> {
        let removed = conn.execute("DELETE FROM experiments WHERE id = ?1", [id])?;
        if removed > 0 {
            info!(experiment_id = id, "Experiment deleted");
        }
        Ok(removed > 0)
    }
}

fn metric_ids(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<i64>> {
    let ids: Vec<MetricRef> = codec::get_json_list(row, idx)?;
    Ok(ids.into_iter().map(i64::from).collect())
}

fn experiment_from_row(row: &Row<'_>) -> rusqlite::Result<Experiment> {
    let variants: Vec<Variant> = codec::get_json_list(row, 20)?;

    Ok(Experiment {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner: row.get(3)?,
        team: row.get(4)?,
        experiment_type: row.get(5)?,
        status: row.get(6)?,
        objective: row.get(7)?,
        background: row.get(8)?,
        hypothesis: row.get(9)?,
        expected_impact: row.get(10)?,
        ice_impact: row.get(11)?,
        ice_confidence: row.get(12)?,
        ice_ease: row.get(13)?,
        primary_metric_ids: metric_ids(row, 14)?,
        secondary_metric_ids: metric_ids(row, 15)?,
        guardrail_metric_ids: metric_ids(row, 16)?,
        start_date: codec::get_date(row, 17)?,
        end_date: codec::get_date(row, 18)?,
        target_segment_id: row.get(19)?,
        variants,
        experiment_unit: row.get(21)?,
        significance_level: row.get(22)?,
        statistical_power: row.get(23)?,
        minimum_detectable_effect: row.get(24)?,
        sample_size: row.get(25)?,
        conditions: row.get(26)?,
        confounding_factors: row.get(27)?,
        progress: row.get(28)?,
        days_left: row.get(29)?,
        created_at: codec::get_timestamp(row, 30)?,
        updated_at: codec::get_timestamp(row, 31)?,
    })
}
