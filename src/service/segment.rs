//! Segment queries and campaign links
//!
//! Links live in `segment_campaigns` as plain membership rows: linking the same
//! pair twice stores two rows, and unlinking removes every row of the pair.
//! Responses embed the linked campaigns in link order.

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::info;

use super::{
    fetch_page, next_updated_at, write_transaction, Filter, ListOrder, ServiceResult,
};
use crate::model::{CampaignSummary, Page, Pagination, Segment, SegmentCreate, SegmentUpdate};
use crate::store::codec;

const COLUMNS: &str = "id, name, description, owner, category, tags, refresh_period, \
    query_definition, customer_count, metric1_value, metric1_label, metric2_value, \
    metric2_label, metric3_value, metric3_label, metric4_value, metric4_label, \
    last_touch_channel, last_touch_date, created_at, updated_at";

/// Filters accepted by [`SegmentService::list`]
#[derive(Debug, Clone, Default)]
pub struct SegmentFilter {
    /// Substring of name or description
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Segment CRUD
pub struct SegmentService;

impl SegmentService {
    /// List segments in insertion order, each with its linked campaigns
    pub fn list(
        conn: &Connection,
        pagination: Pagination,
        filter: &SegmentFilter,
    ) -> ServiceResult<Page<Segment>> {
        let sql_filter = Filter::new()
            .search(filter.search.as_deref(), &["name", "description"])
            .eq("category", filter.category.as_deref());

        let mut page = fetch_page(
            conn,
            "segments",
            COLUMNS,
            &sql_filter,
            ListOrder::StoreNative,
            pagination,
            segment_from_row,
        )?;

        let ids: Vec<i64> = page.items.iter().map(|s| s.id).collect();
        let mut campaigns = campaigns_by_segment(conn, &ids)?;
        for segment in &mut page.items {
            segment.campaigns = campaigns.remove(&segment.id).unwrap_or_default();
        }

        Ok(page)
    }

    pub fn get(conn: &Connection, id: i64) -> ServiceResult<Option<Segment>> {
        let sql = format!("SELECT {} FROM segments WHERE id = ?1", COLUMNS);
        let Some(mut segment) = conn.query_row(&sql, [id], segment_from_row).optional()? else {
            return Ok(None);
        };

        segment.campaigns = campaigns_by_segment(conn, &[id])?
            .remove(&id)
            .unwrap_or_default();
        Ok(Some(segment))
    }

    fn exists(conn: &Connection, id: i64) -> ServiceResult<bool> {
        let found = conn
            .query_row("SELECT 1 FROM segments WHERE id = ?1", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Create a segment and link the given campaigns in one transaction
    ///
    /// An unknown campaign id fails the whole create with a constraint violation.
    pub fn create(conn: &Connection, payload: SegmentCreate) -> ServiceResult<Segment> {
        payload.validate()?;

        let now = codec::now();
        let stamp = codec::encode_timestamp(&now);

        let tx = write_transaction(conn)?;
        tx.execute(
            "INSERT INTO segments (name, description, owner, category, tags, refresh_period,
                                   query_definition, customer_count,
                                   metric1_value, metric1_label, metric2_value, metric2_label,
                                   metric3_value, metric3_label, metric4_value, metric4_label,
                                   last_touch_channel, last_touch_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?19)",
            params![
                payload.name,
                payload.description,
                payload.owner,
                payload.category,
                payload.tags,
                payload.refresh_period,
                payload.query_definition,
                payload.customer_count,
                payload.metric1_value,
                payload.metric1_label,
                payload.metric2_value,
                payload.metric2_label,
                payload.metric3_value,
                payload.metric3_label,
                payload.metric4_value,
                payload.metric4_label,
                payload.last_touch_channel,
                codec::encode_date(payload.last_touch_date),
                stamp,
            ],
        )?;
        let id = tx.last_insert_rowid();

        insert_links(&tx, id, &payload.campaign_ids, &stamp)?;
        let campaigns = campaigns_by_segment(&tx, &[id])?
            .remove(&id)
            .unwrap_or_default();
        tx.commit()?;

        info!(
            segment_id = id,
            name = %payload.name,
            campaigns = campaigns.len(),
            "Segment created"
        );

        Ok(Segment {
            id,
            name: payload.name,
            description: payload.description,
            owner: payload.owner,
            category: payload.category,
            tags: payload.tags,
            refresh_period: payload.refresh_period,
            query_definition: payload.query_definition,
            customer_count: payload.customer_count,
            metric1_value: payload.metric1_value,
            metric1_label: payload.metric1_label,
            metric2_value: payload.metric2_value,
            metric2_label: payload.metric2_label,
            metric3_value: payload.metric3_value,
            metric3_label: payload.metric3_label,
            metric4_value: payload.metric4_value,
            metric4_label: payload.metric4_label,
            last_touch_channel: payload.last_touch_channel,
            last_touch_date: payload.last_touch_date,
            campaigns,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update; `campaign_ids`, when present, replaces every link
    pub fn update(
        conn: &Connection,
        id: i64,
        mut patch: SegmentUpdate,
    ) -> ServiceResult<Option<Segment>> {
        patch.validate()?;

        let tx = write_transaction(conn)?;
        let Some(mut segment) = Self::get(&tx, id)? else {
            return Ok(None);
        };

        patch.apply(&mut segment);
        segment.updated_at = next_updated_at(segment.updated_at);
        let stamp = codec::encode_timestamp(&segment.updated_at);

        tx.execute(
            "UPDATE segments
             SET name = ?1, description = ?2, owner = ?3, category = ?4, tags = ?5,
                 refresh_period = ?6, query_definition = ?7, customer_count = ?8,
                 metric1_value = ?9, metric1_label = ?10, metric2_value = ?11,
                 metric2_label = ?12, metric3_value = ?13, metric3_label = ?14,
                 metric4_value = ?15, metric4_label = ?16, last_touch_channel = ?17,
                 last_touch_date = ?18, updated_at = ?19
             WHERE id = ?20",
            params![
                segment.name,
                segment.description,
                segment.owner,
                segment.category,
                segment.tags,
                segment.refresh_period,
                segment.query_definition,
                segment.customer_count,
                segment.metric1_value,
                segment.metric1_label,
                segment.metric2_value,
                segment.metric2_label,
                segment.metric3_value,
                segment.metric3_label,
                segment.metric4_value,
                segment.metric4_label,
                segment.last_touch_channel,
                codec::encode_date(segment.last_touch_date),
                stamp,
                id,
            ],
        )?;

        if let Some(campaign_ids) = patch.campaign_ids {
            tx.execute("DELETE FROM segment_campaigns WHERE segment_id = ?1", [id])?;
            insert_links(&tx, id, &campaign_ids, &stamp)?;
            segment.campaigns = campaigns_by_segment(&tx, &[id])?
                .remove(&id)
                .unwrap_or_default();
        }
        tx.commit()?;

        info!(segment_id = id, "Segment updated");
        Ok(Some(segment))
    }

    /// Delete a segment; its campaign links go with it, the campaigns stay
    ///
    /// Fails with a constraint violation while experiments still target the segment.
    pub fn delete(conn: &Connection, id: i64) -> ServiceResult<bool> {
        let removed = conn.execute("DELETE FROM segments WHERE id = ?1", [id])?;
        if removed > 0 {
            info!(segment_id = id, "Segment deleted");
        }
        Ok(removed > 0)
    }

    /// Link a campaign to a segment
    ///
    /// Returns `None` when either side does not exist.
    pub fn link_campaign(
        conn: &Connection,
        segment_id: i64,
        campaign_id: i64,
    ) -> ServiceResult<Option<Segment>> {
        let tx = write_transaction(conn)?;
        let campaign_exists = tx
            .query_row("SELECT 1 FROM campaigns WHERE id = ?1", [campaign_id], |_| {
                Ok(())
            })
            .optional()?
            .is_some();
        if !campaign_exists || !Self::exists(&tx, segment_id)? {
            return Ok(None);
        }

        let stamp = touch(&tx, segment_id)?;
        insert_links(&tx, segment_id, &[campaign_id], &stamp)?;
        let segment = Self::get(&tx, segment_id)?;
        tx.commit()?;

        info!(segment_id, campaign_id, "Campaign linked");
        Ok(segment)
    }

    /// Remove every link between a segment and a campaign
    pub fn unlink_campaign(
        conn: &Connection,
        segment_id: i64,
        campaign_id: i64,
    ) -> ServiceResult<bool> {
        let tx = write_transaction(conn)?;
        let removed = tx.execute(
            "DELETE FROM segment_campaigns WHERE segment_id = ?1 AND campaign_id = ?2",
            [segment_id, campaign_id],
        )?;
        if removed > 0 {
            touch(&tx, segment_id)?;
        }
        tx.commit()?;

        if removed > 0 {
            info!(segment_id, campaign_id, "Campaign unlinked");
        }
        Ok(removed > 0)
    }
}

/// Refresh a segment's `updated_at`, returning the encoded stamp
fn touch(conn: &Connection, segment_id: i64) -> ServiceResult<String> {
    let previous = conn.query_row(
        "SELECT updated_at FROM segments WHERE id = ?1",
        [segment_id],
        |row| codec::get_timestamp(row, 0),
    )?;
    let stamp = codec::encode_timestamp(&next_updated_at(previous));
    conn.execute(
        "UPDATE segments SET updated_at = ?1 WHERE id = ?2",
        params![stamp, segment_id],
    )?;
    Ok(stamp)
}

fn insert_links(
    conn: &Connection,
    segment_id: i64,
    campaign_ids: &[i64],
    stamp: &str,
) -> ServiceResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO segment_campaigns (segment_id, campaign_id, created_at)
         VALUES (?1, ?2, ?3)",
    )?;
    for campaign_id in campaign_ids {
        stmt.execute(params![segment_id, campaign_id, stamp])?;
    }
    Ok(())
}

/// Linked campaigns for each of `segment_ids`, in link order
fn campaigns_by_segment(
    conn: &Connection,
    segment_ids: &[i64],
) -> ServiceResult<HashMap<i64, Vec<CampaignSummary>>> {
    let mut grouped: HashMap<i64, Vec<CampaignSummary>> = HashMap::new();
    if segment_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; segment_ids.len()].join(", ");
    let sql = format!(
        "SELECT sc.segment_id, c.id, c.name
         FROM segment_campaigns sc
         JOIN campaigns c ON c.id = sc.campaign_id
         WHERE sc.segment_id IN ({})
         ORDER BY sc.id",
        placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(segment_ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            CampaignSummary {
                id: row.get(1)?,
                name: row.get(2)?,
            },
        ))
    })?;

    for row in rows {
        let (segment_id, campaign) = row?;
        grouped.entry(segment_id).or_default().push(campaign);
    }
    Ok(grouped)
}

fn segment_from_row(row: &Row<'_>) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner: row.get(3)?,
        category: row.get(4)?,
        tags: row.get(5)?,
        refresh_period: row.get(6)?,
        query_definition: row.get(7)?,
        customer_count: row.get(8)?,
        metric1_value: row.get(9)?,
        metric1_label: row.get(10)?,
        metric2_value: row.get(11)?,
        metric2_label: row.get(12)?,
        metric3_value: row.get(13)?,
        metric3_label: row.get(14)?,
        metric4_value: row.get(15)?,
        metric4_label: row.get(16)?,
        last_touch_channel: row.get(17)?,
        last_touch_date: codec::get_date(row, 18)?,
        campaigns: Vec::new(),
        created_at: codec::get_timestamp(row, 19)?,
        updated_at: codec::get_timestamp(row, 20)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CampaignCreate;
    use crate::service::testing::open_db;
    use crate::service::{CampaignService, ServiceError};
    use crate::store::StoreError;
    use chrono::NaiveDate;

    fn campaign(conn: &Connection, name: &str) -> i64 {
        CampaignService::create(
            conn,
            CampaignCreate {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    fn segment(conn: &Connection, name: &str, category: &str, customers: Option<i64>) -> Segment {
        SegmentService::create(
            conn,
            SegmentCreate {
                name: name.to_string(),
                category: Some(category.to_string()),
                customer_count: customers,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_then_get_round_trips() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let spring = campaign(&conn, "Spring Sale");
        let email = campaign(&conn, "Win-back Email");

        let created = SegmentService::create(
            &conn,
            SegmentCreate {
                name: "Loyal Customers".to_string(),
                description: Some("Bought 3+ times".to_string()),
                owner: Some("crm".to_string()),
                category: Some("retention".to_string()),
                tags: Some("vip".to_string()),
                refresh_period: Some("daily".to_string()),
                query_definition: Some("orders >= 3".to_string()),
                customer_count: Some(1000),
                metric1_value: Some("42%".to_string()),
                metric1_label: Some("Repeat rate".to_string()),
                metric4_value: Some("$120".to_string()),
                metric4_label: Some("AOV".to_string()),
                last_touch_channel: Some("email".to_string()),
                last_touch_date: NaiveDate::from_ymd_opt(2024, 4, 1),
                campaign_ids: vec![email, spring],
                ..Default::default()
            },
        )
        .unwrap();

        let names: Vec<&str> = created.campaigns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Win-back Email", "Spring Sale"]);

        let fetched = SegmentService::get(&conn, created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_create_with_unknown_campaign_rolls_back() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        let err = SegmentService::create(
            &conn,
            SegmentCreate {
                name: "Orphan".to_string(),
                campaign_ids: vec![404],
                ..Default::default()
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Store(StoreError::ConstraintViolation(_))
        ));
        let page = SegmentService::list(&conn, Pagination::default(), &SegmentFilter::default())
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_update_replaces_links_only_when_present() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let a = campaign(&conn, "A");
        let b = campaign(&conn, "B");
        let created = SegmentService::create(
            &conn,
            SegmentCreate {
                name: "Dormant".to_string(),
                campaign_ids: vec![a],
                ..Default::default()
            },
        )
        .unwrap();

        let renamed = SegmentService::update(
            &conn,
            created.id,
            SegmentUpdate {
                name: Some("Dormant 90d".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(renamed.campaigns.len(), 1);
        assert!(renamed.updated_at > created.updated_at);

        let relinked = SegmentService::update(
            &conn,
            created.id,
            SegmentUpdate {
                campaign_ids: Some(vec![b, b]),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
        let ids: Vec<i64> = relinked.campaigns.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![b, b]);
        assert_eq!(relinked.name, "Dormant 90d");
    }

    #[test]
    fn test_link_and_unlink() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let a = campaign(&conn, "A");
        let seg = segment(&conn, "Loyal", "retention", None);

        let linked = SegmentService::link_campaign(&conn, seg.id, a).unwrap().unwrap();
        assert_eq!(linked.campaigns, vec![CampaignSummary { id: a, name: "A".to_string() }]);
        assert!(linked.updated_at > seg.updated_at);

        assert!(SegmentService::link_campaign(&conn, seg.id, 999).unwrap().is_none());
        assert!(SegmentService::link_campaign(&conn, 999, a).unwrap().is_none());

        assert!(SegmentService::unlink_campaign(&conn, seg.id, a).unwrap());
        assert!(!SegmentService::unlink_campaign(&conn, seg.id, a).unwrap());
        let fetched = SegmentService::get(&conn, seg.id).unwrap().unwrap();
        assert!(fetched.campaigns.is_empty());
    }

    #[test]
    fn test_delete_keeps_campaigns() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let a = campaign(&conn, "A");
        let seg = segment(&conn, "Loyal", "retention", Some(10));
        SegmentService::link_campaign(&conn, seg.id, a).unwrap();

        assert!(SegmentService::delete(&conn, seg.id).unwrap());
        assert!(SegmentService::get(&conn, seg.id).unwrap().is_none());
        assert!(CampaignService::get(&conn, a).unwrap().is_some());

        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM segment_campaigns", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
        assert!(!SegmentService::delete(&conn, seg.id).unwrap());
    }

    #[test]
    fn test_list_filters_and_embeds_campaigns() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();
        let a = campaign(&conn, "A");

        let loyal = segment(&conn, "Loyal Customers", "retention", Some(1000));
        segment(&conn, "Dormant", "reactivation", Some(500));
        segment(&conn, "VIP", "retention", None);
        SegmentService::link_campaign(&conn, loyal.id, a).unwrap();

        let retention = SegmentFilter {
            category: Some("retention".to_string()),
            ..Default::default()
        };
        let page = SegmentService::list(&conn, Pagination::default(), &retention).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Loyal Customers");
        assert_eq!(page.items[0].campaigns.len(), 1);
        assert!(page.items[1].campaigns.is_empty());

        let search = SegmentFilter {
            search: Some("dorm".to_string()),
            ..Default::default()
        };
        let page = SegmentService::list(&conn, Pagination::new(0, 1).unwrap(), &search).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items.len(), 1);
    }
}
