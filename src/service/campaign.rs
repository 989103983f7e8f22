//! Campaign queries

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{fetch_page, Filter, ListOrder, ServiceResult};
use crate::model::segment::DEFAULT_CAMPAIGN_STATUS;
use crate::model::{Campaign, CampaignCreate, Page, Pagination};
use crate::store::codec;

const COLUMNS: &str = "id, name, description, status, created_at";

/// Filters accepted by [`CampaignService::list`]
#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub search: Option<String>,
    pub status: Option<String>,
}

/// Campaign creation and lookup
pub struct CampaignService;

impl CampaignService {
    pub fn list(
        conn: &Connection,
        pagination: Pagination,
        filter: &CampaignFilter,
    ) -> ServiceResult<Page<Campaign>> {
        let filter = Filter::new()
            .search(filter.search.as_deref(), &["name", "description"])
            .eq("status", filter.status.as_deref());

        fetch_page(
            conn,
            "campaigns",
            COLUMNS,
            &filter,
            ListOrder::StoreNative,
            pagination,
            campaign_from_row,
        )
    }

    pub fn get(conn: &Connection, id: i64) -> ServiceResult<Option<Campaign>> {
        let sql = format!("SELECT {} FROM campaigns WHERE id = ?1", COLUMNS);
        Ok(conn.query_row(&sql, [id], campaign_from_row).optional()?)
    }

    pub fn create(conn: &Connection, payload: CampaignCreate) -> ServiceResult<Campaign> {
        payload.validate()?;

        let created_at = codec::now();
        let status = payload
            .status
            .unwrap_or_else(|| DEFAULT_CAMPAIGN_STATUS.to_string());

        conn.execute(
            "INSERT INTO campaigns (name, description, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                payload.name,
                payload.description,
                status,
                codec::encode_timestamp(&created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!(campaign_id = id, name = %payload.name, "Campaign created");

        Ok(Campaign {
            id,
            name: payload.name,
            description: payload.description,
            status,
            created_at,
        })
    }
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        created_at: codec::get_timestamp(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::open_db;

    #[test]
    fn test_create_defaults_status_active() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        let campaign = CampaignService::create(
            &conn,
            CampaignCreate {
                name: "Win-back email".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(campaign.status, "active");
        assert_eq!(
            CampaignService::get(&conn, campaign.id).unwrap(),
            Some(campaign)
        );
    }

    #[test]
    fn test_list_by_status() {
        let (db, _dir) = open_db();
        let conn = db.session().unwrap();

        for (name, status) in [("A", None), ("B", Some("paused")), ("C", None)] {
            CampaignService::create(
                &conn,
                CampaignCreate {
                    name: name.to_string(),
                    description: None,
                    status: status.map(str::to_string),
                },
            )
            .unwrap();
        }

        let active = CampaignFilter {
            status: Some("active".to_string()),
            ..Default::default()
        };
        let page = CampaignService::list(&conn, Pagination::default(), &active).unwrap();
        assert_eq!(page.total, 2);
        let names: Vec<&str> = page.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
