//! SQLite implementation of the repository port

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::init::init_database;
use super::models::TerminologyRow;
use crate::entity::{EntityRef, EntityType};
use crate::repository::{AbAssignment, EntitySettings, TerminologyEntry, TerminologyRepository};
use crate::transform::SEPARATOR;
use crate::value::{term_map_from_json, term_map_to_json, TermMap};
use crate::Result;

/// Repository over the `lexicon.db` schema
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(init_database(db_path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert_partner(&self, partner_id: &str, name: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO partners (guid, name) VALUES (?, ?)
             ON CONFLICT(guid) DO UPDATE SET name = excluded.name",
        )
        .bind(partner_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_organization(&self, organization_id: &str, partner_id: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO organizations (guid, partner_id) VALUES (?, ?)
             ON CONFLICT(guid) DO UPDATE SET partner_id = excluded.partner_id",
        )
        .bind(organization_id)
        .bind(partner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_company(&self, company_id: &str, organization_id: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO companies (guid, organization_id) VALUES (?, ?)
             ON CONFLICT(guid) DO UPDATE SET organization_id = excluded.organization_id",
        )
        .bind(company_id)
        .bind(organization_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_team(&self, team_id: &str, company_id: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO teams (guid, company_id) VALUES (?, ?)
             ON CONFLICT(guid) DO UPDATE SET company_id = excluded.company_id",
        )
        .bind(team_id)
        .bind(company_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_user(&self, user_id: &str, team_id: Option<&str>, company_id: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (guid, team_id, company_id) VALUES (?, ?, ?)
             ON CONFLICT(guid) DO UPDATE SET team_id = excluded.team_id, company_id = excluded.company_id",
        )
        .bind(user_id)
        .bind(team_id)
        .bind(company_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_settings(&self, entity: &EntityRef, settings: EntitySettings) -> Result<()> {
        sqlx::query(
            "INSERT INTO terminology_settings (entity_type, entity_id, enabled, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at",
        )
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .bind(settings.enabled as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_ab_assignment(&self, entity: &EntityRef, assignment: &AbAssignment) -> Result<()> {
        sqlx::query(
            "INSERT INTO ab_assignments (entity_type, entity_id, test_id, variant) VALUES (?, ?, ?, ?)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET test_id = excluded.test_id, variant = excluded.variant",
        )
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .bind(&assignment.test_id)
        .bind(&assignment.variant)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn put_ab_variant(&self, test_id: &str, variant: &str, terms: &TermMap) -> Result<()> {
        sqlx::query(
            "INSERT INTO ab_variants (test_id, variant, terms) VALUES (?, ?, ?)
             ON CONFLICT(test_id, variant) DO UPDATE SET terms = excluded.terms",
        )
        .bind(test_id)
        .bind(variant)
        .bind(serde_json::to_string(&term_map_to_json(terms))?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_entries(&self, entity_type: EntityType, entity_id: &str) -> Result<Vec<TerminologyEntry>> {
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT entity_id, key, value, override_behavior FROM terminology_entries
             WHERE entity_type = ? AND entity_id = ? ORDER BY key",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| TerminologyRow::from(row).into_entry())
            .collect()
    }
}

async fn upsert_entries(
    tx: &mut Transaction<'_, Sqlite>,
    entity: &EntityRef,
    entries: &[TerminologyEntry],
) -> Result<()> {
    let now = Utc::now();
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO terminology_entries
                (guid, entity_type, entity_id, key, value, override_behavior, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(entity_type, entity_id, key) DO UPDATE SET
                value = excluded.value,
                override_behavior = excluded.override_behavior,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .bind(&entry.key)
        .bind(serde_json::to_string(&entry.value)?)
        .bind(entry.override_behavior.as_str())
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TerminologyRepository for SqliteRepository {
    async fn get_entries(&self, entity: &EntityRef) -> Result<Vec<TerminologyEntry>> {
        self.fetch_entries(entity.entity_type, &entity.id).await
    }

    async fn insert_entries(&self, entity: &EntityRef, entries: &[TerminologyEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_entries(&mut tx, entity, entries).await?;
        tx.commit().await?;
        debug!("Stored {} terminology entries for {}", entries.len(), entity);
        Ok(())
    }

    async fn delete_entries_by_prefix(&self, entity: &EntityRef, key_prefix: &str) -> Result<u64> {
        let nested_prefix = format!("{}{}", key_prefix, SEPARATOR);
        // substr() instead of LIKE so `_` and `%` in keys match literally
        let result = sqlx::query(
            "DELETE FROM terminology_entries
             WHERE entity_type = ? AND entity_id = ? AND (key = ? OR substr(key, 1, ?) = ?)",
        )
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .bind(key_prefix)
        .bind(nested_prefix.chars().count() as i64)
        .bind(&nested_prefix)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_entries(&self, entity: &EntityRef) -> Result<u64> {
        let result = sqlx::query("DELETE FROM terminology_entries WHERE entity_type = ? AND entity_id = ?")
            .bind(entity.entity_type.as_str())
            .bind(&entity.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_entries(&self, entity: &EntityRef, entries: &[TerminologyEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM terminology_entries WHERE entity_type = ? AND entity_id = ?")
            .bind(entity.entity_type.as_str())
            .bind(&entity.id)
            .execute(&mut *tx)
            .await?;
        upsert_entries(&mut tx, entity, entries).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_parent(&self, entity: &EntityRef) -> Result<Option<EntityRef>> {
        let id = entity.id.as_str();
        let parent = match entity.entity_type {
            EntityType::System | EntityType::Partner => None,
            EntityType::User => {
                let row = sqlx::query_as::<_, (Option<String>, Option<String>)>(
                    "SELECT team_id, company_id FROM users WHERE guid = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
                match row {
                    Some((Some(team_id), _)) => Some(EntityRef::new(EntityType::Team, team_id)),
                    Some((None, Some(company_id))) => Some(EntityRef::new(EntityType::Company, company_id)),
                    _ => None,
                }
            }
            EntityType::Team => {
                parent_column(&self.pool, "SELECT company_id FROM teams WHERE guid = ?", id)
                    .await?
                    .map(|company_id| EntityRef::new(EntityType::Company, company_id))
            }
            EntityType::Company => {
                parent_column(&self.pool, "SELECT organization_id FROM companies WHERE guid = ?", id)
                    .await?
                    .map(|organization_id| EntityRef::new(EntityType::Organization, organization_id))
            }
            EntityType::Organization => {
                parent_column(&self.pool, "SELECT partner_id FROM organizations WHERE guid = ?", id)
                    .await?
                    .map(|partner_id| EntityRef::new(EntityType::Partner, partner_id))
            }
        };
        Ok(parent)
    }

    async fn get_system_defaults(&self) -> Result<Vec<TerminologyEntry>> {
        let system = EntityRef::system();
        self.fetch_entries(system.entity_type, &system.id).await
    }

    async fn get_settings(&self, entity: &EntityRef) -> Result<EntitySettings> {
        let enabled: Option<i64> = sqlx::query_scalar(
            "SELECT enabled FROM terminology_settings WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enabled
            .map(|enabled| EntitySettings { enabled: enabled != 0 })
            .unwrap_or_default())
    }

    async fn get_ab_assignment(&self, entity: &EntityRef) -> Result<Option<AbAssignment>> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT test_id, variant FROM ab_assignments WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity.entity_type.as_str())
        .bind(&entity.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(test_id, variant)| AbAssignment { test_id, variant }))
    }

    async fn get_ab_variant_terms(&self, test_id: &str, variant: &str) -> Result<Option<TermMap>> {
        let terms: Option<String> =
            sqlx::query_scalar("SELECT terms FROM ab_variants WHERE test_id = ? AND variant = ?")
                .bind(test_id)
                .bind(variant)
                .fetch_optional(&self.pool)
                .await?;

        match terms {
            Some(raw) => Ok(Some(term_map_from_json(serde_json::from_str(&raw)?)?)),
            None => Ok(None),
        }
    }
}

async fn parent_column(pool: &SqlitePool, sql: &str, id: &str) -> Result<Option<String>> {
    let parent: Option<Option<String>> = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(parent.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::OverrideBehavior;
    use crate::value::TermValue;
    use tempfile::TempDir;

    async fn open_repo() -> (TempDir, SqliteRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepository::open(&dir.path().join("lexicon.db")).await.unwrap();
        (dir, repo)
    }

    #[tokio::test]
    async fn test_defaults_seeded_once() {
        let (dir, repo) = open_repo().await;
        let seeded = repo.get_system_defaults().await.unwrap();
        assert!(!seeded.is_empty());
        drop(repo);

        let reopened = SqliteRepository::open(&dir.path().join("lexicon.db")).await.unwrap();
        assert_eq!(reopened.get_system_defaults().await.unwrap().len(), seeded.len());
    }

    #[tokio::test]
    async fn test_user_parent_prefers_team() {
        let (_dir, repo) = open_repo().await;
        repo.upsert_partner("P1", Some("Partner")).await.unwrap();
        repo.upsert_organization("O1", Some("P1")).await.unwrap();
        repo.upsert_company("C1", Some("O1")).await.unwrap();
        repo.upsert_team("T1", Some("C1")).await.unwrap();
        repo.upsert_user("U1", Some("T1"), Some("C1")).await.unwrap();
        repo.upsert_user("U2", None, Some("C1")).await.unwrap();

        let u1 = repo.get_parent(&EntityRef::new(EntityType::User, "U1")).await.unwrap();
        assert_eq!(u1, Some(EntityRef::new(EntityType::Team, "T1")));

        let u2 = repo.get_parent(&EntityRef::new(EntityType::User, "U2")).await.unwrap();
        assert_eq!(u2, Some(EntityRef::new(EntityType::Company, "C1")));

        let org = repo.get_parent(&EntityRef::new(EntityType::Organization, "O1")).await.unwrap();
        assert_eq!(org, Some(EntityRef::new(EntityType::Partner, "P1")));

        let partner = repo.get_parent(&EntityRef::new(EntityType::Partner, "P1")).await.unwrap();
        assert_eq!(partner, None);

        let unknown = repo.get_parent(&EntityRef::new(EntityType::Team, "nope")).await.unwrap();
        assert_eq!(unknown, None);
    }

    #[tokio::test]
    async fn test_prefix_delete_matches_literally() {
        let (_dir, repo) = open_repo().await;
        let team = EntityRef::new(EntityType::Team, "T1");
        let entry = |key: &str| TerminologyEntry::new("T1", key, "x", OverrideBehavior::Replace);
        repo.insert_entries(
            &team,
            &[entry("tool_terms.label"), entry("toolXterms.label"), entry("tool_terms")],
        )
        .await
        .unwrap();

        let removed = repo.delete_entries_by_prefix(&team, "tool_terms").await.unwrap();
        assert_eq!(removed, 2);

        let remaining = repo.get_entries(&team).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, "toolXterms.label");
    }

    #[tokio::test]
    async fn test_upsert_and_replace() {
        let (_dir, repo) = open_repo().await;
        let team = EntityRef::new(EntityType::Team, "T1");

        repo.insert_entries(&team, &[TerminologyEntry::new("T1", "a", "one", OverrideBehavior::Replace)])
            .await
            .unwrap();
        repo.insert_entries(&team, &[TerminologyEntry::new("T1", "a", "two", OverrideBehavior::Suggest)])
            .await
            .unwrap();

        let entries = repo.get_entries(&team).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, TermValue::from("two"));
        assert_eq!(entries[0].override_behavior, OverrideBehavior::Suggest);

        repo.replace_entries(&team, &[TerminologyEntry::new("T1", "b", "three", OverrideBehavior::Replace)])
            .await
            .unwrap();
        let keys: Vec<String> = repo.get_entries(&team).await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_settings_and_ab_round_trip() {
        let (_dir, repo) = open_repo().await;
        let company = EntityRef::new(EntityType::Company, "C1");

        assert!(repo.get_settings(&company).await.unwrap().enabled);
        repo.set_settings(&company, EntitySettings { enabled: false }).await.unwrap();
        assert!(!repo.get_settings(&company).await.unwrap().enabled);

        let assignment = AbAssignment {
            test_id: "onboarding".to_string(),
            variant: "b".to_string(),
        };
        repo.set_ab_assignment(&company, &assignment).await.unwrap();
        assert_eq!(repo.get_ab_assignment(&company).await.unwrap(), Some(assignment));

        let terms = term_map_from_json(serde_json::json!({"journeyTerms": {"mainUnit": {"singular": "mission"}}}))
            .unwrap();
        repo.put_ab_variant("onboarding", "b", &terms).await.unwrap();
        assert_eq!(repo.get_ab_variant_terms("onboarding", "b").await.unwrap(), Some(terms));
        assert_eq!(repo.get_ab_variant_terms("onboarding", "c").await.unwrap(), None);
    }
}
