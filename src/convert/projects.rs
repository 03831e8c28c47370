//! Projects and their user and dataset links

use super::{ConvertContext, PassStats};
use crate::error::{Error, Result};
use crate::progress::PassProgress;
use crate::source::SourceProject;
use crate::target::{
    format_timestamp, insert_project, link_project_dataset, link_project_user, slug_exists,
    DatasetType, NewProject,
};
use regex::Regex;
use sqlx::{Connection, SqliteConnection};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info};
use uuid::Uuid;

static NON_SLUG: OnceLock<Regex> = OnceLock::new();

/// Lowercase `name` and collapse every run of other characters into `-`
pub fn slugify(name: &str) -> String {
    let re = NON_SLUG.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));
    let lowered = name.to_lowercase();
    let slug = re.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug.to_string()
    }
}

/// First of `base`, `base-2`, `base-3`, ... not used by another project
pub async fn unique_slug(
    conn: &mut SqliteConnection,
    base: &str,
    max_attempts: u32,
) -> Result<String> {
    for attempt in 1..=max_attempts {
        let candidate = if attempt == 1 {
            base.to_string()
        } else {
            format!("{}-{}", base, attempt)
        };
        if !slug_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
    }

    Err(Error::NameProbeExhausted {
        name: base.to_string(),
        attempts: max_attempts,
    })
}

/// Projects with their members and data products
pub async fn convert_projects(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<PassStats> {
    let mut stats = PassStats::new("projects");
    let progress = PassProgress::start(ctx.snapshot.projects.len(), "projects");

    for project in &ctx.snapshot.projects {
        let mut savepoint = conn.begin().await?;
        let outcome = insert_cmg_project(&mut savepoint, ctx, project, &mut stats).await;
        stats
            .settle(savepoint, outcome, &project.id, project.name.as_deref())
            .await?;
        progress.advance();
    }
    progress.finish("projects done");

    info!(
        "Migrated {} projects ({} skipped)",
        stats.converted,
        stats.skipped.len()
    );
    Ok(stats)
}

/// Insert a project with its links.
///
/// Data products that cannot be resolved are recorded in `stats` and the
/// project is migrated without them.
async fn insert_cmg_project(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
    project: &SourceProject,
    stats: &mut PassStats,
) -> Result<String> {
    let name = project.name.clone().ok_or(Error::MissingField {
        entity: "project",
        field: "name",
    })?;
    let slug = unique_slug(
        conn,
        &slugify(&name),
        ctx.config.datasets.max_duplicate_attempts,
    )
    .await?;

    let id = Uuid::new_v4().to_string();
    insert_project(
        conn,
        &NewProject {
            id: id.clone(),
            name: name.clone(),
            slug,
            description: project.description.clone(),
            browser_enabled: project.browser.unwrap_or(false),
            created_at: project.created_at.as_ref().map(format_timestamp),
            updated_at: project.updated_at.as_ref().map(format_timestamp),
        },
    )
    .await?;

    let mut users_linked = 0;
    for cmg_user in project_members(ctx, project) {
        match ctx.user_id_for(conn, cmg_user).await? {
            Some(user_id) => {
                link_project_user(conn, &id, user_id).await?;
                users_linked += 1;
            }
            None => debug!("Project '{}': user {} was not migrated", name, cmg_user),
        }
    }

    let product_index = ctx.snapshot.dataset_index(DatasetType::DataProduct);
    let mut datasets_linked = 0;
    for product_id in &project.dataproducts {
        let resolved = ctx
            .matcher
            .resolve_reference(conn, product_id, DatasetType::DataProduct, &product_index)
            .await;
        if let Some(dataset) = stats.absorb(resolved, product_id, Some(&name))? {
            link_project_dataset(conn, &id, dataset.id).await?;
            datasets_linked += 1;
        }
    }

    debug!(
        "Project '{}': {} users, {} datasets",
        name, users_linked, datasets_linked
    );
    Ok(id)
}

/// Direct members followed by the members of the project's groups, without repeats
fn project_members<'a>(ctx: &ConvertContext<'a>, project: &'a SourceProject) -> Vec<&'a str> {
    let groups = ctx.snapshot.group_index();
    let mut seen = HashSet::new();

    let from_groups = project.groups.iter().flat_map(|group_id| match groups.get(group_id.as_str()) {
        Some(group) => group.members.iter().map(String::as_str).collect::<Vec<_>>(),
        None => {
            debug!("Unknown group {}", group_id);
            Vec::new()
        }
    });

    project
        .users
        .iter()
        .map(String::as_str)
        .chain(from_groups)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::convert::datasets::convert_datasets;
    use crate::convert::users::{convert_users, seed_roles};
    use crate::resolve::NamingState;
    use crate::source::{SourceDataset, SourceGroup, SourceSnapshot, SourceUser};
    use crate::target::tests::setup_test_db;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Cancer Genomics 2021"), "cancer-genomics-2021");
        assert_eq!(slugify("  --Hello,  World!-- "), "hello-world");
        assert_eq!(slugify("***"), "project");
        assert_eq!(slugify("RNA-Seq ÜBER Run"), "rna-seq-ber-run");
    }

    fn user(id: &str, username: &str) -> SourceUser {
        SourceUser {
            id: id.to_string(),
            username: Some(username.to_string()),
            email: Some(format!("{}@example.org", username)),
            active: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_projects_with_links() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();
        let project = |id: &str, name: Option<&str>| SourceProject {
            id: id.to_string(),
            name: name.map(str::to_string),
            ..Default::default()
        };
        let snapshot = SourceSnapshot {
            users: vec![user("u1", "alice"), user("u2", "bob"), user("u3", "carol")],
            groups: vec![SourceGroup {
                id: "g1".to_string(),
                name: Some("lab".to_string()),
                members: vec!["u2".to_string(), "u1".to_string(), "u9".to_string()],
            }],
            data_products: vec![SourceDataset {
                id: "p1".to_string(),
                name: Some("fastq".to_string()),
                ..Default::default()
            }],
            projects: vec![
                SourceProject {
                    users: vec!["u1".to_string()],
                    groups: vec!["g1".to_string()],
                    dataproducts: vec!["p1".to_string(), "gone".to_string()],
                    browser: Some(true),
                    ..project("pr1", Some("Genome Study"))
                },
                project("pr2", Some("genome study")),
                project("pr3", None),
            ],
            ..Default::default()
        };
        let ctx = ConvertContext::new(&config, &snapshot);
        let mut tx = db.begin().await.unwrap();

        seed_roles(&mut tx).await.unwrap();
        convert_users(&mut tx, &ctx).await.unwrap();
        convert_datasets(&mut tx, &ctx, DatasetType::DataProduct, &mut NamingState::new())
            .await
            .unwrap();

        let stats = convert_projects(&mut tx, &ctx).await.unwrap();
        assert_eq!(stats.converted, 2);
        let skipped: Vec<_> = stats.skipped.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(skipped, vec!["gone", "pr3"]);

        let slugs: Vec<String> = sqlx::query_scalar("SELECT slug FROM project ORDER BY slug")
            .fetch_all(&mut *tx)
            .await
            .unwrap();
        assert_eq!(slugs, vec!["genome-study", "genome-study-2"]);

        let members: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM project_user pu JOIN project p ON p.id = pu.project_id WHERE p.slug = 'genome-study'",
        )
        .fetch_one(&mut *tx)
        .await
        .unwrap();
        assert_eq!(members, 2);

        let datasets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_dataset")
            .fetch_one(&mut *tx)
            .await
            .unwrap();
        assert_eq!(datasets, 1);
    }
}
