//! About page content

use super::{ConvertContext, PassStats};
use crate::error::{Error, Result};
use crate::progress::PassProgress;
use crate::source::SourceContent;
use crate::target::insert_about;
use sqlx::{Connection, SqliteConnection};
use tracing::info;

/// Escape text for inclusion in HTML element content or attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render plain text as `<p>` paragraphs, one per blank-line separated block
pub fn paragraphs_to_html(text: &str) -> String {
    escape_html(text)
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", p))
        .collect()
}

/// One `about` row per content document
pub async fn convert_about(
    conn: &mut SqliteConnection,
    ctx: &ConvertContext<'_>,
) -> Result<PassStats> {
    let mut stats = PassStats::new("about");
    let editor = ctx.service_user_id(conn).await?;
    let progress = PassProgress::start(ctx.snapshot.content.len(), "about");

    for content in &ctx.snapshot.content {
        let mut savepoint = conn.begin().await?;
        let outcome = insert_content(&mut savepoint, content, editor).await;
        stats
            .settle(savepoint, outcome, &content.id, content.name.as_deref())
            .await?;
        progress.advance();
    }
    progress.finish("about done");

    info!(
        "Migrated {} about entries ({} skipped)",
        stats.converted,
        stats.skipped.len()
    );
    Ok(stats)
}

async fn insert_content(
    conn: &mut SqliteConnection,
    content: &SourceContent,
    editor: Option<i64>,
) -> Result<i64> {
    let details = content.details.as_deref().ok_or(Error::MissingField {
        entity: "content",
        field: "details",
    })?;
    insert_about(conn, &paragraphs_to_html(details), editor).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::convert::users::{convert_users, seed_roles};
    use crate::source::SourceSnapshot;
    use crate::target::tests::setup_test_db;

    #[test]
    fn test_paragraphs() {
        assert_eq!(
            paragraphs_to_html("Welcome to CMG.\n\n  Data <b>is</b> \"safe\" & sound \n\n\n\nBye"),
            "<p>Welcome to CMG.</p><p>Data &lt;b&gt;is&lt;/b&gt; &quot;safe&quot; &amp; sound</p><p>Bye</p>"
        );
        assert_eq!(paragraphs_to_html("it's\nfine"), "<p>it&#x27;s\nfine</p>");
        assert_eq!(paragraphs_to_html("\n\n"), "");
    }

    #[tokio::test]
    async fn test_about_rows_use_service_account() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config::default();
        let snapshot = SourceSnapshot {
            content: vec![
                SourceContent {
                    id: "c1".to_string(),
                    name: Some("about".to_string()),
                    details: Some("One\n\nTwo".to_string()),
                },
                SourceContent {
                    id: "c2".to_string(),
                    name: Some("empty".to_string()),
                    details: None,
                },
            ],
            ..Default::default()
        };
        let ctx = ConvertContext::new(&config, &snapshot);
        let mut tx = db.begin().await.unwrap();

        seed_roles(&mut tx).await.unwrap();
        convert_users(&mut tx, &ctx).await.unwrap();
        let stats = convert_about(&mut tx, &ctx).await.unwrap();
        assert_eq!(stats.converted, 1);
        assert_eq!(stats.skipped[0].id, "c2");

        let (html, editor): (String, String) = sqlx::query_as(
            r#"SELECT a.html, u.username FROM about a JOIN "user" u ON u.id = a.last_updated_by_id"#,
        )
        .fetch_one(&mut *tx)
        .await
        .unwrap();
        assert_eq!(html, "<p>One</p><p>Two</p>");
        assert_eq!(editor, "cmguser");
    }
}
