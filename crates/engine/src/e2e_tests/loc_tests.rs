//! `/loc/...` listings, stats and legacy patches.

use axum::http::{Method, StatusCode};
use serde_json::json;

use divemap_domain::{AdminLevel, LegacyId, NewLegacyRow};

use super::{item_names, E2EContext};
use crate::infrastructure::ports::LegacyRepo;

#[tokio::test]
async fn health_is_ok() {
    let ctx = E2EContext::seeded().await;
    let (status, _) = ctx.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn santa_monica_is_scoped_by_ancestors_not_siblings() {
    let ctx = E2EContext::seeded().await;

    let (status, us) = ctx.get("/loc/us?type=spots").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(us["kind"], "listing");
    assert_eq!(us["spots"]["total"], 3);
    assert!(item_names(&us["spots"]).contains(&"Santa Monica Pier".to_string()));
    assert!(us.get("shops").is_none());

    let (_, ca) = ctx.get("/loc/us/ca").await;
    assert_eq!(
        item_names(&ca["spots"]),
        vec!["Catalina Casino Point", "Santa Monica Pier"]
    );
    assert_eq!(item_names(&ca["shops"]), vec!["Blue Ocean Dive"]);

    let (_, ny) = ctx.get("/loc/us/ny").await;
    assert_eq!(item_names(&ny["spots"]), vec!["Dutch Springs"]);
    assert_eq!(ny["shops"]["total"], 0);

    let (_, sm) = ctx.get("/loc/us/ca/la/santa-monica").await;
    assert_eq!(item_names(&sm["spots"]), vec!["Santa Monica Pier"]);
}

#[tokio::test]
async fn sort_and_paging_follow_the_query() {
    let ctx = E2EContext::seeded().await;

    let (_, top) = ctx.get("/loc/us?type=spots").await;
    assert_eq!(
        item_names(&top["spots"]),
        vec!["Catalina Casino Point", "Santa Monica Pier", "Dutch Springs"]
    );

    let (_, reviewed) = ctx
        .get("/loc/us?type=spots&sort=most_reviewed&limit=2")
        .await;
    assert_eq!(reviewed["limit"], 2);
    assert_eq!(
        item_names(&reviewed["spots"]),
        vec!["Dutch Springs", "Catalina Casino Point"]
    );
    assert_eq!(reviewed["spots"]["total"], 3);

    let (_, second_page) = ctx
        .get("/loc/us?type=spots&sort=most_reviewed&limit=2&offset=2")
        .await;
    assert_eq!(item_names(&second_page["spots"]), vec!["Santa Monica Pier"]);
}

#[tokio::test]
async fn limit_is_clamped_to_the_configured_maximum() {
    let ctx = E2EContext::seeded().await;
    let (status, body) = ctx.get("/loc/us?limit=5000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 100);
}

#[tokio::test]
async fn same_short_name_resolves_by_position() {
    let ctx = E2EContext::seeded().await;

    let (_, country) = ctx.get("/loc/georgia").await;
    assert_eq!(country["node"]["id"], ctx.seeded.node("country-georgia").get());
    assert_eq!(country["node"]["admin_level"], 0);

    let (_, state) = ctx.get("/loc/us/georgia").await;
    assert_eq!(state["node"]["id"], ctx.seeded.node("us-georgia").get());
    assert_eq!(state["node"]["admin_level"], 1);

    // No fallback to a same-named node elsewhere in the tree.
    let (status, _) = ctx.get("/loc/georgia/ca").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trailing_spot_segment_falls_back_to_the_spot() {
    let ctx = E2EContext::seeded().await;
    let pier = ctx.seeded.place("Santa Monica Pier");

    let (status, body) = ctx
        .get(&format!("/loc/us/ca/santa-monica-pier-{}", pier))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "spot");
    assert_eq!(body["spot"]["id"], pier.get());
    assert_eq!(body["within"], "us/ca");

    // The spot is not under New York.
    let (status, _) = ctx
        .get(&format!("/loc/us/ny/santa-monica-pier-{}", pier))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let ctx = E2EContext::seeded().await;
    for uri in ["/loc/atlantis", "/loc/us/ca/la/santa-monica/pier/extra"] {
        let (status, body) = ctx.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn bad_query_values_are_bad_requests() {
    let ctx = E2EContext::seeded().await;
    for uri in ["/loc/us?type=boats", "/loc/us?sort=random", "/loc/us?limit=ten"] {
        let (status, _) = ctx.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn stats_break_counts_down_by_child() {
    let ctx = E2EContext::seeded().await;

    let (status, stats) = ctx.get("/loc/us/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["spot_count"], 3);
    assert_eq!(stats["shop_count"], 1);

    let children = stats["children"].as_array().unwrap();
    let ca = children
        .iter()
        .find(|c| c["short_name"] == "ca")
        .unwrap();
    assert_eq!(ca["spot_count"], 2);
    assert_eq!(ca["shop_count"], 1);
    let georgia = children
        .iter()
        .find(|c| c["short_name"] == "georgia")
        .unwrap();
    assert_eq!(georgia["spot_count"], 0);

    let (status, _) = ctx.get("/loc/atlantis/stats").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn legacy_rows_are_patched_by_table_name() {
    let ctx = E2EContext::seeded().await;
    ctx.repos
        .legacy
        .insert(&NewLegacyRow::new(AdminLevel::Country, "United States", "us").with_id(LegacyId::new(1)))
        .await
        .unwrap();
    ctx.repos
        .legacy
        .insert(
            &NewLegacyRow::new(AdminLevel::State, "Calif", "ca")
                .with_id(LegacyId::new(10))
                .with_country(LegacyId::new(1)),
        )
        .await
        .unwrap();

    let (status, row) = ctx
        .send(
            Method::PATCH,
            "/loc/area_one/patch",
            Some(json!({ "id": 10, "name": "California" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["name"], "California");
    assert_eq!(row["short_name"], "ca");

    let (status, _) = ctx
        .send(
            Method::PATCH,
            "/loc/area_one/patch",
            Some(json!({ "id": 99, "name": "Nowhere" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send(Method::PATCH, "/loc/continent/patch", Some(json!({ "id": 1, "name": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send(Method::PATCH, "/loc/area_one/patch", Some(json!({ "id": 10 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
