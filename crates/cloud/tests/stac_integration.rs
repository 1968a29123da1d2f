//! Integration tests against live STAC catalogs.
//!
//! Tests marked `#[ignore]` require network access to real STAC catalogs.
//! Run with: `cargo test -p urbanlens-cloud -- --ignored stac`

use urbanlens_cloud::scene::{find_scene, select_best, DateWindow, FallbackPolicy, SceneQuery};
use urbanlens_cloud::stac_client::{StacCatalog, StacClient, StacClientOptions};
use urbanlens_cloud::stac_models::StacSearchParams;
use urbanlens_cloud::{Aoi, ExportKind, StacClientBlocking, LANDSAT_C2_L2, SENTINEL2_L2A};

fn sector14() -> Aoi {
    Aoi::from_polygon(&[
        [77.0439461, 28.4684192],
        [77.0554358, 28.4734241],
        [77.0494004, 28.4814748],
        [77.033792, 28.4638508],
        [77.0439461, 28.4684192],
    ])
    .expect("valid polygon")
}

/// Search Earth Search for Sentinel-2 scenes over Sector 14.
#[tokio::test]
#[ignore]
async fn stac_earth_search_sentinel2() {
    let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default())
        .expect("failed to create client");

    let window = DateWindow::parse("2024-01-01", "2024-02-01").unwrap();
    let params = SceneQuery::new(SENTINEL2_L2A, sector14(), window)
        .with_limit(10)
        .to_search_params();

    let results = client.search(&params).await.expect("search failed");

    println!("Found {} items", results.len());
    assert!(!results.is_empty(), "should find at least one item");

    for item in &results.features {
        println!(
            "  {} date={:?} cc={:?}",
            item.id,
            item.acquisition_date(),
            item.cloud_cover()
        );
        assert!(item.cloud_cover().unwrap_or(0.0) < 30.0);
        for key in ExportKind::TrueColor.asset_keys() {
            assert!(item.asset(key).is_some(), "missing asset {key}");
        }
    }
    assert!(select_best(&results.features, 30.0).is_some());
}

/// Landsat surface temperature scenes, found through the blocking client.
#[test]
#[ignore]
fn stac_landsat_blocking_with_fallback() {
    let client = StacClientBlocking::new(StacCatalog::EarthSearch, StacClientOptions::default())
        .expect("failed to create client");

    let window = DateWindow::parse("2022-01-01", "2022-02-01").unwrap();
    let query = SceneQuery::new(LANDSAT_C2_L2, sector14(), window);
    let (item, used_fallback) =
        find_scene(&client, &query, Some(FallbackPolicy::default())).expect("no scene");

    println!("{} fallback={}", item.id, used_fallback);
    assert!(item.asset("lwir11").is_some());
    assert!(item.epsg().is_some());
}

/// Test paginated search.
#[tokio::test]
#[ignore]
async fn stac_paginated_search() {
    let opts = StacClientOptions {
        max_items: 15,
        ..Default::default()
    };

    let client = StacClient::new(StacCatalog::EarthSearch, opts).expect("failed to create client");

    let params = StacSearchParams::new()
        .bbox([77.03, 28.46, 77.06, 28.48])
        .datetime("2024-01-01T00:00:00Z/2024-12-31T23:59:59Z")
        .collection(SENTINEL2_L2A)
        .limit(5);

    let items = client.search_all(&params).await.expect("search_all failed");

    println!("Fetched {} items across pages", items.len());
    assert!(items.len() > 5, "should have fetched more than one page");
    assert!(items.len() <= 15, "should respect max_items");
}
