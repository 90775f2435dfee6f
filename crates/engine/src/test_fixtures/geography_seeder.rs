//! Seeds a small node tree with spots and shops.
//!
//! ```text
//! us ── ca ── la ── santa-monica   (spot "Santa Monica Pier", shop "Blue Ocean Dive")
//!  │           └──────────────────  (spot "Catalina Casino Point" on the county)
//!  ├── ny                          (spot "Dutch Springs")
//!  └── georgia                     (state)
//! georgia                          (country, same short name as the state)
//! ```

use std::collections::HashMap;

use divemap_domain::{
    GeographicNode, NewGeographicNode, NewPlace, NodeId, NodeName, PlaceId, PlaceKind, ShortName,
};

use crate::infrastructure::ports::{NodeRepo, PlaceRepo};
use crate::infrastructure::sqlite::SqliteRepositories;

/// Ids of everything the seeder wrote, keyed by short name (nodes) or
/// display name (places). `country-georgia` and `us-georgia` disambiguate
/// the two Georgias.
#[derive(Debug, Clone, Default)]
pub struct SeededGeography {
    pub nodes: HashMap<String, NodeId>,
    pub places: HashMap<String, PlaceId>,
}

impl SeededGeography {
    pub fn node(&self, key: &str) -> NodeId {
        self.nodes[key]
    }

    pub fn place(&self, name: &str) -> PlaceId {
        self.places[name]
    }
}

async fn root(repos: &SqliteRepositories, name: &str, short: &str) -> GeographicNode {
    let node = NewGeographicNode::root(
        NodeName::new(name).unwrap(),
        ShortName::new(short).unwrap(),
    );
    repos.node.insert(&node).await.unwrap()
}

async fn child(
    repos: &SqliteRepositories,
    parent: &GeographicNode,
    name: &str,
    short: &str,
) -> GeographicNode {
    let node = NewGeographicNode::child_of(
        parent,
        NodeName::new(name).unwrap(),
        ShortName::new(short).unwrap(),
    )
    .unwrap();
    repos.node.insert(&node).await.unwrap()
}

async fn place(
    repos: &SqliteRepositories,
    seeded: &mut SeededGeography,
    kind: PlaceKind,
    name: &str,
    node: &GeographicNode,
    avg_rating: f64,
    num_reviews: i64,
) {
    let place = repos
        .place
        .insert(
            &NewPlace::new(kind, name)
                .in_node(node.id)
                .with_rating(avg_rating, num_reviews),
        )
        .await
        .unwrap();
    seeded.places.insert(name.to_string(), place.id);
}

/// Write the fixture tree into an empty store.
pub async fn seed_geography(repos: &SqliteRepositories) -> SeededGeography {
    let mut seeded = SeededGeography::default();

    let us = root(repos, "United States", "us").await;
    let ca = child(repos, &us, "California", "ca").await;
    let ny = child(repos, &us, "New York", "ny").await;
    let us_georgia = child(repos, &us, "Georgia", "georgia").await;
    let la = child(repos, &ca, "Los Angeles County", "la").await;
    let santa_monica = child(repos, &la, "Santa Monica", "santa-monica").await;
    let country_georgia = root(repos, "Georgia", "georgia").await;

    for (key, node) in [
        ("us", &us),
        ("ca", &ca),
        ("ny", &ny),
        ("us-georgia", &us_georgia),
        ("la", &la),
        ("santa-monica", &santa_monica),
        ("country-georgia", &country_georgia),
    ] {
        seeded.nodes.insert(key.to_string(), node.id);
    }

    place(repos, &mut seeded, PlaceKind::Spot, "Santa Monica Pier", &santa_monica, 4.2, 12).await;
    place(repos, &mut seeded, PlaceKind::Spot, "Catalina Casino Point", &la, 4.8, 40).await;
    place(repos, &mut seeded, PlaceKind::Spot, "Dutch Springs", &ny, 3.9, 55).await;
    place(repos, &mut seeded, PlaceKind::Shop, "Blue Ocean Dive", &santa_monica, 4.6, 8).await;

    seeded
}
