#![allow(dead_code)]

//! Shared test fixtures: group specs driven against the in-memory cluster.

use chartgroup_core::models::application_group::{
    Application, ApplicationGroup, ApplicationSpec, ChartRef, ChartStatus, DagEntry, Release,
};

pub use chartgroup_core::test_helpers::InMemoryCluster;

pub fn application(name: &str, dependencies: &[&str]) -> Application {
    Application {
        name: name.to_string(),
        dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        spec: ApplicationSpec {
            chart: ChartRef {
                url: "https://charts.example.com".to_string(),
                name: name.to_string(),
                version: "0.1.0".to_string(),
            },
            release: Release {
                target_namespace: name.to_string(),
                ..Release::default()
            },
            ..ApplicationSpec::default()
        },
    }
}

fn staged(version: &str) -> ChartStatus {
    ChartStatus {
        version: version.to_string(),
        staged: true,
        ..ChartStatus::default()
    }
}

/// The bookinfo scenario: `ambassador` with no dependencies, `bookinfo`
/// depending on it with four staged subcharts wired
/// productpage -> reviews -> {details, ratings}.
pub fn bookinfo_group() -> ApplicationGroup {
    let mut group = ApplicationGroup::new("bookinfo");
    group.generation = 1;

    let ambassador = application("ambassador", &[]);
    let mut bookinfo = application("bookinfo", &["ambassador"]);
    bookinfo.spec.subcharts = vec![
        DagEntry {
            name: "productpage".to_string(),
            dependencies: vec!["reviews".to_string()],
        },
        DagEntry {
            name: "reviews".to_string(),
            dependencies: vec!["details".to_string(), "ratings".to_string()],
        },
        DagEntry {
            name: "ratings".to_string(),
            dependencies: vec![],
        },
        DagEntry {
            name: "details".to_string(),
            dependencies: vec![],
        },
    ];

    group.spec.applications = vec![ambassador, bookinfo];
    group.init_status();

    let bookinfo_status = group.application_status_mut("bookinfo").unwrap();
    for subchart in ["productpage", "reviews", "ratings", "details"] {
        bookinfo_status
            .subcharts
            .insert(subchart.to_string(), staged("1.16.0"));
    }
    group
}
