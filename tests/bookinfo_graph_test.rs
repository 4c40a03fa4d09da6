//! End-to-end graph and template assertions for the bookinfo scenario.

mod common;

use chartgroup_core::constants::ENTRYPOINT_TEMPLATE_NAME;
use chartgroup_core::graph::Graph;
use chartgroup_core::templates;
use common::bookinfo_group;

#[test]
fn forward_graph_builds_expected_nodes() {
    let graph = Graph::forward(&bookinfo_group());

    let ambassador = graph.app("ambassador").unwrap();
    assert_eq!(ambassador.tasks.len(), 1);
    assert!(ambassador.task("ambassador-ambassador").is_some());

    let bookinfo = graph.app("bookinfo").unwrap();
    assert_eq!(bookinfo.dependencies, vec!["ambassador".to_string()]);
    assert_eq!(bookinfo.tasks.len(), 5);

    let own_task = bookinfo.task("bookinfo-bookinfo").unwrap();
    let mut own_deps = own_task.dependencies.clone();
    own_deps.sort();
    assert_eq!(
        own_deps,
        vec![
            "bookinfo-details",
            "bookinfo-productpage",
            "bookinfo-ratings",
            "bookinfo-reviews",
        ]
    );

    assert_eq!(
        bookinfo.task("bookinfo-productpage").unwrap().dependencies,
        vec!["bookinfo-reviews".to_string()]
    );

    let mut reviews_deps = bookinfo.task("bookinfo-reviews").unwrap().dependencies.clone();
    reviews_deps.sort();
    assert_eq!(reviews_deps, vec!["bookinfo-details", "bookinfo-ratings"]);

    assert!(bookinfo.task("bookinfo-ratings").unwrap().dependencies.is_empty());
    assert!(bookinfo.task("bookinfo-details").unwrap().dependencies.is_empty());

    // Every staged subchart is disabled in the parent's own values.
    for subchart in ["productpage", "reviews", "ratings", "details"] {
        assert!(own_task.release.values.subchart_disabled(subchart));
    }
}

#[test]
fn entrypoint_template_orders_applications() {
    let graph = Graph::forward(&bookinfo_group());
    let (entry, templates) = templates::generate_templates(&graph, "workflows", None).unwrap();

    assert_eq!(entry.name, ENTRYPOINT_TEMPLATE_NAME);
    let dag = entry.dag.unwrap();
    assert_eq!(dag.tasks.len(), 2);
    assert!(dag.task("ambassador").unwrap().dependencies.is_empty());
    assert_eq!(
        dag.task("bookinfo").unwrap().dependencies,
        vec!["ambassador".to_string()]
    );

    // One template per application plus the shared executor template.
    assert!(templates.iter().any(|t| t.name == "ambassador"));
    assert!(templates.iter().any(|t| t.name == "bookinfo"));
    assert!(templates.iter().any(|t| t.name == "helmrelease-forward-executor"));

    let bookinfo = templates.iter().find(|t| t.name == "bookinfo").unwrap();
    assert_eq!(bookinfo.dag.as_ref().unwrap().tasks.len(), 5);
}

#[test]
fn reverse_graph_inverts_both_levels() {
    let graph = Graph::forward(&bookinfo_group()).reverse();

    assert_eq!(
        graph.app("ambassador").unwrap().dependencies,
        vec!["bookinfo".to_string()]
    );
    assert!(graph.app("bookinfo").unwrap().dependencies.is_empty());

    let bookinfo = graph.app("bookinfo").unwrap();
    assert!(bookinfo.task("bookinfo-bookinfo").unwrap().dependencies.is_empty());
    assert_eq!(
        bookinfo.task("bookinfo-productpage").unwrap().dependencies,
        vec!["bookinfo-bookinfo".to_string()]
    );

    let mut reviews_deps = bookinfo.task("bookinfo-reviews").unwrap().dependencies.clone();
    reviews_deps.sort();
    assert_eq!(reviews_deps, vec!["bookinfo-bookinfo", "bookinfo-productpage"]);

    for name in ["bookinfo-details", "bookinfo-ratings"] {
        let deps = &bookinfo.task(name).unwrap().dependencies;
        assert!(deps.contains(&"bookinfo-reviews".to_string()), "{name} must wait for reviews");
        assert!(deps.contains(&"bookinfo-bookinfo".to_string()));
    }

    // Teardown uses the inverse executors.
    assert!(graph.all_executors.contains_key("helmrelease-reverse-executor"));
}

#[test]
fn subchart_chart_names_are_label_safe() {
    let graph = Graph::forward(&bookinfo_group());
    let bookinfo = graph.app("bookinfo").unwrap();
    for task in bookinfo.tasks.values() {
        if task.is_subchart_task() {
            assert!(task.chart_name.len() <= 63);
            assert_eq!(task.chart_name, task.chart_name.to_lowercase());
            assert!(!task.chart_name.contains('_'));
        }
    }
}
