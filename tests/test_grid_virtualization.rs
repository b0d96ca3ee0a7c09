mod common;

use common::{run_opts, runner_for, scenario_from};
use flowscribe::driver::mock::{MockDom, MockElement, VirtualGrid};
use indexmap::IndexMap;

fn grid_dom(total_rows: usize, window: usize) -> MockDom {
    let dom = MockDom::new();
    let mut grid = MockElement::new(100);
    grid.test_id = Some("orders-grid".to_string());
    dom.add(grid);

    let rows: Vec<IndexMap<String, String>> = (0..total_rows)
        .map(|i| {
            let mut row = IndexMap::new();
            row.insert("id".to_string(), format!("order-{i}"));
            row.insert("status".to_string(), "open".to_string());
            row
        })
        .collect();
    dom.set_grid(VirtualGrid {
        container: 100,
        rows,
        window_start: 0,
        window_size: 250,
    });
    dom
}

#[tokio::test(flavor = "multi_thread")]
async fn deep_row_is_found_after_scrolling() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = grid_dom(10_000, 250);
    let runner = runner_for(&dom);
    let scenario = scenario_from(
        r"
title: grid
baseUrl: https://example.com
steps:
  - clickWijmoGridCell:
      name: click-order-7500
      grid: { testId: orders-grid }
      rowKey: { column: id, equals: order-7500 }
      column: status
",
    );

    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();

    assert!(result.passed(), "step failed: {:?}", result.steps[0].error);
    let recorded = dom.recorded();
    assert_eq!(recorded.grid_clicks, vec![(7500, "status".to_string())]);
    assert!(recorded.grid_scrolls >= 1, "at least one intermediate scroll");

    // The scrolls show up in the run log.
    let log = std::fs::read_to_string(result.artifacts_dir.join("logs/runner.log")).unwrap();
    assert!(log.contains("scrolled grid"), "log records scrolling:\n{log}");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_row_fails_after_bounded_scrolling() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = grid_dom(500, 250);
    let runner = runner_for(&dom);
    let scenario = scenario_from(
        r"
title: grid miss
baseUrl: https://example.com
steps:
  - clickWijmoGridCell:
      name: click-ghost
      grid: { testId: orders-grid }
      rowKey: { column: id, equals: order-99999 }
      column: status
",
    );

    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();
    assert!(!result.passed());
    let error = result.steps[0].error.as_deref().unwrap();
    assert!(error.contains("order-99999"), "{error}");
    assert!(dom.recorded().grid_clicks.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn overlay_option_is_picked_after_trigger_click() {
    let tmp = tempfile::tempdir().unwrap();
    let dom = MockDom::new();

    let mut trigger = MockElement::new(1);
    trigger.test_id = Some("country-combo".to_string());
    dom.add(trigger);

    let mut list = MockElement::new(2);
    list.css = vec![".country-list".to_string()];
    list.visible = false;
    list.shown_by_click = Some(1);
    dom.add(list);

    for (id, text) in [(3, "Japan"), (4, "Jordan")] {
        let mut option = MockElement::new(id);
        option.text = text.to_string();
        option.parent = Some(2);
        option.visible = false;
        option.shown_by_click = Some(1);
        dom.add(option);
    }

    let runner = runner_for(&dom);
    let scenario = scenario_from(
        r"
title: overlay
baseUrl: https://example.com
steps:
  - selectOverlayOption:
      name: select-country
      open: { testId: country-combo }
      list: { css: .country-list }
      optionText: Japan
",
    );

    let result = runner
        .run_scenario(&scenario, &run_opts(tmp.path()))
        .await
        .unwrap();
    assert!(result.passed(), "step failed: {:?}", result.steps[0].error);
    // Trigger first, then exactly the Japan option.
    assert_eq!(dom.recorded().clicks, vec![1, 3]);
}
