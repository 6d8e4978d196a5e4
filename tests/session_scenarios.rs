//! End to end: CSV files on disk, loaded through a session, rendered as HTML and JSON.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use dsview::render;
use dsview::{
    CellValue, DVError, DatasetSource, FileDatasetLoader, LoadError, SearchError, SearchRequest,
    Session, ViewParams,
};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// `reviews/train.csv`: 25 rows, `label` is "pos" for the first 10.
fn reviews_csv() -> String {
    let mut csv = String::from("id,label,score,text\n");
    for i in 1..=25 {
        let label = if i <= 10 { "pos" } else { "neg" };
        let score = match i {
            1 => "3.5",
            2 => "3.50001",
            _ => "1.0",
        };
        let text = match i {
            3 => "a\\nb",
            4 => "x<y",
            _ => "plain",
        };
        csv.push_str(&format!("{i},{label},{score},{text}\n"));
    }
    csv
}

fn setup() -> (tempfile::TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("reviews/train.csv"), &reviews_csv());
    write(
        &dir.path().join("ids.csv"),
        &(40..50).fold(String::from("id,name\n"), |mut acc, i| {
            acc.push_str(&format!("{i},item{i}\n"));
            acc
        }),
    );
    write(
        &dir.path().join("glue/cola/validation.csv"),
        "sentence,label\nok,1\nnot ok,0\n",
    );
    let session = Session::new(Arc::new(FileDatasetLoader::new(dir.path())));
    (dir, session)
}

#[test]
fn first_page_of_unfiltered_dataset() {
    let (_dir, session) = setup();
    let summary = session.load(&DatasetSource::new("reviews")).unwrap();
    assert_eq!(summary.dataset_name, "reviews (train)");
    assert_eq!((summary.row_count, summary.column_count), (25, 4));

    let page = session.view(&ViewParams::default()).unwrap();
    assert_eq!(page.view.rows.len(), 10);
    assert_eq!(page.view.total_pages, 3);
    assert_eq!((page.view.start_row, page.view.end_row), (1, 10));
}

#[test]
fn filter_reduces_pages_and_clamps() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let params = ViewParams::default()
        .page(5)
        .filter_column("label")
        .filter_value("pos");
    let view = session.view(&params).unwrap().view;
    assert_eq!(view.total_rows, 10);
    assert_eq!(view.total_pages, 1);
    assert_eq!(view.page, 1);
    assert_eq!(view.original_total_rows, 25);
}

#[test]
fn numeric_filter_is_exact() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let params = ViewParams::default()
        .filter_column("score")
        .filter_value("3.5");
    let view = session.view(&params).unwrap().view;
    assert_eq!(view.total_rows, 1);
    assert_eq!(view.rows[0].index, 0);
}

#[test]
fn hidden_column_leaves_counts_alone() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let view = session
        .view(&ViewParams::default().hidden_columns(vec!["label".to_string()]))
        .unwrap()
        .view;
    assert!(view.rows.iter().all(|r| r.cells.iter().all(|(n, _)| n != "label")));
    assert!(view.all_columns.contains(&"label".to_string()));
    assert_eq!(view.total_rows, 25);
}

#[test]
fn search_matches_whole_values_only() {
    let (_dir, session) = setup();
    let request = |value: &str| SearchRequest {
        field: "id".into(),
        value: value.into(),
        dataset: Some(DatasetSource::new("ids.csv")),
    };

    let response = session.search(&request("42")).unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].get("id"), Some(&CellValue::Int(42)));
    assert_eq!(
        response.results[0].get("name"),
        Some(&CellValue::Str("item42".into()))
    );

    assert_eq!(session.search(&request("4")).unwrap().count, 0);
    // searching a named dataset does not load it into the session
    assert!(session.current().is_none());
}

#[test]
fn view_after_clear_fails() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    session.clear();
    assert!(matches!(
        session.view(&ViewParams::default()),
        Err(DVError::NoDataset)
    ));
}

#[test]
fn failed_load_keeps_current_dataset() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    assert!(matches!(
        session.load(&DatasetSource::new("reviews").with_split("test")),
        Err(LoadError::SplitNotFound { .. })
    ));
    assert!(matches!(
        session.load(&DatasetSource::new("nope")),
        Err(LoadError::NotFound(_))
    ));
    assert_eq!(session.dataset_name().as_deref(), Some("reviews (train)"));
}

#[test]
fn subset_and_split_layout() {
    let (_dir, session) = setup();
    let source = DatasetSource::parse("glue:cola@validation");
    let summary = session.load(&source).unwrap();
    assert_eq!(summary.dataset_name, "glue/cola (validation)");
    assert_eq!(summary.row_count, 2);
}

#[test]
fn html_output_is_formatted_and_escaped() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let page = session.view(&ViewParams::default()).unwrap();
    let html = render::html_table(&page.view);
    assert!(html.starts_with("<table class=\"table table-striped table-bordered\" id=\"dataset-table\">"));
    assert!(html.contains("<td>a<br>b</td>"));
    assert!(html.contains("<td>x&lt;y</td>"));
    assert!(html.contains("<th>label</th>"));
}

#[test]
fn json_output_carries_metadata() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let page = session
        .view(&ViewParams::default().page(3).filter_column("missing").filter_value("x"))
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&render::to_json(&page).unwrap()).unwrap();
    assert_eq!(json["dataset_name"], "reviews (train)");
    assert_eq!(json["page"], 3);
    assert_eq!(json["total_rows"], 25);
    assert_eq!(json["rows"].as_array().unwrap().len(), 5);
    assert!(json["warning"].as_str().unwrap().contains("missing"));
}

#[test]
fn json_output_keeps_text_unescaped() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let page = session.view(&ViewParams::default()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&render::to_json(&page).unwrap()).unwrap();
    assert_eq!(json["rows"][2]["text"], "a<br>b");
    assert_eq!(json["rows"][3]["text"], "x<y");
}

#[test]
fn unknown_search_field_lists_columns() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let err = session
        .search(&SearchRequest {
            field: "nope".into(),
            value: "1".into(),
            dataset: None,
        })
        .unwrap_err();
    assert!(matches!(err, SearchError::UnknownField { .. }));
    let body = render::search_error_json(&err);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["available_fields"],
        serde_json::json!(["id", "label", "score", "text"])
    );
}

#[test]
fn empty_search_parameters_are_rejected() {
    let (_dir, session) = setup();
    session.load(&DatasetSource::new("reviews")).unwrap();
    let err = session
        .search(&SearchRequest {
            field: "id".into(),
            value: String::new(),
            dataset: None,
        })
        .unwrap_err();
    assert!(matches!(err, SearchError::MissingParameter(_)));
    assert!(render::search_error_json(&err).get("available_fields").is_none());
}
