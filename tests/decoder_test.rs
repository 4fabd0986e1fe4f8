use serde_json::json;

use eurostat_connector::error::ConnectorError;
use eurostat_connector::jsonstat::{Dataset, JsonStatResponse};

fn dataset_from(value: serde_json::Value) -> Dataset {
    serde_json::from_value::<JsonStatResponse>(value)
        .expect("response should deserialize")
        .validate()
        .expect("response should validate")
}

fn geo_time_response(values: serde_json::Value) -> serde_json::Value {
    json!({
        "label": "test dataset",
        "id": ["geo", "time"],
        "size": [2, 3],
        "dimension": {
            "geo": {
                "label": "Geography",
                "category": {
                    "index": {"A": 0, "B": 1},
                    "label": {"A": "Austria", "B": "Belgium"}
                }
            },
            "time": {
                "label": "Time",
                "category": {
                    "index": {"2020": 0, "2021": 1, "2022": 2},
                    "label": {"2020": "2020", "2021": "2021", "2022": "2022"}
                }
            }
        },
        "value": values
    })
}

#[test]
fn test_dense_array_emits_full_cross_product_with_time_varying_fastest() {
    // Given: A 2x3 dense array with six values in serialization order
    let dataset = dataset_from(geo_time_response(json!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])));

    // When: Decoding to rows
    let rows = dataset.decode();

    // Then: Exactly product(sizes) rows come out, last dimension fastest
    assert_eq!(rows.len(), 6, "dense 2x3 array should yield 6 rows");

    let expected = [
        ("Austria", "2020", 1.0),
        ("Austria", "2021", 2.0),
        ("Austria", "2022", 3.0),
        ("Belgium", "2020", 4.0),
        ("Belgium", "2021", 5.0),
        ("Belgium", "2022", 6.0),
    ];
    for (row, (geo, time, value)) in rows.iter().zip(expected) {
        assert_eq!(row.categories[0].as_deref(), Some(geo));
        assert_eq!(row.categories[1].as_deref(), Some(time));
        assert_eq!(row.value, Some(value));
    }
}

#[test]
fn test_dense_array_with_all_categories_declared_has_no_null_labels() {
    let dataset = dataset_from(geo_time_response(json!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])));

    for row in dataset.decode() {
        for cell in &row.categories {
            assert!(cell.is_some(), "all labels should resolve: {:?}", row);
        }
    }
}

#[test]
fn test_sparse_array_emits_one_row_per_present_key() {
    // Given: A sparse container holding only two of the six cells
    let dataset = dataset_from(geo_time_response(json!({"0": 1.5, "4": 9.5})));

    // When
    let rows = dataset.decode();

    // Then: Two rows, addressed by their unraveled indices
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].categories[0].as_deref(), Some("Austria"));
    assert_eq!(rows[0].categories[1].as_deref(), Some("2020"));
    assert_eq!(rows[0].value, Some(1.5));
    assert_eq!(rows[1].categories[0].as_deref(), Some("Belgium"));
    assert_eq!(rows[1].categories[1].as_deref(), Some("2021"));
    assert_eq!(rows[1].value, Some(9.5));
}

#[test]
fn test_declared_size_beyond_category_list_degrades_to_null_labels() {
    // Given: A dimension declaring three positions but listing two categories
    let dataset = dataset_from(json!({
        "id": ["geo"],
        "size": [3],
        "dimension": {
            "geo": {"category": {"index": {"A": 0, "B": 1}, "label": {"A": "Austria"}}}
        },
        "value": [1.0, 2.0, 3.0]
    }));

    let rows = dataset.decode();

    // Then: Decoding runs to completion and the out-of-range position is null
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].categories[0].as_deref(), Some("Austria"));
    assert_eq!(rows[1].categories[0].as_deref(), Some("B"), "unlabeled key falls back to raw key");
    assert_eq!(rows[2].categories[0], None);
    assert_eq!(rows[2].value, Some(3.0));
}

#[test]
fn test_value_sequence_shorter_than_declared_size_pads_with_nulls() {
    let dataset = dataset_from(geo_time_response(json!([1.0, 2.0])));

    let rows = dataset.decode();

    assert_eq!(rows.len(), 6, "row count follows declared sizes, not value length");
    assert_eq!(rows[0].value, Some(1.0));
    assert_eq!(rows[1].value, Some(2.0));
    for row in &rows[2..] {
        assert_eq!(row.value, None, "missing cells are null, not zero and not dropped");
    }
}

#[test]
fn test_explicit_null_cell_stays_null() {
    let dataset = dataset_from(geo_time_response(json!([1.0, null, 3.0, 4.0, 5.0, 6.0])));

    let rows = dataset.decode();

    assert_eq!(rows[1].value, None);
    assert_eq!(rows[2].value, Some(3.0));
}

#[test]
fn test_empty_dataset_representations_yield_zero_rows() {
    // Empty dense container
    let dataset = dataset_from(geo_time_response(json!([])));
    assert!(dataset.decode().is_empty());

    // Empty sparse container
    let dataset = dataset_from(geo_time_response(json!({})));
    assert!(dataset.decode().is_empty());

    // Zero total cells
    let dataset = dataset_from(json!({
        "id": ["geo"],
        "size": [0],
        "dimension": {"geo": {"category": {"index": {}}}},
        "value": [1.0]
    }));
    assert!(dataset.decode().is_empty());
}

#[test]
fn test_missing_dimension_or_value_is_a_format_error() {
    let missing_dimension = serde_json::from_value::<JsonStatResponse>(json!({
        "id": ["geo"],
        "size": [1],
        "value": [1.0]
    }))
    .unwrap()
    .validate();
    assert!(
        matches!(missing_dimension, Err(ConnectorError::DatasetFormat { .. })),
        "missing dimension field must fail before any row is produced"
    );

    let missing_value = serde_json::from_value::<JsonStatResponse>(json!({
        "id": ["geo"],
        "size": [1],
        "dimension": {"geo": {"category": {"index": {"A": 0}}}}
    }))
    .unwrap()
    .validate();
    assert!(matches!(missing_value, Err(ConnectorError::DatasetFormat { .. })));
}

#[test]
fn test_dimension_id_without_map_entry_is_a_format_error() {
    let result = serde_json::from_value::<JsonStatResponse>(json!({
        "id": ["geo", "time"],
        "size": [1, 1],
        "dimension": {"geo": {"category": {"index": {"A": 0}}}},
        "value": [1.0]
    }))
    .unwrap()
    .validate();

    assert!(matches!(result, Err(ConnectorError::DatasetFormat { .. })));
}

#[test]
fn test_category_index_as_array_keeps_declared_order() {
    let dataset = dataset_from(json!({
        "id": ["geo"],
        "size": [2],
        "dimension": {
            "geo": {"category": {"index": ["B", "A"], "label": {"A": "Austria", "B": "Belgium"}}}
        },
        "value": [1.0, 2.0]
    }));

    let rows = dataset.decode();
    assert_eq!(rows[0].categories[0].as_deref(), Some("Belgium"));
    assert_eq!(rows[1].categories[0].as_deref(), Some("Austria"));
}

#[test]
fn test_category_index_as_map_orders_by_position() {
    // Map form with positions deliberately out of key order
    let dataset = dataset_from(json!({
        "id": ["geo"],
        "size": [2],
        "dimension": {
            "geo": {"category": {"index": {"A": 1, "B": 0}, "label": {"A": "Austria", "B": "Belgium"}}}
        },
        "value": [1.0, 2.0]
    }));

    let rows = dataset.decode();
    assert_eq!(rows[0].categories[0].as_deref(), Some("Belgium"));
    assert_eq!(rows[1].categories[0].as_deref(), Some("Austria"));
}

#[test]
fn test_to_table_appends_value_column() {
    let dataset = dataset_from(geo_time_response(json!([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])));

    let table = dataset.to_table();

    assert_eq!(table.columns, vec!["geo", "time", "value"]);
    assert_eq!(table.num_rows(), 6);
    assert_eq!(table.rows[0][2].as_deref(), Some("1"));
}
